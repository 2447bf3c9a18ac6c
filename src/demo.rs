//! Demo application served by the `devserve` binary.

use hyper::StatusCode;
use serde::Serialize;

use crate::app::{body, Body, BoxError, Environ, StartResponse};

#[derive(Debug, Serialize)]
struct PeerReport<'a> {
    remote_addr: String,
    remote_port: u16,
    server_name: &'a str,
    server_port: Option<u16>,
    url_scheme: &'a str,
    request_id: String,
}

/// Hello world, plus a few endpoints useful when poking at the server.
///
/// - `/peer` reports the peer address the server observed, as JSON
/// - `/error` fails, to exercise the debugger and passthrough handling
/// - `/panic` panics
pub fn demo_app(environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
    match environ.path_info.as_str() {
        "/peer" => {
            let report = PeerReport {
                remote_addr: environ.remote_addr(),
                remote_port: environ.remote_port(),
                server_name: &environ.server.name,
                server_port: environ.server.port,
                url_scheme: environ.server.url_scheme,
                request_id: environ.request_id.to_string(),
            };
            let json = serde_json::to_vec(&report)?;
            start_response.start_with(StatusCode::OK, &[("content-type", "application/json")]);
            Ok(body(json))
        }
        "/error" => Err("requested failure".into()),
        "/panic" => panic!("requested panic"),
        _ => {
            start_response.start_with(StatusCode::OK, &[("content-type", "text/plain; charset=utf-8")]);
            Ok(body("Hello, World!\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_endpoint_reports_synthetic_peer() {
        let mut start = StartResponse::new();
        let chunks = demo_app(&Environ::for_test("GET", "/peer"), &mut start).unwrap();
        let report: serde_json::Value = serde_json::from_slice(&chunks.concat()).unwrap();

        assert_eq!(report["remote_addr"], "<local>");
        assert_eq!(report["remote_port"], 0);
        assert_eq!(report["server_port"], serde_json::Value::Null);
    }

    #[test]
    fn error_endpoint_fails() {
        let mut start = StartResponse::new();
        assert!(demo_app(&Environ::for_test("GET", "/error"), &mut start).is_err());
    }
}
