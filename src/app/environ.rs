//! Request environment handed to applications.

use std::borrow::Cow;

use http::request::Parts;
use percent_encoding::percent_decode_str;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Version};
use uuid::Uuid;

use crate::net::PeerAddr;

/// Facts about the serving side that every request shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Host for TCP, socket path for Unix.
    pub name: String,
    /// `None` for Unix sockets.
    pub port: Option<u16>,
    /// `http` or `https`.
    pub url_scheme: &'static str,
    pub multithread: bool,
    pub multiprocess: bool,
}

/// CGI-style request environment.
///
/// Typed fields cover what applications normally need; [`Environ::get`]
/// exposes the same data as the conventional `REQUEST_METHOD`,
/// `REMOTE_ADDR`, `HTTP_*` … mapping.
#[derive(Debug, Clone)]
pub struct Environ {
    pub method: Method,
    /// Always empty: applications are mounted at the root.
    pub script_name: String,
    /// Percent-decoded request path.
    pub path_info: String,
    /// Request path exactly as it appeared on the request line.
    pub raw_path: String,
    pub query_string: String,
    pub protocol: Version,
    pub headers: HeaderMap,
    /// Fully buffered request body.
    pub body: Bytes,
    /// Peer as normalized by the transport; `("<local>", 0)` on Unix sockets.
    pub peer: PeerAddr,
    pub server: ServerInfo,
    pub request_id: Uuid,
}

impl Environ {
    /// Build the environment for one request.
    pub fn new(parts: &Parts, body: Bytes, peer: PeerAddr, server: ServerInfo) -> Self {
        Self {
            method: parts.method.clone(),
            script_name: String::new(),
            path_info: percent_decode_str(parts.uri.path()).decode_utf8_lossy().into_owned(),
            raw_path: parts.uri.path().to_string(),
            query_string: parts.uri.query().unwrap_or_default().to_string(),
            protocol: parts.version,
            headers: parts.headers.clone(),
            body,
            peer,
            server,
            request_id: Uuid::new_v4(),
        }
    }

    /// Host part of the peer address.
    pub fn remote_addr(&self) -> String {
        self.peer.host()
    }

    /// Port part of the peer address.
    pub fn remote_port(&self) -> u16 {
        self.peer.port()
    }

    /// Look up a CGI-style variable.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "REQUEST_METHOD" => Cow::Borrowed(self.method.as_str()),
            "SCRIPT_NAME" => Cow::Borrowed(self.script_name.as_str()),
            "PATH_INFO" => Cow::Borrowed(self.path_info.as_str()),
            "QUERY_STRING" => Cow::Borrowed(self.query_string.as_str()),
            "SERVER_PROTOCOL" => Cow::Owned(format!("{:?}", self.protocol)),
            "SERVER_NAME" => Cow::Borrowed(self.server.name.as_str()),
            "SERVER_PORT" => Cow::Owned(self.server.port.map(|p| p.to_string()).unwrap_or_default()),
            "REMOTE_ADDR" => Cow::Owned(self.remote_addr()),
            "REMOTE_PORT" => Cow::Owned(self.remote_port().to_string()),
            "URL_SCHEME" => Cow::Borrowed(self.server.url_scheme),
            "CONTENT_TYPE" => return self.header_str(CONTENT_TYPE.as_str()),
            "CONTENT_LENGTH" => return self.header_str(CONTENT_LENGTH.as_str()),
            other => {
                let name = other.strip_prefix("HTTP_")?;
                return self.header_str(&name.replace('_', "-").to_ascii_lowercase());
            }
        };
        Some(value)
    }

    fn header_str(&self, name: &str) -> Option<Cow<'_, str>> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        match values.len() {
            0 => None,
            1 => Some(Cow::Borrowed(values[0])),
            _ => Some(Cow::Owned(values.join(","))),
        }
    }

    /// Path plus query string, as sent on the request line.
    pub fn request_uri(&self) -> String {
        if self.query_string.is_empty() {
            self.raw_path.clone()
        } else {
            format!("{}?{}", self.raw_path, self.query_string)
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: &str, target: &str) -> Self {
        let request = hyper::Request::builder()
            .method(method)
            .uri(target)
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        Self::new(
            &parts,
            Bytes::new(),
            PeerAddr::Synthetic,
            ServerInfo {
                name: "/tmp/test.sock".to_string(),
                port: None,
                url_scheme: "http",
                multithread: false,
                multiprocess: false,
            },
        )
    }
}
