//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use devserve::config::ServerOptions;
use devserve::net::BoundAddr;
use devserve::{body, Address, Body, BoxError, Environ, Server, StartResponse};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::{HeaderMap, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

/// A finished response from the server under test.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }
}

/// Send a GET over a Unix socket with a hyper HTTP/1 client.
pub async fn unix_get(socket_path: &Path, target: &str) -> Result<Reply, BoxError> {
    let stream = UnixStream::connect(socket_path).await?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

    tokio::spawn(async move {
        let _ = conn.await;
    });

    let request = Request::builder()
        .uri(target)
        .header(HOST, "localhost")
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;

    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(Reply {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// HTTP client for TCP tests; proxies from the environment are ignored.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Reports the peer address and server name the application saw.
pub fn peer_app(environ: &Environ, start: &mut StartResponse) -> Result<Body, BoxError> {
    let report = serde_json::json!({
        "remote_addr": environ.remote_addr(),
        "remote_port": environ.remote_port(),
        "server_name": environ.server.name,
        "multithread": environ.server.multithread,
        "multiprocess": environ.server.multiprocess,
    });
    start.start_with(StatusCode::OK, &[("content-type", "application/json")]);
    Ok(body(serde_json::to_vec(&report)?))
}

/// Fails on `/fail`, answers `ok` everywhere else.
pub fn flaky_app(environ: &Environ, start: &mut StartResponse) -> Result<Body, BoxError> {
    if environ.path_info == "/fail" {
        return Err("intentional failure".into());
    }
    start.start_with(StatusCode::OK, &[("content-type", "text/plain")]);
    Ok(body("ok"))
}

/// Answers after `delay`, so shutdown can race an in-flight request.
pub fn slow_app(delay: Duration) -> impl Fn(&Environ, &mut StartResponse) -> Result<Body, BoxError> + Send + Sync + 'static {
    move |_environ: &Environ, start: &mut StartResponse| {
        std::thread::sleep(delay);
        start.start_with(StatusCode::OK, &[("content-type", "text/plain")]);
        Ok(body("finally"))
    }
}

/// A bound server running on a background task.
pub struct Running {
    pub local_addr: BoundAddr,
    pub shutdown: devserve::Shutdown,
    pub task: JoinHandle<Result<(), devserve::ServeError>>,
}

impl Running {
    pub fn tcp_addr(&self) -> SocketAddr {
        match &self.local_addr {
            BoundAddr::Inet(addr) => *addr,
            BoundAddr::Unix(path) => panic!("expected TCP, bound to {}", path.display()),
        }
    }

    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.tcp_addr(), target)
    }

    /// Trigger shutdown and wait for `serve_forever` to return.
    pub async fn stop(self) -> Result<(), devserve::ServeError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Bind `address` and serve `app` in the background.
pub async fn spawn_server<A>(address: Address, app: A, options: ServerOptions) -> Running
where
    A: devserve::Application,
{
    let server = Server::bind(address, Arc::new(app), options).await.unwrap();
    let local_addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(server.serve_forever());
    Running {
        local_addr,
        shutdown,
        task,
    }
}
