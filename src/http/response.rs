//! Response assembly.
//!
//! # Responsibilities
//! - Turn what the application produced into a hyper response
//! - Stamp every response with the request ID
//! - Provide the fixed error responses the server sends on its own

use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use uuid::Uuid;

use crate::app::Body;
use crate::http::request::X_REQUEST_ID;

pub type ResponseBody = Full<Bytes>;

const INTERNAL_ERROR_PAGE: &str = "<!doctype html>\n\
<html lang=en>\n\
<title>500 Internal Server Error</title>\n\
<h1>Internal Server Error</h1>\n\
<p>The server encountered an internal error and was unable to complete your request.</p>\n";

/// Build the response for a successfully completed application call.
pub fn from_application(
    status: StatusCode,
    headers: HeaderMap,
    chunks: Body,
    request_id: Uuid,
) -> Response<ResponseBody> {
    let body = match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.into_iter().next().unwrap_or_default(),
        _ => Bytes::from(chunks.concat()),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    stamp_request_id(&mut response, request_id);
    response
}

/// Generic 500 page, used when the application fails and errors are not passed through.
pub fn internal_server_error(request_id: Uuid) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(INTERNAL_ERROR_PAGE.as_bytes())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    stamp_request_id(&mut response, request_id);
    response
}

/// 400 for requests whose body could not be read.
pub fn bad_request() -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"Bad Request\n")));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn stamp_request_id(response: &mut Response<ResponseBody>, request_id: Uuid) {
    if response.headers().contains_key(X_REQUEST_ID) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
}
