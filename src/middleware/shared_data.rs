//! Static file middleware.
//!
//! # Responsibilities
//! - Map URL prefixes to directories
//! - Serve matching files for GET and HEAD
//! - Answer conditional requests with 304
//! - Fall through to the wrapped application when nothing matches
//!
//! # Design Decisions
//! - Longest prefix wins
//! - `..`, absolute segments and backslashes are never resolved
//! - Only regular files are served; directories fall through

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use hyper::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED,
};
use hyper::{HeaderMap, Method, StatusCode};

use crate::app::{Application, Body, BoxError, Environ, StartResponse};

/// How long clients may cache served files.
pub const CACHE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 12);

/// Serves files from directories mounted at URL prefixes.
#[derive(Debug)]
pub struct SharedData<A> {
    inner: A,
    // Sorted longest prefix first.
    mounts: Vec<(String, PathBuf)>,
}

impl<A: Application> SharedData<A> {
    pub fn new(inner: A, exports: BTreeMap<String, PathBuf>) -> Self {
        let mut mounts: Vec<(String, PathBuf)> = exports
            .into_iter()
            .map(|(prefix, dir)| (prefix.trim_end_matches('/').to_string(), dir))
            .collect();
        mounts.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { inner, mounts }
    }

    /// File on disk for a request path, if some mount covers it and it exists.
    fn lookup(&self, path: &str) -> Option<(PathBuf, fs::Metadata)> {
        for (prefix, dir) in &self.mounts {
            let Some(rest) = strip_mount(path, prefix) else {
                continue;
            };
            let Some(relative) = safe_relative(rest) else {
                tracing::debug!(path = %path, "Rejected unsafe static path");
                return None;
            };
            let candidate = dir.join(relative);
            match fs::metadata(&candidate) {
                Ok(metadata) if metadata.is_file() => return Some((candidate, metadata)),
                _ => continue,
            }
        }
        None
    }

    fn serve(
        &self,
        environ: &Environ,
        start_response: &mut StartResponse,
        file: &Path,
        metadata: &fs::Metadata,
    ) -> Result<Body, io::Error> {
        let mut headers = HeaderMap::new();
        let modified = metadata.modified().ok().map(truncate_to_seconds);

        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&format!("max-age={}, public", CACHE_TIMEOUT.as_secs()))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        );
        if let Some(modified) = modified {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                headers.insert(LAST_MODIFIED, value);
            }
            if not_modified_since(environ, modified) {
                start_response.start(StatusCode::NOT_MODIFIED, headers);
                return Ok(Vec::new());
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static(guess_content_type(file)));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        start_response.start(StatusCode::OK, headers);

        if environ.method == Method::HEAD {
            return Ok(Vec::new());
        }
        Ok(vec![fs::read(file)?.into()])
    }
}

impl<A: Application> Application for SharedData<A> {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
        if environ.method != Method::GET && environ.method != Method::HEAD {
            return self.inner.call(environ, start_response);
        }

        match self.lookup(&environ.path_info) {
            Some((file, metadata)) => {
                tracing::trace!(file = %file.display(), "Serving static file");
                Ok(self.serve(environ, start_response, &file, &metadata)?)
            }
            None => self.inner.call(environ, start_response),
        }
    }
}

/// The part of `path` below `prefix`, if `prefix` mounts it.
fn strip_mount<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_start_matches('/'))
    } else {
        None
    }
}

/// Turn the URL remainder into a relative path that cannot leave its mount.
fn safe_relative(rest: &str) -> Option<PathBuf> {
    if rest.is_empty() || rest.contains('\\') || rest.contains('\0') {
        return None;
    }
    let mut relative = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn not_modified_since(environ: &Environ, modified: SystemTime) -> bool {
    environ
        .headers
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .is_some_and(|since| modified <= since)
}

// HTTP dates carry whole seconds only.
fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(elapsed) => SystemTime::UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()),
        Err(_) => time,
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
