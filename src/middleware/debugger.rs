//! Error-page middleware for development.
//!
//! Catches errors and panics raised by the wrapped application, logs them,
//! and answers with an HTML page showing the error chain and the request
//! environment instead of a bare 500.

use std::any::Any;
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};

use hyper::StatusCode;

use crate::app::{body, Application, Body, BoxError, Environ, StartResponse};

/// Wraps an application and renders its failures as a debugging page.
#[derive(Debug)]
pub struct Debugger<A> {
    inner: A,
    show_environ: bool,
}

impl<A: Application> Debugger<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            show_environ: true,
        }
    }

    /// Leave request headers out of the error page.
    pub fn hide_environ(mut self) -> Self {
        self.show_environ = false;
        self
    }

    fn render(&self, environ: &Environ, failure: &Failure) -> String {
        let mut page = String::with_capacity(2048);
        page.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\">");
        let _ = write!(
            page,
            "<title>{} // devserve debugger</title>",
            escape_html(&failure.headline)
        );
        page.push_str(
            "<style>body{font-family:monospace;margin:2em}h1{color:#b00}\
             li{margin:.3em 0}table{border-collapse:collapse}\
             td{border:1px solid #ccc;padding:.2em .5em}</style></head><body>",
        );
        let _ = write!(page, "<h1>{}</h1>", escape_html(&failure.kind));
        let _ = write!(page, "<p><strong>{}</strong></p>", escape_html(&failure.headline));

        if !failure.causes.is_empty() {
            page.push_str("<h2>Caused by</h2><ol>");
            for cause in &failure.causes {
                let _ = write!(page, "<li>{}</li>", escape_html(cause));
            }
            page.push_str("</ol>");
        }

        let _ = write!(
            page,
            "<h2>Request</h2><p>{} {}</p><p>request id {}</p>",
            escape_html(environ.method.as_str()),
            escape_html(&environ.request_uri()),
            environ.request_id
        );

        if self.show_environ {
            page.push_str("<h2>Environment</h2><table>");
            for key in ["REMOTE_ADDR", "REMOTE_PORT", "SERVER_NAME", "SERVER_PORT", "URL_SCHEME"] {
                let value = environ.get(key).unwrap_or_default();
                let _ = write!(page, "<tr><td>{key}</td><td>{}</td></tr>", escape_html(&value));
            }
            for (name, value) in &environ.headers {
                let value = value.to_str().unwrap_or("<binary>");
                let _ = write!(
                    page,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape_html(name.as_str()),
                    escape_html(value)
                );
            }
            page.push_str("</table>");
        }

        page.push_str("</body></html>\n");
        page
    }
}

impl<A: Application> Application for Debugger<A> {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.inner.call(environ, start_response)));

        let failure = match outcome {
            Ok(Ok(chunks)) => return Ok(chunks),
            Ok(Err(error)) => Failure::from_error(error.as_ref()),
            Err(payload) => Failure::from_panic(payload.as_ref()),
        };

        tracing::error!(
            request_id = %environ.request_id,
            method = %environ.method,
            path = %environ.path_info,
            kind = %failure.kind,
            error = %failure.headline,
            "Application raised an error"
        );

        start_response.start_with(
            StatusCode::INTERNAL_SERVER_ERROR,
            &[
                ("content-type", "text/html; charset=utf-8"),
                ("x-devserve-debugger", "1"),
            ],
        );
        Ok(body(self.render(environ, &failure)))
    }
}

/// What went wrong, flattened for display.
#[derive(Debug)]
struct Failure {
    kind: String,
    headline: String,
    causes: Vec<String>,
}

impl Failure {
    fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: "Application error".to_string(),
            headline: error.to_string(),
            causes,
        }
    }

    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self {
            kind: "Application panicked".to_string(),
            headline: panic_message(payload),
            causes: Vec::new(),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("template <index> failed")]
    struct RenderError(#[source] io::Error);

    fn page_of(chunks: Body) -> String {
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[test]
    fn passes_successful_responses_through() {
        let app = Debugger::new(|_: &Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
            start.start_with(StatusCode::OK, &[]);
            Ok(body("fine"))
        });
        let mut start = StartResponse::new();
        let chunks = app.call(&Environ::for_test("GET", "/"), &mut start).unwrap();

        assert_eq!(page_of(chunks), "fine");
        assert_eq!(start.status(), Some(StatusCode::OK));
    }

    #[test]
    fn renders_error_chain() {
        let app = Debugger::new(|_: &Environ, start: &mut StartResponse| -> Result<Body, BoxError> {
            start.start_with(StatusCode::OK, &[("x-partial", "1")]);
            Err(Box::new(RenderError(io::Error::new(io::ErrorKind::NotFound, "index.html missing"))))
        });
        let mut start = StartResponse::new();
        let chunks = app.call(&Environ::for_test("GET", "/page?x=1"), &mut start).unwrap();
        let page = page_of(chunks);

        assert_eq!(start.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(start.headers().get("x-partial").is_none());
        assert!(page.contains("template &lt;index&gt; failed"));
        assert!(page.contains("index.html missing"));
        assert!(page.contains("/page?x=1"));
        assert!(page.contains("&lt;local&gt;"));
    }

    #[test]
    fn catches_panics() {
        let app = Debugger::new(|_: &Environ, _: &mut StartResponse| -> Result<Body, BoxError> {
            panic!("boom in handler");
        })
        .hide_environ();
        let mut start = StartResponse::new();
        let page = page_of(app.call(&Environ::for_test("GET", "/"), &mut start).unwrap());

        assert_eq!(start.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(page.contains("Application panicked"));
        assert!(page.contains("boom in handler"));
        assert!(!page.contains("Environment"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href='x'>&</a>"), "&lt;a href=&#x27;x&#x27;&gt;&amp;&lt;/a&gt;");
    }
}
