use minaret_http::HttpError;

/// Describe an HTTP failure for logs and refresh errors.
///
/// Status errors shrink to the status line: a refresh endpoint may echo the
/// submitted token back in its error body.
#[must_use]
pub fn format_http_error(e: &HttpError, context: &str) -> String {
    match e {
        HttpError::HttpStatus { status, .. } => format!("{context}: HTTP {status}"),
        other => format!("{context}: {other}"),
    }
}
