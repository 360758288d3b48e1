//! HTTP routes.
//!
//! | Method | Path                      | Success                     |
//! |--------|---------------------------|-----------------------------|
//! | POST   | `/append/{feed}`          | 200, empty body             |
//! | GET    | `/read/{feed}?since=N`    | 200, JSON [`ReadResponse`]  |
//! | GET    | `/download/{feed}/{id}`   | 200, file bytes             |
//!
//! Store calls block on disk I/O and run on the blocking pool.

use crate::error::{ServerError, ServerResult};
use crate::handler::{AppendRequest, FeedService, ReadResponse};
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

/// Builds the router over `service`.
pub fn router(service: FeedService) -> Router {
    Router::new()
        .route("/append/{feed}", post(append))
        .route("/read/{feed}", get(read))
        .route("/download/{feed}/{id}", get(download))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct ReadQuery {
    since: Option<String>,
}

async fn append(
    State(service): State<FeedService>,
    Path(feed): Path<String>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let request: AppendRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(feed = %feed, error = %e, "could not parse request");
        ServerError::InvalidRequest("could not parse request".into())
    })?;

    blocking(move || service.append(&feed, &request)).await?;
    Ok(StatusCode::OK)
}

async fn read(
    State(service): State<FeedService>,
    Path(feed): Path<String>,
    Query(query): Query<ReadQuery>,
) -> ServerResult<Json<ReadResponse>> {
    let response = blocking(move || service.read(&feed, query.since.as_deref())).await?;
    Ok(Json(response))
}

async fn download(
    State(service): State<FeedService>,
    Path((feed, id)): Path<(String, String)>,
) -> ServerResult<Response> {
    let download = blocking(move || service.download(&feed, &id)).await?;

    let file = tokio::fs::File::open(&download.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServerError::NotFound(format!("{} no longer exists", download.file_name))
        } else {
            ServerError::Io(e)
        }
    })?;
    // Serve exactly the length that goes into Content-Length.
    let body = Body::from_stream(ReaderStream::new(file.take(download.len)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, download.len)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.file_name),
        )
        .body(body)
        .map_err(|e| ServerError::Internal(format!("could not build response: {e}")))
}

/// `attachment` disposition for `file_name`.
///
/// The quoted `filename` is an ASCII fallback with `"` and `\` escaped and
/// other bytes replaced by `_`. Names that needed replacing also get an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let mut fallback = String::with_capacity(file_name.len());
    let mut exact = true;
    for c in file_name.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            ' '..='~' => fallback.push(c),
            _ => {
                fallback.push('_');
                exact = false;
            }
        }
    }

    if exact {
        return format!("attachment; filename=\"{fallback}\"");
    }
    let mut encoded = String::with_capacity(file_name.len() * 3);
    for b in file_name.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            encoded.push(char::from(b));
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

async fn blocking<F, T>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if status.is_server_error() {
            status
                .canonical_reason()
                .unwrap_or("internal error")
                .to_string()
        } else {
            self.to_string()
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_quoted_as_is() {
        assert_eq!(
            content_disposition("nightly 01.tar.gz"),
            "attachment; filename=\"nightly 01.tar.gz\""
        );
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(
            content_disposition(r#"a"b\c.txt"#),
            r#"attachment; filename="a\"b\\c.txt""#
        );
    }

    #[test]
    fn control_and_non_ascii_bytes_get_an_encoded_name() {
        assert_eq!(
            content_disposition("a\nb.log"),
            "attachment; filename=\"a_b.log\"; filename*=UTF-8''a%0Ab.log"
        );
        assert_eq!(
            content_disposition("caf\u{e9}.txt"),
            "attachment; filename=\"caf_.txt\"; filename*=UTF-8''caf%C3%A9.txt"
        );
    }

    #[test]
    fn every_name_makes_a_valid_header() {
        for name in ["a\u{7f}b", "tab\there", "\u{1}\u{2}", "q\"\r\n"] {
            assert!(header::HeaderValue::try_from(content_disposition(name)).is_ok());
        }
    }
}
