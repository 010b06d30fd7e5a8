//! Transport helpers shared by the HTTP adapters.

use eventsource_stream::Eventsource;
use futures::future::ready;
use futures::{Stream, TryStreamExt};
use reqwest::Response;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result, TransportError};
use crate::types::ModelInfo;

/// Passes successful responses through; anything else becomes
/// [`TransportError::Status`] carrying the response body.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Keeps at most `page_size` entries, in catalog order.
pub(crate) fn truncate(mut models: Vec<ModelInfo>, page_size: Option<usize>) -> Vec<ModelInfo> {
    if let Some(limit) = page_size {
        models.truncate(limit);
    }
    models
}

/// Local backends that are not running surface as unavailable rather than
/// as a transport failure.
pub(crate) fn connect_error(provider: &str, err: reqwest::Error) -> Error {
    if err.is_connect() {
        Error::unavailable(provider, err.to_string())
    } else {
        err.into()
    }
}

/// Error payload delivered in-band by a streaming API, either a bare string
/// or an object carrying `message`.
pub(crate) fn error_event(error: serde_json::Value) -> Error {
    let message = match &error {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(fields) => fields
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    };
    TransportError::Stream(message).into()
}

fn stream_error(err: impl std::fmt::Display) -> Error {
    TransportError::Stream(err.to_string()).into()
}

/// Data payloads of a server-sent events body, up to the `[DONE]` sentinel.
pub(crate) fn sse_data(response: Response) -> impl Stream<Item = Result<String>> + Send + 'static {
    response
        .bytes_stream()
        .eventsource()
        .map_ok(|event| event.data)
        .map_err(stream_error)
        .try_filter(|data| ready(!data.trim().is_empty()))
        .try_take_while(|data| ready(Ok(data.as_str() != "[DONE]")))
}

/// Non-empty lines of a newline-delimited JSON body.
pub(crate) fn ndjson_lines(response: Response) -> impl Stream<Item = Result<String>> + Send + 'static {
    let bytes = response.bytes_stream().map_err(std::io::Error::other);

    FramedRead::new(StreamReader::new(bytes), LinesCodec::new())
        .map_err(stream_error)
        .try_filter(|line| ready(!line.trim().is_empty()))
}
