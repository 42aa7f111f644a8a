//! JSON request decoding and response encoding.
//!
//! Request bodies are decoded strictly: the body size is capped, payload
//! types are expected to reject unknown fields and the body must contain
//! exactly one JSON value. Every decoding failure is turned into
//! a client facing message.

use std::collections::BTreeMap;

use axum::{
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        FromRequest, Request,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::error::Category;
use serde_path_to_error::Segment;
use tracing::debug;

use crate::error::ApiError;

pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Top level JSON object wrapping the payload under a named key.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<&'static str, serde_json::Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Serialize) -> serde_json::Result<Self> {
        self.0.insert(key, serde_json::to_value(value)?);
        Ok(self)
    }
}

/// Serializes `data` with tab indentation and builds the response.
///
/// Given `headers` are added to the response, `Content-Type` is always
/// `application/json`.
pub fn write_json<T: Serialize>(
    status: StatusCode,
    data: &T,
    headers: HeaderMap,
) -> serde_json::Result<Response> {
    let mut body = Vec::with_capacity(256);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    data.serialize(&mut serializer)?;

    let mut response = (status, body).into_response();
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Decodes a single JSON value from the request body.
pub fn read_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body
        .iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
    {
        return Err(bad_request("body must not be empty"));
    }

    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let value = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| decode_error(body, e))?;
    deserializer
        .end()
        .map_err(|_| bad_request("body must only contain a single JSON value"))?;
    Ok(value)
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::BadRequest(msg.into())
}

fn decode_error(body: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> ApiError {
    let field = top_level_field(err.path());
    let err = err.into_inner();
    debug!("Rejecting request body: {err}");

    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at character {})",
            byte_offset(body, &err)
        ),
        Category::Data => {
            let text = err.to_string();
            let text = strip_position(&text);
            if let Some(key) = unknown_field(text) {
                format!("body contains unknown key \"{key}\"")
            } else if is_type_mismatch(text) {
                match field {
                    Some(field) => format!("body contains incorrect JSON type for field \"{field}\""),
                    None => format!(
                        "body contains incorrect JSON type (at character {})",
                        byte_offset(body, &err)
                    ),
                }
            } else {
                text.to_string()
            }
        }
        Category::Io => err.to_string(),
    };
    bad_request(message)
}

/// Name of the struct field the error happened in, nested positions are dropped.
fn top_level_field(path: &serde_path_to_error::Path) -> Option<String> {
    match path.iter().next()? {
        Segment::Map { key } => Some(key.clone()),
        _ => None,
    }
}

/// Removes the ` at line N column M` suffix serde_json adds to its messages.
fn strip_position(text: &str) -> &str {
    match text.rsplit_once(" at line ") {
        Some((message, position))
            if position.split_once(" column ").is_some_and(|(line, column)| {
                line.parse::<usize>().is_ok() && column.parse::<usize>().is_ok()
            }) =>
        {
            message
        }
        _ => text,
    }
}

fn unknown_field(text: &str) -> Option<&str> {
    text.strip_prefix("unknown field `")?
        .split_once('`')
        .map(|(key, _)| key)
}

fn is_type_mismatch(text: &str) -> bool {
    ["invalid type", "invalid value", "invalid length"]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

/// Converts the line/column position of the error into a byte offset.
fn byte_offset(body: &[u8], err: &serde_json::Error) -> usize {
    let preceding_lines: usize = body
        .split(|b| *b == b'\n')
        .take(err.line().saturating_sub(1))
        .map(|line| line.len() + 1)
        .sum();
    preceding_lines + err.column()
}

/// Raw request body, capped by the body limit of the router.
///
/// Decoding is deferred so that handlers can look up the target record first.
pub struct JsonBody(pub Bytes);

impl JsonBody {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        read_json(&self.0)
    }
}

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Bytes::from_request(req, state)
            .await
            .map(JsonBody)
            .map_err(body_rejection)
    }
}

fn body_rejection(rejection: BytesRejection) -> ApiError {
    match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            bad_request(format!(
                "body must not be larger than {MAX_BODY_BYTES} bytes"
            ))
        }
        other => bad_request(other.body_text()),
    }
}

/// Extractor decoding the body right away with [`read_json`].
pub struct StrictJson<T>(pub T);

impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = JsonBody::from_request(req, state).await?;
        body.decode().map(StrictJson)
    }
}

#[cfg(test)]
mod tests {
    use greenlight_dal::Runtime;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Input {
        title: Option<String>,
        year: Option<i32>,
        runtime: Option<Runtime>,
        genres: Option<Vec<String>>,
    }

    fn message(body: &str) -> String {
        match read_json::<Input>(body.as_bytes()) {
            Err(ApiError::BadRequest(msg)) => msg,
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_valid_body() {
        let input: Input = read_json(br#" {"title": "Heat", "year": 1995} "#).unwrap();
        assert_eq!(input.title.as_deref(), Some("Heat"));
        assert_eq!(input.year, Some(1995));
        assert_eq!(input.genres, None);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(message(""), "body must not be empty");
        assert_eq!(message(" \n\t"), "body must not be empty");
    }

    #[test]
    fn test_badly_formed() {
        assert_eq!(
            message(r#"{"title": "Heat",}"#),
            "body contains badly-formed JSON (at character 18)"
        );
        assert_eq!(message(r#"{"title": "Heat""#), "body contains badly-formed JSON");
        assert!(message("<xml/>").starts_with("body contains badly-formed JSON (at character"));
    }

    #[test]
    fn test_wrong_types() {
        assert_eq!(
            message(r#"{"year": "1995"}"#),
            "body contains incorrect JSON type for field \"year\""
        );
        assert!(message(r#"["Heat"]"#).starts_with("body contains incorrect JSON type (at character"));
        assert_eq!(
            message(r#"{"genres": ["drama", 1]}"#),
            "body contains incorrect JSON type for field \"genres\""
        );
    }

    #[test]
    fn test_custom_decoder_message() {
        assert_eq!(message(r#"{"runtime": "139"}"#), "invalid runtime format");
        assert_eq!(message(r#"{"runtime": 139}"#), "invalid runtime format");
        assert_eq!(strip_position("bad thing at line 3 column 7"), "bad thing");
        assert_eq!(strip_position("seen at line four"), "seen at line four");
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(
            message(r#"{"title": "X", "extra": 1}"#),
            "body contains unknown key \"extra\""
        );
    }

    #[test]
    fn test_single_value() {
        assert_eq!(
            message(r#"{"title": "X"}{"title": "Y"}"#),
            "body must only contain a single JSON value"
        );
        assert_eq!(
            message(r#"{"title": "X"} :~()"#),
            "body must only contain a single JSON value"
        );
    }

    #[tokio::test]
    async fn test_write_json() {
        let envelope = Envelope::new().with("message", "x").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Test", HeaderValue::from_static("yes"));
        let response = write_json(StatusCode::ACCEPTED, &envelope, headers).unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["X-Test"], "yes");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{\n\t\"message\": \"x\"\n}");
    }
}
