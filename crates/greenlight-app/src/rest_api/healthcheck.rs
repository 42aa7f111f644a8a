use axum::{extract::State, response::Response};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::{
    error::ApiResult,
    json::{write_json, Envelope},
    state::AppState,
    VERSION,
};

#[derive(Debug, Serialize)]
struct SystemInfo<'a> {
    environment: &'a str,
    version: &'a str,
}

pub async fn healthcheck(State(state): State<AppState>) -> ApiResult<Response> {
    let envelope = Envelope::new().with("status", "available")?.with(
        "system_info",
        SystemInfo {
            environment: &state.config().environment,
            version: VERSION,
        },
    )?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}
