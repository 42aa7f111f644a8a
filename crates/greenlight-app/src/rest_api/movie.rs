use axum::response::Response;
use greenlight_dal::{validate_movie, Models, Movie, Runtime};
use greenlight_types::Validator;
use http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    json::{write_json, Envelope, JsonBody, StrictJson},
    rest_api::RecordId,
};

pub const EXPECTED_VERSION_HEADER: &str = "X-Expected-Version";

/// Movie fields accepted from clients. `null` is the same as an absent field.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MovieInput {
    pub fn into_movie(self) -> Movie {
        let mut movie = Movie::default();
        self.replace(&mut movie);
        movie
    }

    /// Overwrites all mutable fields, absent ones become empty.
    pub fn replace(self, movie: &mut Movie) {
        movie.title = self.title.unwrap_or_default();
        movie.year = self.year.unwrap_or_default();
        movie.runtime = self.runtime.unwrap_or_default();
        movie.genres = self.genres;
    }

    /// Overwrites only the fields present in the input.
    pub fn patch(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = Some(genres);
        }
    }
}

fn validate(movie: &Movie) -> ApiResult<()> {
    let mut v = Validator::new();
    validate_movie(&mut v, movie);
    if v.valid() {
        Ok(())
    } else {
        Err(ApiError::FailedValidation(v.into_errors()))
    }
}

fn movie_response(status: StatusCode, movie: &Movie, headers: HeaderMap) -> ApiResult<Response> {
    let envelope = Envelope::new().with("movie", movie)?;
    Ok(write_json(status, &envelope, headers)?)
}

fn check_expected_version(headers: &HeaderMap, movie: &Movie) -> ApiResult<()> {
    if let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) {
        if expected.as_bytes() != movie.version.to_string().as_bytes() {
            debug!(
                "Expected version {:?} does not match version {} of movie {}",
                expected, movie.version, movie.id
            );
            return Err(ApiError::EditConflict);
        }
    }
    Ok(())
}

pub async fn create_movie(
    models: Models,
    StrictJson(input): StrictJson<MovieInput>,
) -> ApiResult<Response> {
    let mut movie = input.into_movie();
    validate(&movie)?;

    models.movies.insert(&mut movie).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        LOCATION,
        HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))?,
    );
    movie_response(StatusCode::CREATED, &movie, headers)
}

pub async fn show_movie(RecordId(id): RecordId, models: Models) -> ApiResult<Response> {
    let movie = models.movies.get(id).await?;
    movie_response(StatusCode::OK, &movie, HeaderMap::new())
}

#[derive(Debug, Clone, Copy)]
enum UpdateMode {
    Replace,
    Patch,
}

async fn update_movie(
    id: i64,
    models: Models,
    headers: HeaderMap,
    body: JsonBody,
    mode: UpdateMode,
) -> ApiResult<Response> {
    let mut movie = models.movies.get(id).await?;
    check_expected_version(&headers, &movie)?;

    let input: MovieInput = body.decode()?;
    match mode {
        UpdateMode::Replace => input.replace(&mut movie),
        UpdateMode::Patch => input.patch(&mut movie),
    }
    validate(&movie)?;

    models.movies.update(&mut movie).await?;
    movie_response(StatusCode::OK, &movie, HeaderMap::new())
}

pub async fn replace_movie(
    RecordId(id): RecordId,
    models: Models,
    headers: HeaderMap,
    body: JsonBody,
) -> ApiResult<Response> {
    update_movie(id, models, headers, body, UpdateMode::Replace).await
}

pub async fn patch_movie(
    RecordId(id): RecordId,
    models: Models,
    headers: HeaderMap,
    body: JsonBody,
) -> ApiResult<Response> {
    update_movie(id, models, headers, body, UpdateMode::Patch).await
}

pub async fn delete_movie(RecordId(id): RecordId, models: Models) -> ApiResult<Response> {
    models.movies.delete(id).await?;
    let envelope = Envelope::new().with("message", "movie successfully deleted")?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}
