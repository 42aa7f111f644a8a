use async_trait::async_trait;
use greenlight_types::validator::{self, Validator};
use serde::Serialize;
use sqlx::{Pool, types::Json};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{Error, Runtime, error::Result};

pub const MIN_YEAR: i32 = 1888;
pub const MAX_TITLE_BYTES: usize = 500;
pub const MAX_GENRES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: Option<PrimitiveDateTime>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "no_genres")]
    pub genres: Option<Vec<String>>,
    pub version: i32,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

fn no_genres(genres: &Option<Vec<String>>) -> bool {
    genres.as_ref().is_none_or(|g| g.is_empty())
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    let current_year = time::OffsetDateTime::now_utc().year();

    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= MIN_YEAR, "year", "must be greater than 1888");
    v.check(movie.year <= current_year, "year", "must not be in the future");

    v.check(!movie.runtime.is_zero(), "runtime", "must be provided");
    v.check(
        movie.runtime.minutes() > 0,
        "runtime",
        "must be a positive integer",
    );

    match movie.genres.as_deref() {
        None => v.add_error("genres", "must be provided"),
        Some(genres) => {
            v.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
            v.check(
                genres.len() <= MAX_GENRES,
                "genres",
                "must not contain more than 5 genres",
            );
            v.check(
                validator::unique(genres),
                "genres",
                "must not contain duplicate values",
            );
        }
    }
}

/// Persistence operations on movies.
#[async_trait]
pub trait MovieModel: Send + Sync {
    /// Stores a new movie, filling in its `id`, `created_at` and `version`.
    async fn insert(&self, movie: &mut Movie) -> Result<()>;
    async fn get(&self, id: i64) -> Result<Movie>;
    /// Saves all mutable fields, provided the stored version still equals
    /// `movie.version`. On success `movie.version` holds the new version.
    async fn update(&self, movie: &mut Movie) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    created_at: PrimitiveDateTime,
    title: String,
    year: i32,
    runtime: i32,
    genres: Json<Vec<String>>,
    version: i32,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Self {
            id: row.id,
            created_at: Some(row.created_at),
            title: row.title,
            year: row.year,
            runtime: Runtime(row.runtime),
            genres: Some(row.genres.0),
            version: row.version,
        }
    }
}

fn not_found() -> Error {
    Error::RecordNotFound("Movie".to_string())
}

pub type MovieRepository = MovieRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct MovieRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MovieRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn insert(&self, movie: &mut Movie) -> Result<()> {
        let genres = movie.genres.as_deref().unwrap_or_default();
        let (id, created_at, version): (i64, PrimitiveDateTime, i32) = sqlx::query_as(
            "INSERT INTO movies (title, year, runtime, genres) VALUES (?, ?, ?, ?) \
             RETURNING id, created_at, version",
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.minutes())
        .bind(Json(genres))
        .fetch_one(&self.executor)
        .await?;

        movie.id = id;
        movie.created_at = Some(created_at);
        movie.version = version;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Movie> {
        if id < 1 {
            return Err(not_found());
        }
        let record = sqlx::query_as::<_, MovieRow>(
            "SELECT id, created_at, title, year, runtime, genres, version FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(not_found)?;
        Ok(record.into())
    }

    pub async fn update(&self, movie: &mut Movie) -> Result<()> {
        let genres = movie.genres.as_deref().unwrap_or_default();
        let new_version: Option<i32> = sqlx::query_scalar(
            "UPDATE movies SET title = ?, year = ?, runtime = ?, genres = ?, version = version + 1 \
             WHERE id = ? AND version = ? RETURNING version",
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.minutes())
        .bind(Json(genres))
        .bind(movie.id)
        .bind(movie.version)
        .fetch_optional(&self.executor)
        .await?;

        match new_version {
            Some(version) => {
                movie.version = version;
                Ok(())
            }
            None => {
                debug!(
                    "Movie {} was not updated, version {} is stale or record is gone",
                    movie.id, movie.version
                );
                Err(Error::EditConflict {
                    id: movie.id,
                    version: movie.version,
                })
            }
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(not_found());
        }
        let res = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(not_found())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MovieModel for MovieRepository {
    async fn insert(&self, movie: &mut Movie) -> Result<()> {
        MovieRepositoryImpl::insert(self, movie).await
    }

    async fn get(&self, id: i64) -> Result<Movie> {
        MovieRepositoryImpl::get(self, id).await
    }

    async fn update(&self, movie: &mut Movie) -> Result<()> {
        MovieRepositoryImpl::update(self, movie).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        MovieRepositoryImpl::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_movie() -> Movie {
        Movie {
            title: "Fight Club".to_string(),
            year: 1999,
            runtime: Runtime(139),
            genres: Some(vec!["drama".to_string()]),
            ..Default::default()
        }
    }

    fn errors_for(movie: &Movie) -> greenlight_types::FieldErrors {
        let mut v = Validator::new();
        validate_movie(&mut v, movie);
        v.into_errors()
    }

    #[test]
    fn test_valid_movie() {
        assert!(errors_for(&valid_movie()).is_empty());
    }

    #[test]
    fn test_empty_movie() {
        let movie = Movie {
            genres: Some(vec![]),
            ..Default::default()
        };
        let errors = errors_for(&movie);
        assert_eq!(errors.len(), 4);
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be provided");
        assert_eq!(errors["runtime"], "must be provided");
        assert_eq!(errors["genres"], "must contain at least 1 genre");

        let errors = errors_for(&Movie::default());
        assert_eq!(errors["genres"], "must be provided");
    }

    #[test]
    fn test_field_limits() {
        let next_year = time::OffsetDateTime::now_utc().year() + 1;
        let movie = Movie {
            title: "x".repeat(501),
            year: next_year,
            runtime: Runtime(-10),
            genres: Some(vec!["a", "b", "c", "d", "e", "f"].into_iter().map(String::from).collect()),
            ..Default::default()
        };
        let errors = errors_for(&movie);
        assert_eq!(errors["title"], "must not be more than 500 bytes long");
        assert_eq!(errors["year"], "must not be in the future");
        assert_eq!(errors["runtime"], "must be a positive integer");
        assert_eq!(errors["genres"], "must not contain more than 5 genres");

        let movie = Movie {
            year: 1887,
            genres: Some(vec!["drama".to_string(), "drama".to_string()]),
            ..valid_movie()
        };
        let errors = errors_for(&movie);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["year"], "must be greater than 1888");
        assert_eq!(errors["genres"], "must not contain duplicate values");
    }

    #[test]
    fn test_title_limit_counts_bytes() {
        // 250 two-byte characters
        let movie = Movie {
            title: "é".repeat(250),
            ..valid_movie()
        };
        assert!(errors_for(&movie).is_empty());
        let movie = Movie {
            title: "é".repeat(251),
            ..valid_movie()
        };
        assert!(errors_for(&movie).contains_key("title"));
    }

    #[test]
    fn test_zero_fields_are_omitted() {
        let movie = Movie {
            id: 1,
            title: "Untitled".to_string(),
            genres: Some(vec![]),
            version: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "title": "Untitled", "version": 1})
        );

        let json = serde_json::to_value(valid_movie()).unwrap();
        assert_eq!(json["runtime"], "139 mins");
        assert_eq!(json["year"], 1999);
        assert!(json.get("created_at").is_none());
    }
}
