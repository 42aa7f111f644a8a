use async_trait::async_trait;

use crate::{Error, Movie, MovieModel, error::Result};

/// Test double which stores nothing: writes succeed without effect
/// and every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockMovieModel;

#[async_trait]
impl MovieModel for MockMovieModel {
    async fn insert(&self, _movie: &mut Movie) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _id: i64) -> Result<Movie> {
        Err(Error::RecordNotFound("Movie".to_string()))
    }

    async fn update(&self, _movie: &mut Movie) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _id: i64) -> Result<()> {
        Ok(())
    }
}
