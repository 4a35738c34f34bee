use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{CandidateMovie, Embedding, MovieId, UserId, UserRating},
};

/// Read-only access to the relational movie/rating store
///
/// The engine never writes through this trait. Implementations must be safe
/// to share across concurrent recommendation requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    /// All of a user's ratings joined with the rated movies' genres
    async fn find_ratings_by_user(&self, user_id: UserId) -> AppResult<Vec<UserRating>>;

    /// Movies sharing at least one genre with `genres`, most popular first
    async fn find_movies_by_genres(
        &self,
        genres: &[String],
        exclude_ids: &[MovieId],
        limit: usize,
    ) -> AppResult<Vec<CandidateMovie>>;

    /// Most popular movies overall
    async fn find_top_popular(&self, limit: usize) -> AppResult<Vec<CandidateMovie>>;

    /// Stored embeddings for the given ids; ids without one are absent from the map
    async fn find_embeddings_by_ids(&self, ids: &[MovieId])
        -> AppResult<HashMap<MovieId, Embedding>>;

    async fn find_rated_movie_ids(&self, user_id: UserId) -> AppResult<Vec<MovieId>>;

    /// Movie details for the given ids, in no particular order
    async fn find_movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<CandidateMovie>>;
}
