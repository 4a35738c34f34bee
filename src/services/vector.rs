use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    db::MovieStore,
    error::AppResult,
    models::{CandidateMovie, MovieId},
    services::providers::{ensure_dimension, VectorIndex},
};

/// Pass-through to the vector index; results are never cached
#[derive(Clone)]
pub struct VectorCandidateFinder {
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn MovieStore>,
}

impl VectorCandidateFinder {
    pub fn new(index: Arc<dyn VectorIndex>, store: Arc<dyn MovieStore>) -> Self {
        Self { index, store }
    }

    /// Nearest movies to `vector`, hydrated with catalog metadata
    ///
    /// Keeps the index's ranking and sets `similarity_score` from the match.
    /// Matches the catalog does not know are dropped.
    pub async fn find_similar(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<CandidateMovie>> {
        ensure_dimension(vector, self.index.dimension())?;

        let matches = self.index.query(vector, top_k).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<MovieId> = matches.iter().map(|m| m.movie_id).collect();
        let mut movies: HashMap<MovieId, CandidateMovie> = self
            .store
            .find_movies_by_ids(&ids)
            .await?
            .into_iter()
            .map(|movie| (movie.id, movie))
            .collect();

        let candidates: Vec<CandidateMovie> = matches
            .iter()
            .filter_map(|m| {
                movies.remove(&m.movie_id).map(|mut movie| {
                    movie.similarity_score = Some(m.score);
                    movie
                })
            })
            .collect();

        tracing::debug!(
            index = self.index.name(),
            matches = matches.len(),
            hydrated = candidates.len(),
            "Vector candidates fetched"
        );

        Ok(candidates)
    }
}
