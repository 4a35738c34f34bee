use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey, MovieStore},
    error::{AppError, AppResult},
    models::{CandidateMovie, Embedding, GenreWeight, MovieId, PreferenceProfile, UserId},
};

/// Genre-overlap candidates, seed embeddings and the metadata sub-scores
#[derive(Clone)]
pub struct MetadataCandidateFinder {
    store: Arc<dyn MovieStore>,
    cache: Cache,
}

impl MetadataCandidateFinder {
    pub fn new(store: Arc<dyn MovieStore>, cache: Cache) -> Self {
        Self { store, cache }
    }

    /// Movies sharing a genre with the profile's favorites, most popular first
    ///
    /// A profile without favorite genres yields no candidates and never
    /// reaches the store.
    pub async fn find_by_genres(
        &self,
        profile: &PreferenceProfile,
        exclude_ids: &[MovieId],
        limit: usize,
    ) -> AppResult<Vec<CandidateMovie>> {
        if profile.favorite_genres.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let genres = profile.genre_names();
        let candidates = self
            .store
            .find_movies_by_genres(&genres, exclude_ids, limit)
            .await?;

        tracing::debug!(
            user_id = profile.user_id,
            genres = genres.len(),
            found = candidates.len(),
            "Genre candidates fetched"
        );

        Ok(candidates)
    }

    /// Embeddings for `movie_ids`, in argument order
    ///
    /// Cached vectors are served from the `embeddings` region; the rest are
    /// fetched in a single store call and cached. Ids without a stored
    /// embedding are skipped.
    pub async fn get_embeddings(&self, movie_ids: &[MovieId]) -> AppResult<Vec<Embedding>> {
        let mut found: HashMap<MovieId, Embedding> = HashMap::new();
        let mut missing: Vec<MovieId> = Vec::new();

        for &id in movie_ids {
            if found.contains_key(&id) || missing.contains(&id) {
                continue;
            }
            match self.cache.get::<Embedding>(&CacheKey::Embedding(id)) {
                Some(vector) => {
                    found.insert(id, vector);
                }
                None => missing.push(id),
            }
        }

        if !missing.is_empty() {
            let fetched = self.store.find_embeddings_by_ids(&missing).await?;

            tracing::debug!(
                requested = missing.len(),
                fetched = fetched.len(),
                "Fetched uncached embeddings"
            );

            for (id, vector) in fetched {
                self.cache.set(&CacheKey::Embedding(id), &vector);
                found.insert(id, vector);
            }
        }

        Ok(movie_ids
            .iter()
            .filter_map(|id| found.get(id).cloned())
            .collect())
    }

    /// Ids of every movie the user has rated, for exclusion
    pub async fn get_rated_movie_ids(&self, user_id: UserId) -> AppResult<Vec<MovieId>> {
        cached!(
            self.cache,
            CacheKey::UserRatedIds(user_id),
            self.store.find_rated_movie_ids(user_id)
        )
    }

    /// Most popular movies overall, used for cold-start users
    pub async fn popular_movies(&self, limit: usize) -> AppResult<Vec<CandidateMovie>> {
        cached!(
            self.cache,
            CacheKey::PopularMovies(limit),
            self.store.find_top_popular(limit)
        )
    }
}

/// Element-wise mean of equally sized vectors
pub fn average_embedding(vectors: &[Embedding]) -> AppResult<Embedding> {
    let first = vectors
        .first()
        .ok_or_else(|| AppError::EmptyInput("cannot average zero embeddings".to_string()))?;
    let dimension = first.len();

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(AppError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }

    let mut sums = vec![0.0_f64; dimension];
    for vector in vectors {
        for (sum, value) in sums.iter_mut().zip(vector) {
            *sum += f64::from(*value);
        }
    }

    let count = vectors.len() as f64;
    Ok(sums.into_iter().map(|sum| (sum / count) as f32).collect())
}

/// Share of the user's total genre weight carried by the movie's genres, in [0, 1]
pub fn genre_score(movie_genres: &[String], user_genres: &[GenreWeight]) -> f64 {
    if movie_genres.is_empty() || user_genres.is_empty() {
        return 0.0;
    }

    let total: f64 = user_genres.iter().map(|g| g.weight.max(0.0)).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let movie_genres: HashSet<&str> = movie_genres.iter().map(String::as_str).collect();
    let matched: f64 = user_genres
        .iter()
        .filter(|g| movie_genres.contains(g.genre.as_str()))
        .map(|g| g.weight.max(0.0))
        .sum();

    (matched / total).clamp(0.0, 1.0)
}

/// Vote average mapped onto [0, 1]
pub fn popularity_score(vote_average: Option<f64>) -> f64 {
    match vote_average {
        Some(vote) if vote.is_finite() && vote > 0.0 => (vote / 10.0).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Movie genres that are also among the user's favorites, in movie order
pub fn matched_genres(movie_genres: &[String], user_genres: &[GenreWeight]) -> Vec<String> {
    movie_genres
        .iter()
        .filter(|genre| user_genres.iter().any(|g| &g.genre == *genre))
        .cloned()
        .collect()
}
