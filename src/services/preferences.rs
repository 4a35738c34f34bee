use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey, MovieStore},
    error::{AppError, AppResult},
    models::{GenreWeight, PreferenceProfile, UserId, UserRating, MAX_RATING_SCALE},
};

const MAX_FAVORITE_GENRES: usize = 10;
const MAX_SEED_MOVIES: usize = 5;

/// Builds weighted preference profiles from a user's rating history
#[derive(Clone)]
pub struct PreferenceExtractor {
    store: Arc<dyn MovieStore>,
    cache: Cache,
}

impl PreferenceExtractor {
    pub fn new(store: Arc<dyn MovieStore>, cache: Cache) -> Self {
        Self { store, cache }
    }

    /// Returns the user's profile, from cache when possible
    ///
    /// A user without ratings gets the empty profile, which is the cold-start
    /// signal and not an error. Only a store fault fails with
    /// `AppError::Extraction`.
    pub async fn extract(
        &self,
        user_id: UserId,
        min_rating_threshold: f64,
    ) -> AppResult<PreferenceProfile> {
        let key = CacheKey::UserMetadata {
            user_id,
            min_rating: min_rating_threshold,
        };

        cached!(self.cache, key, async {
            let ratings = self
                .store
                .find_ratings_by_user(user_id)
                .await
                .map_err(|e| {
                    tracing::error!(user_id, error = %e, "Failed to load rating history");
                    AppError::Extraction(e.to_string())
                })?;

            let profile = build_profile(user_id, &ratings, min_rating_threshold);

            tracing::info!(
                user_id,
                total_ratings = profile.total_ratings,
                favorite_genres = profile.favorite_genres.len(),
                seeds = profile.top_rated_movie_ids.len(),
                "Built preference profile"
            );

            Ok::<_, AppError>(profile)
        })
    }
}

/// Computes a profile from raw ratings
pub fn build_profile(
    user_id: UserId,
    ratings: &[UserRating],
    min_rating_threshold: f64,
) -> PreferenceProfile {
    if ratings.is_empty() {
        return PreferenceProfile::empty(user_id);
    }

    let total_ratings = ratings.len();
    let mean = ratings.iter().map(|r| r.rating).sum::<f64>() / total_ratings as f64;

    PreferenceProfile {
        user_id,
        favorite_genres: favorite_genres(ratings),
        average_rating: round_to_cents(mean),
        total_ratings,
        top_rated_movie_ids: top_rated_movie_ids(ratings, min_rating_threshold),
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn top_rated_movie_ids(ratings: &[UserRating], min_rating_threshold: f64) -> Vec<i64> {
    let mut seeds: Vec<&UserRating> = ratings
        .iter()
        .filter(|r| r.rating >= min_rating_threshold)
        .collect();

    seeds.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });

    seeds
        .into_iter()
        .take(MAX_SEED_MOVIES)
        .map(|r| r.movie_id)
        .collect()
}

fn favorite_genres(ratings: &[UserRating]) -> Vec<GenreWeight> {
    let total_ratings = ratings.len() as f64;

    // genre -> (occurrences, rating sum)
    let mut stats: HashMap<&str, (usize, f64)> = HashMap::new();
    for rating in ratings {
        for genre in &rating.genres {
            let entry = stats.entry(genre.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += rating.rating;
        }
    }

    let mut genres: Vec<GenreWeight> = stats
        .into_iter()
        .map(|(genre, (count, sum))| {
            let genre_mean = sum / count as f64;
            let frequency = count as f64 / total_ratings;
            let weight = (frequency * (genre_mean / MAX_RATING_SCALE)).clamp(0.0, 1.0);

            GenreWeight {
                genre: genre.to_string(),
                weight,
                occurrence_count: count,
            }
        })
        .collect();

    genres.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    genres.truncate(MAX_FAVORITE_GENRES);
    genres
}
