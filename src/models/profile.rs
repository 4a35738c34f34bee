use serde::{Deserialize, Serialize};

use super::{MovieId, UserId};

/// Upper bound of the rating scale
pub const MAX_RATING_SCALE: f64 = 10.0;

/// Seed threshold used when the caller does not pass one
pub const DEFAULT_MIN_RATING: f64 = 3.0;

/// Users with fewer ratings than this get non-personalized results
pub const COLD_START_THRESHOLD: usize = 3;

/// A genre the user gravitates towards, with its derived weight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenreWeight {
    pub genre: String,
    /// `(frequency / total_ratings) * (genre_mean_rating / MAX_RATING_SCALE)`, in [0, 1]
    pub weight: f64,
    pub occurrence_count: usize,
}

/// Weighted summary of a user's rating history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceProfile {
    pub user_id: UserId,
    /// Sorted by weight, descending
    pub favorite_genres: Vec<GenreWeight>,
    pub average_rating: f64,
    pub total_ratings: usize,
    /// Seed movies, best rated first
    pub top_rated_movie_ids: Vec<MovieId>,
}

impl PreferenceProfile {
    /// Profile of a user with no ratings at all
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            favorite_genres: Vec::new(),
            average_rating: 0.0,
            total_ratings: 0,
            top_rated_movie_ids: Vec::new(),
        }
    }

    /// Too few ratings to personalize
    pub fn is_cold_start(&self) -> bool {
        self.total_ratings < COLD_START_THRESHOLD
    }

    pub fn genre_names(&self) -> Vec<String> {
        self.favorite_genres.iter().map(|g| g.genre.clone()).collect()
    }
}
