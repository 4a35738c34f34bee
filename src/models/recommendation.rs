use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CandidateMovie, DEFAULT_MIN_RATING};
use crate::error::{AppError, AppResult};

/// Score multiplier for a movie surfaced by both the vector index and the genre finder
pub const CO_OCCURRENCE_BOOST: f64 = 1.15;

/// Largest `top_k` a caller may request
pub const MAX_TOP_K: usize = 100;

/// Weighted sub-scores that were summed into the final score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub vector: f64,
    pub genre: f64,
    pub popularity: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.vector + self.genre + self.popularity
    }
}

/// A ranked recommendation
///
/// Popular-movie fallback entries carry no score and no breakdown; consumers
/// must treat that shape as a valid, non-personalized result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRecommendation {
    #[serde(flatten)]
    pub movie: CandidateMovie,
    pub recommendation_score: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    /// Movie genres that are also among the user's favorites
    pub matched_genres: Vec<String>,
    pub match_reason: String,
}

impl ScoredRecommendation {
    /// Wraps a popular movie served to a cold-start user
    pub fn popular(movie: CandidateMovie) -> Self {
        Self {
            movie,
            recommendation_score: None,
            score_breakdown: None,
            matched_genres: Vec::new(),
            match_reason: "popular with other viewers".to_string(),
        }
    }

    pub fn is_personalized(&self) -> bool {
        self.score_breakdown.is_some()
    }

    pub fn score(&self) -> f64 {
        self.recommendation_score.unwrap_or(0.0)
    }
}

/// Tunable weights for the hybrid score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub vector: f64,
    /// Declared for parity with `genre_boost`; the formula weighs genre matches with `genre_boost`
    pub genre: f64,
    pub popularity: f64,
    pub genre_boost: f64,
    /// Reserved: no recency term exists in the formula yet
    pub recency_boost: f64,
    pub co_occurrence_boost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            vector: 0.30,
            genre: 0.20,
            popularity: 0.15,
            genre_boost: 0.25,
            recency_boost: 0.10,
            co_occurrence_boost: CO_OCCURRENCE_BOOST,
        }
    }
}

impl ScoringWeights {
    /// Applies the weights to raw sub-scores
    pub fn breakdown(&self, vector_score: f64, genre_score: f64, popularity_score: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            vector: vector_score * self.vector,
            genre: genre_score * self.genre_boost,
            popularity: popularity_score * self.popularity,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let values = [
            ("vector", self.vector),
            ("genre", self.genre),
            ("popularity", self.popularity),
            ("genre_boost", self.genre_boost),
            ("recency_boost", self.recency_boost),
            ("co_occurrence_boost", self.co_occurrence_boost),
        ];

        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "Weight '{}' must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Options for a single `recommend` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendOptions {
    pub top_k: usize,
    pub exclude_rated: bool,
    /// Minimum rating for a movie to count as a seed
    pub min_user_rating: f64,
    /// Custom weights; results computed with them are not cached
    pub weights: Option<ScoringWeights>,
    /// Deadline for the whole request's store and index calls, overriding the engine default
    pub timeout: Option<Duration>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            exclude_rated: true,
            min_user_rating: DEFAULT_MIN_RATING,
            weights: None,
            timeout: None,
        }
    }
}

impl RecommendOptions {
    pub fn effective_weights(&self) -> ScoringWeights {
        self.weights.unwrap_or_default()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(AppError::InvalidInput(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }

        if !self.min_user_rating.is_finite() {
            return Err(AppError::InvalidInput(
                "min_user_rating must be a number".to_string(),
            ));
        }

        if let Some(weights) = &self.weights {
            weights.validate()?;
        }

        Ok(())
    }

    /// Key suffix for cached results, `None` when results must not be cached
    pub fn cache_fingerprint(&self) -> Option<String> {
        if self.weights.is_some() {
            return None;
        }

        Some(format!(
            "k{}:x{}:m{}",
            self.top_k, self.exclude_rated, self.min_user_rating
        ))
    }
}
