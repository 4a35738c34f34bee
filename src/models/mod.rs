use serde::{Deserialize, Serialize};

pub mod profile;
pub mod recommendation;

pub use profile::{
    GenreWeight, PreferenceProfile, COLD_START_THRESHOLD, DEFAULT_MIN_RATING, MAX_RATING_SCALE,
};
pub use recommendation::{
    RecommendOptions, ScoreBreakdown, ScoredRecommendation, ScoringWeights,
    CO_OCCURRENCE_BOOST,
};

pub type MovieId = i64;
pub type UserId = i64;
pub type Embedding = Vec<f32>;

/// A movie surfaced by either candidate source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateMovie {
    pub id: MovieId,
    pub title: String,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
    /// Only set for candidates coming from the vector index
    pub similarity_score: Option<f64>,
}

/// One of a user's ratings joined with the rated movie's metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRating {
    pub movie_id: MovieId,
    /// Rating on a 1-10 scale
    pub rating: f64,
    pub genres: Vec<String>,
    pub vote_average: Option<f64>,
}

/// A raw hit from the vector index
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VectorMatch {
    pub movie_id: MovieId,
    pub score: f64,
}
