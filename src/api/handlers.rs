use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db::{CacheRegion, CacheStats},
    error::AppResult,
    models::{RecommendOptions, ScoredRecommendation, UserId},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub top_k: Option<usize>,
    pub exclude_rated: Option<bool>,
    pub min_user_rating: Option<f64>,
}

impl From<RecommendationQuery> for RecommendOptions {
    fn from(query: RecommendationQuery) -> Self {
        let defaults = RecommendOptions::default();
        RecommendOptions {
            top_k: query.top_k.unwrap_or(defaults.top_k),
            exclude_rated: query.exclude_rated.unwrap_or(defaults.exclude_rated),
            min_user_rating: query.min_user_rating.unwrap_or(defaults.min_user_rating),
            ..defaults
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    /// False when the user got the cold-start popular list
    pub personalized: bool,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<ScoredRecommendation>,
}

#[derive(Debug, Serialize)]
pub struct InvalidationResponse {
    pub invalidated: usize,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ranked recommendations for a user
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let options = RecommendOptions::from(query);
    let recommendations = state.recommender.recommend(user_id, &options).await?;

    Ok(Json(RecommendationResponse {
        user_id,
        personalized: recommendations.iter().any(ScoredRecommendation::is_personalized),
        generated_at: Utc::now(),
        recommendations,
    }))
}

/// Drops everything cached from a user's ratings and collections
pub async fn ratings_changed(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<InvalidationResponse> {
    let invalidated = state.cache().invalidate_user(user_id);
    Json(InvalidationResponse { invalidated })
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache().stats())
}

/// Maintenance invalidation of a whole region
pub async fn invalidate_region(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> AppResult<Json<InvalidationResponse>> {
    let region: CacheRegion = region.parse()?;
    let invalidated = state.cache().invalidate_region(region);
    Ok(Json(InvalidationResponse { invalidated }))
}
