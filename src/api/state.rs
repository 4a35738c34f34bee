use crate::db::Cache;
use crate::services::HybridRecommender;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: HybridRecommender,
}

impl AppState {
    pub fn new(recommender: HybridRecommender) -> Self {
        Self { recommender }
    }

    pub fn cache(&self) -> &Cache {
        self.recommender.cache()
    }
}
