/// Vector index abstraction
///
/// The engine only needs nearest-neighbour lookups by query vector; the
/// index's storage engine lives behind this trait. Implementations must
/// reject vectors whose length differs from `dimension()`.
use crate::{
    error::{AppError, AppResult},
    models::VectorMatch,
};

pub mod http_index;

pub use http_index::HttpVectorIndex;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` nearest movies to `vector`, best first
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<VectorMatch>>;

    /// Dimensionality every query vector must have
    fn dimension(&self) -> usize;

    /// Index name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Fails with `DimensionMismatch` unless `vector` has exactly `expected` components
pub fn ensure_dimension(vector: &[f32], expected: usize) -> AppResult<()> {
    if vector.len() != expected {
        return Err(AppError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
