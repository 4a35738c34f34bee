pub mod cache;
pub mod postgres;
pub mod store;

mod macros;

pub use cache::{Cache, CacheKey, CacheRegion, CacheStats, RegionTtls, DEFAULT_REGION_CAPACITY};
pub use postgres::{create_pool, PgMovieStore};
pub use store::MovieStore;

#[cfg(test)]
pub use store::MockMovieStore;
