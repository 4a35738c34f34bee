pub mod metadata;
pub mod preferences;
pub mod providers;
pub mod recommendations;
pub mod vector;

pub use metadata::MetadataCandidateFinder;
pub use preferences::PreferenceExtractor;
pub use providers::{HttpVectorIndex, VectorIndex};
pub use recommendations::HybridRecommender;
pub use vector::VectorCandidateFinder;
