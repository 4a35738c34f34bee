use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    db::{Cache, CacheKey, MovieStore},
    error::{AppError, AppResult},
    models::{
        CandidateMovie, Embedding, MovieId, PreferenceProfile, RecommendOptions,
        ScoredRecommendation, ScoringWeights, UserId,
    },
    services::{
        metadata::{
            average_embedding, genre_score, matched_genres, popularity_score,
            MetadataCandidateFinder,
        },
        preferences::PreferenceExtractor,
        providers::VectorIndex,
        vector::VectorCandidateFinder,
    },
};

const STRONG_SIMILARITY: f64 = 0.7;
const RELATED_SIMILARITY: f64 = 0.5;
const STRONG_GENRE_MATCH: f64 = 0.7;

/// Hybrid recommendation engine
///
/// Blends vector-index similarity to the user's seed movies with genre
/// affinity and popularity. Cold-start users get popular movies instead.
///
/// Every store and index call of one request shares a single deadline,
/// `options.timeout` or the engine default, measured from the start of
/// `recommend`. The two candidate sources run concurrently. If
/// one of them fails or times out the engine ranks whatever the other
/// returned; only when neither produces candidates does the call fail with
/// `AppError::RecommendationUnavailable`.
#[derive(Clone)]
pub struct HybridRecommender {
    extractor: PreferenceExtractor,
    metadata: MetadataCandidateFinder,
    vector: VectorCandidateFinder,
    cache: Cache,
    source_timeout: Duration,
}

/// Outcome of one candidate source
enum Branch {
    Ready(Vec<CandidateMovie>),
    /// Not attempted (no seed vector)
    Skipped,
    Failed,
}

impl HybridRecommender {
    /// Wires the engine's components around shared ports and cache
    pub fn new(
        store: Arc<dyn MovieStore>,
        index: Arc<dyn VectorIndex>,
        cache: Cache,
        source_timeout: Duration,
    ) -> Self {
        Self {
            extractor: PreferenceExtractor::new(store.clone(), cache.clone()),
            metadata: MetadataCandidateFinder::new(store.clone(), cache.clone()),
            vector: VectorCandidateFinder::new(index, store),
            cache,
            source_timeout,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Ranked recommendations for `user_id`
    #[tracing::instrument(skip(self, options), fields(top_k = options.top_k))]
    pub async fn recommend(
        &self,
        user_id: UserId,
        options: &RecommendOptions,
    ) -> AppResult<Vec<ScoredRecommendation>> {
        options.validate()?;
        let start = Instant::now();
        let deadline = start + options.timeout.unwrap_or(self.source_timeout);

        let profile = with_deadline(
            deadline,
            "preference extraction",
            self.extractor.extract(user_id, options.min_user_rating),
        )
        .await
        .map_err(|e| match e {
            AppError::Timeout(msg) => AppError::Extraction(msg),
            other => other,
        })?;

        if profile.is_cold_start() {
            tracing::info!(
                total_ratings = profile.total_ratings,
                "Cold start, serving popular movies"
            );
            return with_deadline(
                deadline,
                "popular movies",
                self.popular_fallback(options.top_k),
            )
            .await;
        }

        let cache_key = options
            .cache_fingerprint()
            .map(|fingerprint| CacheKey::Recommendations {
                user_id,
                fingerprint,
            });

        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get::<Vec<ScoredRecommendation>>(key) {
                return Ok(cached);
            }
        }

        let exclude_ids = if options.exclude_rated {
            with_deadline(
                deadline,
                "rated movie ids",
                self.metadata.get_rated_movie_ids(user_id),
            )
            .await
            .map_err(|e| AppError::Extraction(e.to_string()))?
        } else {
            Vec::new()
        };

        let mut seed_failed = false;
        let user_vector = match self.build_user_vector(&profile, deadline).await {
            Ok(vector) => Some(vector),
            Err(e) if e.is_recoverable() => {
                seed_failed = !matches!(e, AppError::NoSeedEmbeddings);
                tracing::warn!(error = %e, "No user vector, falling back to genre-only scoring");
                None
            }
            Err(e) => return Err(e),
        };

        let weights = options.effective_weights();
        let candidate_limit = options.top_k * 2;

        let vector_branch = async {
            match &user_vector {
                Some(vector) => with_deadline(
                    deadline,
                    "vector search",
                    self.vector.find_similar(vector, candidate_limit),
                )
                .await
                .map(Some),
                None => Ok(None),
            }
        };
        let genre_branch = with_deadline(
            deadline,
            "genre search",
            self.metadata
                .find_by_genres(&profile, &exclude_ids, candidate_limit),
        );

        let (vector_result, genre_result) = tokio::join!(vector_branch, genre_branch);

        let vector_outcome = match vector_result {
            Ok(Some(candidates)) => Branch::Ready(candidates),
            Ok(None) => Branch::Skipped,
            Err(e) => branch_failure("vector search", e)?,
        };
        let genre_outcome = match genre_result {
            Ok(candidates) => Branch::Ready(candidates),
            Err(e) => branch_failure("genre search", e)?,
        };

        let degraded = seed_failed
            || matches!(vector_outcome, Branch::Failed)
            || matches!(genre_outcome, Branch::Failed);

        let (vector_candidates, genre_candidates) = match (vector_outcome, genre_outcome) {
            (Branch::Ready(v), Branch::Ready(g)) => (v, g),
            (Branch::Ready(v), _) => (v, Vec::new()),
            (_, Branch::Ready(g)) => (Vec::new(), g),
            _ => {
                return Err(AppError::RecommendationUnavailable(
                    "no candidate source succeeded".to_string(),
                ))
            }
        };

        let exclude: HashSet<MovieId> = exclude_ids.into_iter().collect();
        let merged = merge_candidates(
            &profile,
            &vector_candidates,
            &genre_candidates,
            &exclude,
            &weights,
        );
        let results = rank(merged, options.top_k);

        // Degraded rankings are served but not cached
        if let (Some(key), false) = (&cache_key, degraded) {
            self.cache.set(key, &results);
        }

        tracing::info!(
            vector_candidates = vector_candidates.len(),
            genre_candidates = genre_candidates.len(),
            returned = results.len(),
            degraded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations computed"
        );

        Ok(results)
    }

    async fn popular_fallback(&self, top_k: usize) -> AppResult<Vec<ScoredRecommendation>> {
        let movies = self.metadata.popular_movies(top_k).await?;
        Ok(movies
            .into_iter()
            .take(top_k)
            .map(ScoredRecommendation::popular)
            .collect())
    }

    /// Mean embedding of the profile's seed movies
    async fn build_user_vector(
        &self,
        profile: &PreferenceProfile,
        deadline: Instant,
    ) -> AppResult<Embedding> {
        if profile.top_rated_movie_ids.is_empty() {
            return Err(AppError::NoSeedEmbeddings);
        }

        let embeddings = with_deadline(
            deadline,
            "seed embeddings",
            self.metadata.get_embeddings(&profile.top_rated_movie_ids),
        )
        .await?;

        if embeddings.is_empty() {
            return Err(AppError::NoSeedEmbeddings);
        }

        average_embedding(&embeddings)
    }
}

/// Logs a recoverable branch failure, propagates anything else
fn branch_failure(source: &str, error: AppError) -> AppResult<Branch> {
    if !error.is_recoverable() {
        return Err(error);
    }
    tracing::warn!(source, error = %error, "Candidate source failed, continuing with partial results");
    Ok(Branch::Failed)
}

/// Runs `future`, failing with `AppError::Timeout` once `deadline` passes
async fn with_deadline<T>(
    deadline: Instant,
    source: &str,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} missed the request deadline",
            source
        ))),
    }
}

/// Deterministic explanation of why a movie was recommended
pub fn match_reason(vector_score: f64, genre_score: f64) -> String {
    let mut reasons = Vec::new();

    if vector_score >= STRONG_SIMILARITY {
        reasons.push("similar to your favorite movies");
    } else if vector_score >= RELATED_SIMILARITY {
        reasons.push("related to your taste");
    }

    if genre_score >= STRONG_GENRE_MATCH {
        reasons.push("matches your favorite genres");
    }

    if reasons.is_empty() {
        "recommended based on your profile".to_string()
    } else {
        reasons.join(" and ")
    }
}

fn score_candidate(
    movie: &CandidateMovie,
    vector_score: f64,
    profile: &PreferenceProfile,
    weights: &ScoringWeights,
) -> ScoredRecommendation {
    let genre = genre_score(&movie.genres, &profile.favorite_genres);
    let popularity = popularity_score(movie.vote_average);
    let breakdown = weights.breakdown(vector_score, genre, popularity);

    ScoredRecommendation {
        movie: movie.clone(),
        recommendation_score: Some(breakdown.total()),
        score_breakdown: Some(breakdown),
        matched_genres: matched_genres(&movie.genres, &profile.favorite_genres),
        match_reason: match_reason(vector_score, genre),
    }
}

/// Scores and deduplicates both candidate sets
///
/// A movie found by both sources keeps its vector-branch breakdown and has
/// only its final score multiplied by `weights.co_occurrence_boost`, once.
/// Excluded ids never make it into the output.
pub fn merge_candidates(
    profile: &PreferenceProfile,
    vector_candidates: &[CandidateMovie],
    genre_candidates: &[CandidateMovie],
    exclude_ids: &HashSet<MovieId>,
    weights: &ScoringWeights,
) -> Vec<ScoredRecommendation> {
    let mut merged: HashMap<MovieId, ScoredRecommendation> = HashMap::new();

    for movie in vector_candidates {
        if exclude_ids.contains(&movie.id) || merged.contains_key(&movie.id) {
            continue;
        }
        let vector_score = movie.similarity_score.unwrap_or(0.0);
        merged.insert(
            movie.id,
            score_candidate(movie, vector_score, profile, weights),
        );
    }

    let from_vector: HashSet<MovieId> = merged.keys().copied().collect();
    let mut boosted: HashSet<MovieId> = HashSet::new();

    for movie in genre_candidates {
        if exclude_ids.contains(&movie.id) {
            continue;
        }

        if from_vector.contains(&movie.id) {
            if boosted.insert(movie.id) {
                if let Some(existing) = merged.get_mut(&movie.id) {
                    existing.recommendation_score =
                        Some(existing.score() * weights.co_occurrence_boost);
                }
            }
            continue;
        }

        merged
            .entry(movie.id)
            .or_insert_with(|| score_candidate(movie, 0.0, profile, weights));
    }

    merged.into_values().collect()
}

/// Sorts by score, then vote average, then id, and keeps the first `top_k`
pub fn rank(mut recommendations: Vec<ScoredRecommendation>, top_k: usize) -> Vec<ScoredRecommendation> {
    recommendations.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| {
                let a_vote = a.movie.vote_average.unwrap_or(f64::NEG_INFINITY);
                let b_vote = b.movie.vote_average.unwrap_or(f64::NEG_INFINITY);
                b_vote.total_cmp(&a_vote)
            })
            .then_with(|| a.movie.id.cmp(&b.movie.id))
    });
    recommendations.truncate(top_k);
    recommendations
}
