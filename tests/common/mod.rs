#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cinematch_api::{
    db::{Cache, MovieStore},
    error::{AppError, AppResult},
    models::{CandidateMovie, Embedding, MovieId, UserId, UserRating, VectorMatch},
    services::{HybridRecommender, VectorIndex},
};

pub const DIMENSION: usize = 3;

pub fn movie(id: MovieId, genres: &[&str], vote: f64) -> CandidateMovie {
    CandidateMovie {
        id,
        title: format!("Movie {}", id),
        year: Some(1990 + (id % 30) as i32),
        overview: Some(format!("Overview of movie {}", id)),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        poster_path: Some(format!("/posters/{}.jpg", id)),
        vote_average: Some(vote),
        similarity_score: None,
    }
}

/// In-memory catalog; genre search orders by vote average as its popularity
#[derive(Default)]
pub struct FakeStore {
    pub ratings: Mutex<HashMap<UserId, Vec<(MovieId, f64)>>>,
    pub movies: Vec<CandidateMovie>,
    pub embeddings: HashMap<MovieId, Embedding>,
    pub ratings_delay: Option<Duration>,
    pub rated_ids_delay: Option<Duration>,
    pub embeddings_delay: Option<Duration>,
    pub genre_delay: Option<Duration>,
    pub fail_genre_search: bool,
    pub rating_loads: AtomicUsize,
    pub genre_searches: AtomicUsize,
}

impl FakeStore {
    pub fn rate(&self, user_id: UserId, movie_id: MovieId, rating: f64) {
        self.ratings
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push((movie_id, rating));
    }

    fn find(&self, id: MovieId) -> Option<&CandidateMovie> {
        self.movies.iter().find(|m| m.id == id)
    }
}

#[async_trait::async_trait]
impl MovieStore for FakeStore {
    async fn find_ratings_by_user(&self, user_id: UserId) -> AppResult<Vec<UserRating>> {
        self.rating_loads.fetch_add(1, Ordering::SeqCst);
        pause(self.ratings_delay).await;
        let ratings = self.ratings.lock().unwrap().get(&user_id).cloned().unwrap_or_default();

        Ok(ratings
            .into_iter()
            .filter_map(|(movie_id, rating)| {
                self.find(movie_id).map(|m| UserRating {
                    movie_id,
                    rating,
                    genres: m.genres.clone(),
                    vote_average: m.vote_average,
                })
            })
            .collect())
    }

    async fn find_movies_by_genres(
        &self,
        genres: &[String],
        exclude_ids: &[MovieId],
        limit: usize,
    ) -> AppResult<Vec<CandidateMovie>> {
        self.genre_searches.fetch_add(1, Ordering::SeqCst);
        pause(self.genre_delay).await;
        if self.fail_genre_search {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        let wanted: HashSet<&String> = genres.iter().collect();
        let mut found: Vec<CandidateMovie> = self
            .movies
            .iter()
            .filter(|m| !exclude_ids.contains(&m.id))
            .filter(|m| m.genres.iter().any(|g| wanted.contains(g)))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.vote_average
                .unwrap_or(0.0)
                .total_cmp(&a.vote_average.unwrap_or(0.0))
                .then_with(|| a.id.cmp(&b.id))
        });
        found.truncate(limit);
        Ok(found)
    }

    async fn find_top_popular(&self, limit: usize) -> AppResult<Vec<CandidateMovie>> {
        let mut all = self.movies.clone();
        all.sort_by(|a, b| {
            b.vote_average
                .unwrap_or(0.0)
                .total_cmp(&a.vote_average.unwrap_or(0.0))
                .then_with(|| a.id.cmp(&b.id))
        });
        all.truncate(limit);
        Ok(all)
    }

    async fn find_embeddings_by_ids(
        &self,
        ids: &[MovieId],
    ) -> AppResult<HashMap<MovieId, Embedding>> {
        pause(self.embeddings_delay).await;
        Ok(ids
            .iter()
            .filter_map(|id| self.embeddings.get(id).map(|e| (*id, e.clone())))
            .collect())
    }

    async fn find_rated_movie_ids(&self, user_id: UserId) -> AppResult<Vec<MovieId>> {
        pause(self.rated_ids_delay).await;
        Ok(self
            .ratings
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|r| r.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default())
    }

    async fn find_movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<CandidateMovie>> {
        Ok(ids.iter().filter_map(|id| self.find(*id).cloned()).collect())
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Index returning fixed matches, optionally after a delay
#[derive(Default)]
pub struct FakeIndex {
    pub matches: Vec<VectorMatch>,
    pub delay: Option<Duration>,
    pub queries: AtomicUsize,
}

#[async_trait::async_trait]
impl VectorIndex for FakeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<VectorMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        assert_eq!(vector.len(), DIMENSION);
        pause(self.delay).await;
        Ok(self.matches.iter().take(top_k).copied().collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A catalog of dramas, crime films and comedies with embeddings for 1..=5
pub fn catalog() -> FakeStore {
    let mut movies = Vec::new();
    for id in 1..=10 {
        movies.push(movie(id, &["Drama"], 6.0 + (id % 4) as f64));
    }
    for id in 11..=20 {
        movies.push(movie(id, &["Crime", "Drama"], 5.0 + (id % 5) as f64));
    }
    for id in 21..=30 {
        movies.push(movie(id, &["Comedy"], 7.0));
    }

    let embeddings = (1..=5)
        .map(|id| (id, vec![1.0, id as f32 / 10.0, 0.0]))
        .collect();

    FakeStore {
        movies,
        embeddings,
        ..FakeStore::default()
    }
}

/// A user with enough drama ratings to get personalized results
pub const DRAMA_FAN: UserId = 1;

pub fn with_drama_fan(store: FakeStore) -> FakeStore {
    store.rate(DRAMA_FAN, 1, 9.0);
    store.rate(DRAMA_FAN, 2, 8.0);
    store.rate(DRAMA_FAN, 11, 7.0);
    store.rate(DRAMA_FAN, 21, 2.0);
    store
}

pub fn vector_matches() -> Vec<VectorMatch> {
    vec![
        VectorMatch { movie_id: 3, score: 0.95 },
        VectorMatch { movie_id: 2, score: 0.9 },
        VectorMatch { movie_id: 12, score: 0.72 },
        VectorMatch { movie_id: 25, score: 0.55 },
        VectorMatch { movie_id: 4, score: 0.4 },
    ]
}

pub fn engine(store: Arc<FakeStore>, index: Arc<FakeIndex>, cache: Cache) -> HybridRecommender {
    HybridRecommender::new(store, index, cache, Duration::from_millis(200))
}
