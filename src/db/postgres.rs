use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;

use crate::{
    db::MovieStore,
    error::AppResult,
    models::{CandidateMovie, Embedding, MovieId, UserId, UserRating},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Movie columns plus the aggregated genre names, grouped by movie
const MOVIE_SELECT: &str = r#"
    SELECT m.id, m.title, m.release_year, m.overview, m.poster_path, m.vote_average,
           COALESCE(
               array_agg(c.name ORDER BY c.name) FILTER (WHERE c.name IS NOT NULL),
               ARRAY[]::text[]
           ) AS genres
    FROM movies m
    LEFT JOIN movie_categories mc ON mc.movie_id = m.id
    LEFT JOIN categories c ON c.id = mc.category_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    release_year: Option<i32>,
    overview: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    genres: Vec<String>,
}

impl From<MovieRow> for CandidateMovie {
    fn from(row: MovieRow) -> Self {
        CandidateMovie {
            id: row.id,
            title: row.title,
            year: row.release_year,
            overview: row.overview,
            genres: row.genres,
            poster_path: row.poster_path,
            vote_average: row.vote_average,
            similarity_score: None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RatingRow {
    movie_id: i64,
    rating: f64,
    vote_average: Option<f64>,
    genres: Vec<String>,
}

impl From<RatingRow> for UserRating {
    fn from(row: RatingRow) -> Self {
        UserRating {
            movie_id: row.movie_id,
            rating: row.rating,
            genres: row.genres,
            vote_average: row.vote_average,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmbeddingRow {
    id: i64,
    embedding: Vec<f32>,
}

/// `MovieStore` backed by the Postgres catalog
#[derive(Clone)]
pub struct PgMovieStore {
    pool: PgPool,
}

impl PgMovieStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MovieStore for PgMovieStore {
    async fn find_ratings_by_user(&self, user_id: UserId) -> AppResult<Vec<UserRating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            r#"
            SELECT r.movie_id, r.rating::float8 AS rating, m.vote_average,
                   COALESCE(
                       array_agg(c.name) FILTER (WHERE c.name IS NOT NULL),
                       ARRAY[]::text[]
                   ) AS genres
            FROM ratings r
            JOIN movies m ON m.id = r.movie_id
            LEFT JOIN movie_categories mc ON mc.movie_id = m.id
            LEFT JOIN categories c ON c.id = mc.category_id
            WHERE r.user_id = $1
            GROUP BY r.movie_id, r.rating, m.vote_average
            ORDER BY r.movie_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRating::from).collect())
    }

    async fn find_movies_by_genres(
        &self,
        genres: &[String],
        exclude_ids: &[MovieId],
        limit: usize,
    ) -> AppResult<Vec<CandidateMovie>> {
        let sql = format!(
            r#"{MOVIE_SELECT}
            WHERE m.id <> ALL($2)
              AND EXISTS (
                  SELECT 1
                  FROM movie_categories mc2
                  JOIN categories c2 ON c2.id = mc2.category_id
                  WHERE mc2.movie_id = m.id AND c2.name = ANY($1)
              )
            GROUP BY m.id
            ORDER BY m.popularity DESC NULLS LAST, m.id
            LIMIT $3
            "#
        );

        let rows: Vec<MovieRow> = sqlx::query_as(&sql)
            .bind(genres)
            .bind(exclude_ids)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CandidateMovie::from).collect())
    }

    async fn find_top_popular(&self, limit: usize) -> AppResult<Vec<CandidateMovie>> {
        let sql = format!(
            r#"{MOVIE_SELECT}
            GROUP BY m.id
            ORDER BY m.popularity DESC NULLS LAST, m.id
            LIMIT $1
            "#
        );

        let rows: Vec<MovieRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CandidateMovie::from).collect())
    }

    async fn find_embeddings_by_ids(
        &self,
        ids: &[MovieId],
    ) -> AppResult<HashMap<MovieId, Embedding>> {
        let rows: Vec<EmbeddingRow> = sqlx::query_as(
            r#"
            SELECT id, embedding
            FROM movies
            WHERE id = ANY($1) AND embedding IS NOT NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            requested = ids.len(),
            found = rows.len(),
            "Loaded embeddings from database"
        );

        Ok(rows.into_iter().map(|row| (row.id, row.embedding)).collect())
    }

    async fn find_rated_movie_ids(&self, user_id: UserId) -> AppResult<Vec<MovieId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT movie_id
            FROM ratings
            WHERE user_id = $1
            ORDER BY movie_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_movies_by_ids(&self, ids: &[MovieId]) -> AppResult<Vec<CandidateMovie>> {
        let sql = format!(
            r#"{MOVIE_SELECT}
            WHERE m.id = ANY($1)
            GROUP BY m.id
            "#
        );

        let rows: Vec<MovieRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CandidateMovie::from).collect())
    }
}
