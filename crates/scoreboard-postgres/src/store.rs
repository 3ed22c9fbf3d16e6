//! [`ScoreStore`] implementation backed by a single Postgres table (spec §6.1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scoreboard_common::{Error, PlayerName, Score, ScoreEntry, ScoreStore};
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::{map_pg_error, map_pool_error};
use crate::pool::PgPool;
use crate::schema;

/// Default pool size, mirroring the teacher's Postgres backend default.
pub const DEFAULT_POOL_SIZE: usize = 20;
/// Default checkout timeout.
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Postgres-backed [`ScoreStore`].
#[derive(Debug, Clone)]
pub struct PgScoreStore {
    pool: Arc<PgPool>,
}

impl PgScoreStore {
    /// Connect, apply the schema (table, index, trigger), and return a ready store.
    pub async fn connect(conn_str: impl Into<String>) -> Result<Self, Error> {
        Self::connect_with(conn_str, DEFAULT_POOL_SIZE, DEFAULT_CHECKOUT_TIMEOUT).await
    }

    /// Like [`PgScoreStore::connect`] with explicit pool sizing.
    pub async fn connect_with(
        conn_str: impl Into<String>,
        pool_size: usize,
        checkout_timeout: Duration,
    ) -> Result<Self, Error> {
        let pool = PgPool::new(conn_str, pool_size, checkout_timeout);
        let conn = pool.checkout().await.map_err(map_pool_error)?;
        schema::migrate(&conn).await.map_err(map_pg_error)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    type Err = Error;

    #[instrument(skip(self))]
    async fn upsert(&self, player: &PlayerName, score: Score) -> Result<(ScoreEntry, bool), Error> {
        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        let score_i64 = score.value() as i64;
        let row = conn
            .query_one(
                r#"
                WITH prior AS (
                    SELECT score AS old_score FROM scores WHERE player = $1
                ),
                upsert AS (
                    INSERT INTO scores (player, score, updated_at)
                    VALUES ($1, $2, now())
                    ON CONFLICT (player) DO UPDATE
                        SET score = GREATEST(scores.score, EXCLUDED.score),
                            updated_at = CASE
                                WHEN EXCLUDED.score > scores.score THEN now()
                                ELSE scores.updated_at
                            END
                    RETURNING player, score, updated_at
                )
                SELECT upsert.player, upsert.score, upsert.updated_at, prior.old_score
                FROM upsert LEFT JOIN prior ON true
                "#,
                &[&player.as_str(), &score_i64],
            )
            .await
            .map_err(map_pg_error)?;

        let committed_score: i64 = row.get("score");
        let updated_at: OffsetDateTime = row.get("updated_at");
        let old_score: Option<i64> = row.get("old_score");
        let applied = old_score.map(|old| committed_score > old).unwrap_or(true);

        let entry = ScoreEntry {
            player: player.clone(),
            score: Score::new(committed_score as u64),
            updated_at,
        };
        Ok((entry, applied))
    }

    #[instrument(skip(self))]
    async fn get_top(&self, limit: u32, offset: u32) -> Result<Vec<ScoreEntry>, Error> {
        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        let limit = limit as i64;
        let offset = offset as i64;
        let rows = conn
            .query(
                "SELECT player, score, updated_at FROM scores \
                 ORDER BY score DESC, player ASC LIMIT $1 OFFSET $2",
                &[&limit, &offset],
            )
            .await
            .map_err(map_pg_error)?;

        rows.into_iter().map(row_to_entry).collect()
    }

    #[instrument(skip(self))]
    async fn get(&self, player: &PlayerName) -> Result<Option<ScoreEntry>, Error> {
        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        let row = conn
            .query_opt(
                "SELECT player, score, updated_at FROM scores WHERE player = $1",
                &[&player.as_str()],
            )
            .await
            .map_err(map_pg_error)?;

        row.map(row_to_entry).transpose()
    }

    #[instrument(skip(self))]
    async fn rank(&self, player: &PlayerName) -> Result<Option<i64>, Error> {
        let Some(entry) = self.get(player).await? else {
            return Ok(None);
        };

        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        let score_i64 = entry.score.value() as i64;
        let row = conn
            .query_one(
                "SELECT count(*) AS better FROM scores \
                 WHERE score > $1 OR (score = $1 AND player < $2)",
                &[&score_i64, &player.as_str()],
            )
            .await
            .map_err(map_pg_error)?;
        let better: i64 = row.get("better");
        Ok(Some(1 + better))
    }

    #[instrument(skip(self))]
    async fn delete(&self, player: &PlayerName) -> Result<(), Error> {
        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        conn.execute("DELETE FROM scores WHERE player = $1", &[&player.as_str()])
            .await
            .map_err(map_pg_error)?;
        Ok(())
    }
}

fn row_to_entry(row: tokio_postgres::Row) -> Result<ScoreEntry, Error> {
    let player: String = row.get("player");
    let score: i64 = row.get("score");
    let updated_at: OffsetDateTime = row.get("updated_at");
    Ok(ScoreEntry {
        player: PlayerName::parse(player)?,
        score: Score::new(score as u64),
        updated_at,
    })
}
