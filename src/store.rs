//! SQLite-backed durable store for ideas, evaluations, ratings, and matches.
//!
//! The store is the single source of truth for ranking order. Writes that the
//! engine treats as one logical unit (idea + evaluation + rating at creation,
//! both sides of an Elo update + the match row) run inside one SQLite
//! transaction. Blocking rusqlite work is moved off the async runtime via
//! `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use uuid::Uuid;

use crate::model::{
    Band, Decision, Evaluation, Idea, MatchRecord, Rating, STARTING_ELO,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("idea not found: {0}")]
    IdeaNotFound(Uuid),
}

/// A leaderboard row before badges and privacy are applied: the idea joined
/// with its rating and current evaluation.
#[derive(Debug, Clone)]
pub struct RankedIdea {
    pub idea: Idea,
    pub rating: Rating,
    pub viability: u8,
    pub excellence: u8,
    pub decision: Decision,
}

#[async_trait]
pub trait IdeaStore: Send + Sync {
    /// Insert a new idea together with its first evaluation, and a fresh
    /// rating row when `create_rating` is set. One transaction.
    async fn create_idea_with_evaluation(
        &self,
        idea: Idea,
        evaluation: Evaluation,
        create_rating: bool,
    ) -> Result<(), StoreError>;

    /// Append a new evaluation for an existing idea; creates the rating row
    /// if `create_rating` is set and none exists yet. One transaction.
    async fn append_evaluation(
        &self,
        evaluation: Evaluation,
        create_rating: bool,
    ) -> Result<(), StoreError>;

    async fn idea(&self, id: Uuid) -> Result<Option<Idea>, StoreError>;

    /// The current (latest) evaluation for an idea, if any.
    async fn latest_evaluation(&self, idea_id: Uuid) -> Result<Option<Evaluation>, StoreError>;

    async fn rating(&self, idea_id: Uuid) -> Result<Option<Rating>, StoreError>;

    /// Persist one match: both new Elo scores, both incremented match counts,
    /// and the appended match record, in one transaction.
    async fn apply_match(
        &self,
        a_new_elo: i64,
        b_new_elo: i64,
        record: MatchRecord,
    ) -> Result<(), StoreError>;

    /// Every opponent this idea has already faced, in either match position.
    async fn opponents_faced(&self, idea_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// All rating rows (the rated population), unordered.
    async fn rated_ideas(&self) -> Result<Vec<Rating>, StoreError>;

    /// Ranked ideas with at least `min_matches` matches, ordered by Elo
    /// descending with earliest-created first as the tie-break.
    async fn top_rated(&self, limit: u32, min_matches: u32) -> Result<Vec<RankedIdea>, StoreError>;

    /// Count of ideas meeting the ranking floor.
    async fn ranked_count(&self, min_matches: u32) -> Result<u64, StoreError>;
}

#[derive(Clone, Debug)]
pub struct SqliteIdeaStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIdeaStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; \
             PRAGMA synchronous=NORMAL; \
             PRAGMA foreign_keys=ON; \
             CREATE TABLE IF NOT EXISTS ideas ( \
               id TEXT PRIMARY KEY, \
               text TEXT NOT NULL, \
               category TEXT, \
               stage TEXT, \
               user_id TEXT, \
               conversation_id TEXT, \
               is_public INTEGER NOT NULL DEFAULT 0, \
               summary TEXT, \
               created_at INTEGER NOT NULL \
             ); \
             CREATE TABLE IF NOT EXISTS evaluations ( \
               id INTEGER PRIMARY KEY AUTOINCREMENT, \
               idea_id TEXT NOT NULL REFERENCES ideas(id), \
               viability INTEGER NOT NULL, \
               excellence INTEGER NOT NULL, \
               decision TEXT NOT NULL, \
               uncertainty TEXT NOT NULL, \
               top_risks TEXT NOT NULL, \
               key_enablers TEXT NOT NULL, \
               created_at INTEGER NOT NULL \
             ); \
             CREATE INDEX IF NOT EXISTS idx_evaluations_idea \
               ON evaluations(idea_id, created_at DESC); \
             CREATE TABLE IF NOT EXISTS ratings ( \
               idea_id TEXT PRIMARY KEY REFERENCES ideas(id), \
               elo_score INTEGER NOT NULL, \
               match_count INTEGER NOT NULL DEFAULT 0, \
               updated_at INTEGER NOT NULL \
             ); \
             CREATE TABLE IF NOT EXISTS matches ( \
               id INTEGER PRIMARY KEY AUTOINCREMENT, \
               idea_a TEXT NOT NULL REFERENCES ideas(id), \
               idea_b TEXT NOT NULL REFERENCES ideas(id), \
               winner TEXT NOT NULL, \
               reasons TEXT NOT NULL, \
               confidence TEXT NOT NULL, \
               created_at INTEGER NOT NULL \
             ); \
             CREATE INDEX IF NOT EXISTS idx_matches_a ON matches(idea_a); \
             CREATE INDEX IF NOT EXISTS idx_matches_b ON matches(idea_b);",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("ARENA_DB_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from(".arena.sqlite")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError>,
    {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }

    async fn run_blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(Self) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn epoch_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_epoch_ms(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("bad timestamp: {ms}")))
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::Corrupt(format!("bad uuid: {s}")))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, StoreError> {
    s.map(|v| parse_uuid(&v)).transpose()
}

fn list_to_json(list: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(list).map_err(|e| StoreError::Serde(e.to_string()))
}

fn list_from_json(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serde(e.to_string()))
}

fn idea_from_row(row: &Row<'_>) -> Result<Idea, StoreError> {
    Ok(Idea {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        text: row.get(1)?,
        category: row.get(2)?,
        stage: row.get(3)?,
        user_id: parse_opt_uuid(row.get(4)?)?,
        conversation_id: parse_opt_uuid(row.get(5)?)?,
        is_public: row.get::<_, i64>(6)? != 0,
        summary: row.get(7)?,
        created_at: from_epoch_ms(row.get(8)?)?,
    })
}

const IDEA_COLUMNS: &str =
    "id, text, category, stage, user_id, conversation_id, is_public, summary, created_at";

fn evaluation_from_row(row: &Row<'_>) -> Result<Evaluation, StoreError> {
    let decision_raw: String = row.get(3)?;
    let uncertainty_raw: String = row.get(4)?;
    Ok(Evaluation {
        idea_id: parse_uuid(&row.get::<_, String>(0)?)?,
        viability: row.get::<_, i64>(1)? as u8,
        excellence: row.get::<_, i64>(2)? as u8,
        decision: Decision::parse(&decision_raw)
            .ok_or_else(|| StoreError::Corrupt(format!("bad decision: {decision_raw}")))?,
        uncertainty: Band::parse(&uncertainty_raw)
            .ok_or_else(|| StoreError::Corrupt(format!("bad uncertainty: {uncertainty_raw}")))?,
        top_risks: list_from_json(&row.get::<_, String>(5)?)?,
        key_enablers: list_from_json(&row.get::<_, String>(6)?)?,
        created_at: from_epoch_ms(row.get(7)?)?,
    })
}

fn rating_from_row(row: &Row<'_>) -> Result<Rating, StoreError> {
    Ok(Rating {
        idea_id: parse_uuid(&row.get::<_, String>(0)?)?,
        elo_score: row.get(1)?,
        match_count: row.get::<_, i64>(2)? as u32,
        updated_at: from_epoch_ms(row.get(3)?)?,
    })
}

fn insert_evaluation_tx(tx: &Transaction<'_>, evaluation: &Evaluation) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO evaluations ( \
            idea_id, viability, excellence, decision, uncertainty, \
            top_risks, key_enablers, created_at \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            evaluation.idea_id.to_string(),
            evaluation.viability as i64,
            evaluation.excellence as i64,
            evaluation.decision.as_str(),
            evaluation.uncertainty.as_str(),
            list_to_json(&evaluation.top_risks)?,
            list_to_json(&evaluation.key_enablers)?,
            epoch_ms(evaluation.created_at),
        ],
    )?;
    Ok(())
}

fn ensure_rating_tx(tx: &Transaction<'_>, idea_id: Uuid, now_ms: i64) -> Result<(), StoreError> {
    // A rating is created once and never deleted; re-eligibility is a no-op.
    tx.execute(
        "INSERT OR IGNORE INTO ratings (idea_id, elo_score, match_count, updated_at) \
         VALUES (?1, ?2, 0, ?3)",
        params![idea_id.to_string(), STARTING_ELO, now_ms],
    )?;
    Ok(())
}

// =============================================================================
// IdeaStore impl
// =============================================================================

#[async_trait]
impl IdeaStore for SqliteIdeaStore {
    async fn create_idea_with_evaluation(
        &self,
        idea: Idea,
        evaluation: Evaluation,
        create_rating: bool,
    ) -> Result<(), StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO ideas ( \
                        id, text, category, stage, user_id, conversation_id, \
                        is_public, summary, created_at \
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        idea.id.to_string(),
                        idea.text,
                        idea.category,
                        idea.stage,
                        idea.user_id.map(|u| u.to_string()),
                        idea.conversation_id.map(|u| u.to_string()),
                        if idea.is_public { 1 } else { 0 },
                        idea.summary,
                        epoch_ms(idea.created_at),
                    ],
                )?;
                insert_evaluation_tx(&tx, &evaluation)?;
                if create_rating {
                    ensure_rating_tx(&tx, idea.id, epoch_ms(evaluation.created_at))?;
                }
                tx.commit()?;
                Ok(())
            })
        })
        .await
    }

    async fn append_evaluation(
        &self,
        evaluation: Evaluation,
        create_rating: bool,
    ) -> Result<(), StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let tx = conn.transaction()?;
                let exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM ideas WHERE id = ?1",
                    params![evaluation.idea_id.to_string()],
                    |row| row.get(0),
                )?;
                if exists == 0 {
                    return Err(StoreError::IdeaNotFound(evaluation.idea_id));
                }
                insert_evaluation_tx(&tx, &evaluation)?;
                if create_rating {
                    ensure_rating_tx(&tx, evaluation.idea_id, epoch_ms(evaluation.created_at))?;
                }
                tx.commit()?;
                Ok(())
            })
        })
        .await
    }

    async fn idea(&self, id: Uuid) -> Result<Option<Idea>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let sql = format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(idea_from_row(row)?)),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn latest_evaluation(&self, idea_id: Uuid) -> Result<Option<Evaluation>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT idea_id, viability, excellence, decision, uncertainty, \
                            top_risks, key_enablers, created_at \
                     FROM evaluations WHERE idea_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                )?;
                let mut rows = stmt.query(params![idea_id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(evaluation_from_row(row)?)),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn rating(&self, idea_id: Uuid) -> Result<Option<Rating>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT idea_id, elo_score, match_count, updated_at \
                     FROM ratings WHERE idea_id = ?1",
                )?;
                let mut rows = stmt.query(params![idea_id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(rating_from_row(row)?)),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn apply_match(
        &self,
        a_new_elo: i64,
        b_new_elo: i64,
        record: MatchRecord,
    ) -> Result<(), StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let now_ms = epoch_ms(record.created_at);
                let tx = conn.transaction()?;
                for (idea_id, new_elo) in [(record.idea_a, a_new_elo), (record.idea_b, b_new_elo)]
                {
                    let updated = tx.execute(
                        "UPDATE ratings \
                         SET elo_score = ?1, match_count = match_count + 1, updated_at = ?2 \
                         WHERE idea_id = ?3",
                        params![new_elo, now_ms, idea_id.to_string()],
                    )?;
                    if updated == 0 {
                        return Err(StoreError::IdeaNotFound(idea_id));
                    }
                }
                tx.execute(
                    "INSERT INTO matches (idea_a, idea_b, winner, reasons, confidence, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.idea_a.to_string(),
                        record.idea_b.to_string(),
                        record.winner.as_str(),
                        list_to_json(&record.reasons)?,
                        record.confidence.as_str(),
                        now_ms,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
        })
        .await
    }

    async fn opponents_faced(&self, idea_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT idea_a, idea_b FROM matches WHERE idea_a = ?1 OR idea_b = ?1",
                )?;
                let id_str = idea_id.to_string();
                let mut rows = stmt.query(params![id_str])?;
                let mut opponents = Vec::new();
                while let Some(row) = rows.next()? {
                    let a: String = row.get(0)?;
                    let b: String = row.get(1)?;
                    let other = if a == id_str { b } else { a };
                    let other = parse_uuid(&other)?;
                    if !opponents.contains(&other) {
                        opponents.push(other);
                    }
                }
                Ok(opponents)
            })
        })
        .await
    }

    async fn rated_ideas(&self) -> Result<Vec<Rating>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT idea_id, elo_score, match_count, updated_at FROM ratings")?;
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(rating_from_row(row)?);
                }
                Ok(out)
            })
        })
        .await
    }

    async fn top_rated(&self, limit: u32, min_matches: u32) -> Result<Vec<RankedIdea>, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT i.id, i.text, i.category, i.stage, i.user_id, i.conversation_id, \
                            i.is_public, i.summary, i.created_at, \
                            r.elo_score, r.match_count, r.updated_at, \
                            e.viability, e.excellence, e.decision \
                     FROM ratings r \
                     JOIN ideas i ON i.id = r.idea_id \
                     JOIN evaluations e ON e.id = ( \
                        SELECT id FROM evaluations WHERE idea_id = r.idea_id \
                        ORDER BY created_at DESC, id DESC LIMIT 1 \
                     ) \
                     WHERE r.match_count >= ?1 \
                     ORDER BY r.elo_score DESC, i.created_at ASC \
                     LIMIT ?2",
                )?;
                let mut rows = stmt.query(params![min_matches as i64, limit as i64])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let idea = idea_from_row(row)?;
                    let rating = Rating {
                        idea_id: idea.id,
                        elo_score: row.get(9)?,
                        match_count: row.get::<_, i64>(10)? as u32,
                        updated_at: from_epoch_ms(row.get(11)?)?,
                    };
                    let decision_raw: String = row.get(14)?;
                    out.push(RankedIdea {
                        rating,
                        viability: row.get::<_, i64>(12)? as u8,
                        excellence: row.get::<_, i64>(13)? as u8,
                        decision: Decision::parse(&decision_raw).ok_or_else(|| {
                            StoreError::Corrupt(format!("bad decision: {decision_raw}"))
                        })?,
                        idea,
                    });
                }
                Ok(out)
            })
        })
        .await
    }

    async fn ranked_count(&self, min_matches: u32) -> Result<u64, StoreError> {
        self.run_blocking(move |store| {
            store.with_conn(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM ratings WHERE match_count >= ?1",
                    params![min_matches as i64],
                    |row| row.get(0),
                )?;
                Ok(count.max(0) as u64)
            })
        })
        .await
    }
}
