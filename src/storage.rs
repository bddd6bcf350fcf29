use crate::errors::FeedbackError;
use crate::models::{FeedbackItem, NewFeedback, Status, VoteDirection, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::{collections::HashMap, path::Path};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    categories TEXT NOT NULL,
    rating INTEGER NOT NULL,
    comment TEXT,
    status TEXT NOT NULL DEFAULT 'New',
    votes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feedback_votes (
    feedback_id INTEGER NOT NULL REFERENCES feedback(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    vote INTEGER NOT NULL CHECK (vote IN (-1, 1)),
    PRIMARY KEY (feedback_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback(created_at);
CREATE INDEX IF NOT EXISTS idx_feedback_votes_user ON feedback_votes(user_id);
";

const SELECT_FEEDBACK: &str =
    "SELECT id, categories, rating, comment, status, votes, created_at FROM feedback";

/// SQLite-backed feedback table and vote ledger.
pub struct FeedbackStore {
    conn: Connection,
}

impl FeedbackStore {
    pub fn open(path: &Path) -> Result<Self, FeedbackError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, FeedbackError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, FeedbackError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn submit(&self, feedback: &NewFeedback, now: NaiveDateTime) -> Result<i64, FeedbackError> {
        let categories = serde_json::to_string(&feedback.categories)?;
        self.conn.execute(
            "INSERT INTO feedback (categories, rating, comment, status, votes, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                categories,
                feedback.rating,
                feedback.comment,
                Status::New,
                now.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Newest first; ties keep the most recently inserted row first.
    pub fn list(&self, status: Option<Status>) -> Result<Vec<FeedbackItem>, FeedbackError> {
        let rows = match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_FEEDBACK} WHERE status = ?1 ORDER BY created_at DESC, id DESC"
                ))?;
                let rows = stmt
                    .query_map(params![status], raw_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{SELECT_FEEDBACK} ORDER BY created_at DESC, id DESC"))?;
                let rows = stmt
                    .query_map([], raw_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        rows.into_iter().map(RawRow::into_item).collect()
    }

    pub fn get(&self, id: i64) -> Result<Option<FeedbackItem>, FeedbackError> {
        let raw = self
            .conn
            .query_row(
                &format!("{SELECT_FEEDBACK} WHERE id = ?1"),
                params![id],
                raw_row,
            )
            .optional()?;
        raw.map(RawRow::into_item).transpose()
    }

    pub fn update_status(&self, id: i64, status: Status) -> Result<(), FeedbackError> {
        let changed = self.conn.execute(
            "UPDATE feedback SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        if changed == 0 {
            return Err(FeedbackError::NotFound(id));
        }
        Ok(())
    }

    /// Records `user_id`'s vote on an item, replacing any earlier vote, and
    /// returns the recomputed tally.
    pub fn cast_vote(
        &mut self,
        feedback_id: i64,
        user_id: &str,
        direction: VoteDirection,
    ) -> Result<i64, FeedbackError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM feedback WHERE id = ?1",
                params![feedback_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(FeedbackError::NotFound(feedback_id));
        }

        let previous: Option<i64> = tx
            .query_row(
                "SELECT vote FROM feedback_votes WHERE feedback_id = ?1 AND user_id = ?2",
                params![feedback_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        let value = i64::from(direction.value());
        match previous {
            Some(current) if current == value => {}
            Some(_) => {
                tx.execute(
                    "UPDATE feedback_votes SET vote = ?3 WHERE feedback_id = ?1 AND user_id = ?2",
                    params![feedback_id, user_id, value],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO feedback_votes (feedback_id, user_id, vote) VALUES (?1, ?2, ?3)",
                    params![feedback_id, user_id, value],
                )?;
            }
        }

        let tally: i64 = tx.query_row(
            "SELECT COALESCE(SUM(vote), 0) FROM feedback_votes WHERE feedback_id = ?1",
            params![feedback_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE feedback SET votes = ?1 WHERE id = ?2",
            params![tally, feedback_id],
        )?;
        tx.commit()?;

        Ok(tally)
    }

    pub fn votes_for_user(&self, user_id: &str) -> Result<HashMap<i64, VoteDirection>, FeedbackError> {
        let mut stmt = self
            .conn
            .prepare("SELECT feedback_id, vote FROM feedback_votes WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut votes = HashMap::new();
        for row in rows {
            let (feedback_id, value) = row?;
            if let Some(direction) = VoteDirection::from_value(value) {
                votes.insert(feedback_id, direction);
            }
        }
        Ok(votes)
    }
}

struct RawRow {
    id: i64,
    categories: String,
    rating: u8,
    comment: Option<String>,
    status: Status,
    votes: i64,
    created_at: String,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        categories: row.get(1)?,
        rating: row.get(2)?,
        comment: row.get(3)?,
        status: row.get(4)?,
        votes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl RawRow {
    fn into_item(self) -> Result<FeedbackItem, FeedbackError> {
        Ok(FeedbackItem {
            id: self.id,
            categories: serde_json::from_str(&self.categories)?,
            rating: self.rating,
            comment: self.comment.unwrap_or_default(),
            status: self.status,
            votes: self.votes,
            created_at: self.created_at,
        })
    }
}
