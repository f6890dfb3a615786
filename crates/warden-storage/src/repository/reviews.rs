//! Review items repository.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use warden_core::review::{QueueError, ReviewId, ReviewItem, ReviewStatus, StatusFilter};
use warden_core::{Payload, Severity};

use crate::error::{Result, StorageError};

const SELECT_COLUMNS: &str = "SELECT review_id, created_at, priority, reason, payload_snapshot,
        status, decision, reviewer_notes, reviewed_at
 FROM review_items";

/// Repository for review item operations.
pub struct ReviewsRepo;

impl ReviewsRepo {
    /// Insert a new review item. Returns its queue position.
    pub fn insert(conn: &Connection, item: &ReviewItem) -> Result<i64> {
        let payload_json = serde_json::to_string(&item.payload_snapshot)?;

        conn.execute(
            "INSERT INTO review_items (review_id, created_at, priority, reason, payload_snapshot,
                                       status, decision, reviewer_notes, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.review_id.as_str(),
                item.created_at.to_rfc3339(),
                item.priority.as_str(),
                item.reason,
                payload_json,
                item.status.as_str(),
                item.decision,
                item.reviewer_notes,
                item.reviewed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a review item by id.
    pub fn get(conn: &Connection, id: &ReviewId) -> Result<Option<ReviewItem>> {
        let sql = format!("{} WHERE review_id = ?1", SELECT_COLUMNS);
        let item = conn
            .query_row(&sql, [id.as_str()], row_to_item)
            .optional()?;
        Ok(item)
    }

    /// List review items in queue order.
    pub fn list(conn: &Connection, filter: StatusFilter) -> Result<Vec<ReviewItem>> {
        let (sql, status) = match filter {
            StatusFilter::All => (format!("{} ORDER BY seq", SELECT_COLUMNS), None),
            StatusFilter::Pending => (
                format!("{} WHERE status = ?1 ORDER BY seq", SELECT_COLUMNS),
                Some(ReviewStatus::Pending),
            ),
            StatusFilter::Reviewed => (
                format!("{} WHERE status = ?1 ORDER BY seq", SELECT_COLUMNS),
                Some(ReviewStatus::Reviewed),
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = match status {
            Some(status) => stmt.query_map([status.as_str()], row_to_item)?,
            None => stmt.query_map([], row_to_item)?,
        };

        let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Resolve a pending item in a single statement.
    ///
    /// Only a row still in `pending` is touched, so two racing reviewers
    /// cannot both succeed, even from different processes.
    pub fn mark_reviewed(
        conn: &Connection,
        id: &ReviewId,
        decision: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<ReviewItem> {
        let updated = conn.execute(
            "UPDATE review_items
             SET status = 'reviewed', decision = ?1, reviewer_notes = ?2, reviewed_at = ?3
             WHERE review_id = ?4 AND status = 'pending'",
            params![decision, notes, at.to_rfc3339(), id.as_str()],
        )?;

        if updated == 0 {
            return Err(match Self::get(conn, id)? {
                Some(_) => QueueError::AlreadyReviewed(id.clone()).into(),
                None => QueueError::NotFound(id.clone()).into(),
            });
        }

        Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Count all review items.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM review_items", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count items by status.
    pub fn count_by_status(conn: &Connection, status: ReviewStatus) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM review_items WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ReviewItem> {
    let priority: String = row.get(2)?;
    let payload_json: String = row.get(4)?;
    let status: String = row.get(5)?;

    Ok(ReviewItem {
        review_id: ReviewId::from(row.get::<_, String>(0)?),
        created_at: parse_datetime(1, &row.get::<_, String>(1)?)?,
        priority: Severity::parse(&priority)
            .ok_or_else(|| conversion_error(2, format!("unknown priority: {}", priority)))?,
        reason: row.get(3)?,
        payload_snapshot: serde_json::from_str::<Payload>(&payload_json)
            .map_err(|e| conversion_error(4, e.to_string()))?,
        status: ReviewStatus::parse(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown status: {}", status)))?,
        decision: row.get(6)?,
        reviewer_notes: row.get(7)?,
        reviewed_at: row
            .get::<_, Option<String>>(8)?
            .map(|s| parse_datetime(8, &s))
            .transpose()?,
    })
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn parse_datetime(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .map_err(|_| conversion_error(column, format!("invalid timestamp: {}", s)))
}
