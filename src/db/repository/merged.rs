use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::MergedDataResult;

pub fn insert_merged_result(
    conn: &Connection,
    merged: &MergedDataResult,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO merged_results (id, request_id, category_id, payload,
         merge_confidence, low_confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            merged.id.to_string(),
            merged.request_id.to_string(),
            merged.category_id,
            serde_json::to_string(merged)?,
            merged.merge_confidence,
            merged.low_confidence as i64,
            merged.created_at,
        ],
    )?;
    Ok(())
}

/// Latest merged result for one (request, category), if any.
pub fn latest_merged_result(
    conn: &Connection,
    request_id: Uuid,
    category_id: &str,
) -> Result<Option<MergedDataResult>, DatabaseError> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM merged_results
             WHERE request_id = ?1 AND category_id = ?2
             ORDER BY created_at DESC LIMIT 1",
            params![request_id.to_string(), category_id],
            |row| row.get(0),
        )
        .optional()?;

    match payload {
        Some(p) => Ok(Some(serde_json::from_str(&p)?)),
        None => Ok(None),
    }
}

/// Latest merged result per category for one request.
pub fn latest_merged_results(
    conn: &Connection,
    request_id: Uuid,
) -> Result<Vec<MergedDataResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category_id, payload FROM merged_results
         WHERE request_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();
    for row in rows {
        let (category_id, payload) = row?;
        if seen.insert(category_id) {
            results.push(serde_json::from_str(&payload)?);
        }
    }
    Ok(results)
}
