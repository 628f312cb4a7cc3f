use std::collections::HashSet;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::SourceValidationResult;

pub fn insert_source_validation(
    conn: &Connection,
    result: &SourceValidationResult,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO source_validations (id, request_id, category_id, provider_id,
         payload, validation_score, validation_passed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.id.to_string(),
            result.request_id.to_string(),
            result.category_id,
            result.provider_id,
            serde_json::to_string(result)?,
            result.validation_score,
            result.validation_passed as i64,
            result.created_at,
        ],
    )?;
    Ok(())
}

/// Latest validation result per provider for one (request, category).
/// Older records remain as an audit trail but are superseded.
pub fn latest_source_validations(
    conn: &Connection,
    request_id: Uuid,
    category_id: &str,
) -> Result<Vec<SourceValidationResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT provider_id, payload FROM source_validations
         WHERE request_id = ?1 AND category_id = ?2
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string(), category_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();
    for row in rows {
        let (provider_id, payload) = row?;
        if seen.insert(provider_id) {
            results.push(serde_json::from_str(&payload)?);
        }
    }
    Ok(results)
}
