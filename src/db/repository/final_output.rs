use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::FinalOutput;

/// Insert the decision document if none exists yet for this request.
///
/// Returns true if this call wrote the row, false when another write got
/// there first. Either way the stored document is authoritative; callers
/// should read it back with [`get_final_output`].
pub fn insert_final_output_once(
    conn: &Connection,
    output: &FinalOutput,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO final_outputs (id, request_id, payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            output.id.to_string(),
            output.request_id.to_string(),
            serde_json::to_string(output)?,
            output.created_at,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_final_output(
    conn: &Connection,
    request_id: Uuid,
) -> Result<FinalOutput, DatabaseError> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM final_outputs WHERE request_id = ?1",
            params![request_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match payload {
        Some(p) => Ok(serde_json::from_str(&p)?),
        None => Err(DatabaseError::NotFound {
            entity_type: "final_output".to_string(),
            id: request_id.to_string(),
        }),
    }
}
