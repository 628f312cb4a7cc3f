use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::CategoryValidation;

pub fn insert_category_validation(
    conn: &Connection,
    validation: &CategoryValidation,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO category_validations (id, request_id, category_id, payload,
         validation_passed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            validation.id.to_string(),
            validation.request_id.to_string(),
            validation.category_id,
            serde_json::to_string(validation)?,
            validation.validation_passed as i64,
            validation.created_at,
        ],
    )?;
    Ok(())
}

/// Latest aggregate for one (request, category), if any.
pub fn latest_category_validation(
    conn: &Connection,
    request_id: Uuid,
    category_id: &str,
) -> Result<Option<CategoryValidation>, DatabaseError> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM category_validations
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

/// Latest aggregate per category for one request.
pub fn latest_category_validations(
    conn: &Connection,
    request_id: Uuid,
) -> Result<Vec<CategoryValidation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category_id, payload FROM category_validations
         WHERE request_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut seen = std::collections::HashSet::new();
    let mut results = Vec::new();
    for row in rows {
        let (category_id, payload) = row?;
        if seen.insert(category_id) {
            results.push(serde_json::from_str(&payload)?);
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::request::insert_request;
    use crate::models::{AssessmentRequest, StepResult};

    fn make_validation(request_id: Uuid, category_id: &str, passed: bool) -> CategoryValidation {
        CategoryValidation::new(
            request_id,
            category_id,
            vec![StepResult {
                step_id: "minimum_source_count".into(),
                label: "Minimum source count".into(),
                passed,
                mandatory: true,
                score: if passed { 1.0 } else { 0.0 },
                message: String::new(),
            }],
        )
    }

    #[test]
    fn latest_supersedes_prior() {
        let conn = open_memory_database().unwrap();
        let req = AssessmentRequest::new("apixaban", vec![], vec![]);
        insert_request(&conn, &req).unwrap();

        insert_category_validation(&conn, &make_validation(req.id, "safety_profile", false)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        insert_category_validation(&conn, &make_validation(req.id, "safety_profile", true)).unwrap();

        let latest = latest_category_validation(&conn, req.id, "safety_profile")
            .unwrap()
            .unwrap();
        assert!(latest.validation_passed);
    }

    #[test]
    fn per_category_latest_listing() {
        let conn = open_memory_database().unwrap();
        let req = AssessmentRequest::new("apixaban", vec![], vec![]);
        insert_request(&conn, &req).unwrap();

        insert_category_validation(&conn, &make_validation(req.id, "a", true)).unwrap();
        insert_category_validation(&conn, &make_validation(req.id, "b", false)).unwrap();

        let all = latest_category_validations(&conn, req.id).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn missing_returns_none() {
        let conn = open_memory_database().unwrap();
        let req = AssessmentRequest::new("apixaban", vec![], vec![]);
        insert_request(&conn, &req).unwrap();
        assert!(latest_category_validation(&conn, req.id, "nope").unwrap().is_none());
    }
}
