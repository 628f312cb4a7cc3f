use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{now_ts, AssessmentRequest, DeliveryRoute, RequestStatus};

pub fn insert_request(conn: &Connection, req: &AssessmentRequest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO requests (id, drug_name, categories, routes, status, progress,
         error_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            req.id.to_string(),
            req.drug_name,
            serde_json::to_string(&req.categories)?,
            serde_json::to_string(&req.routes)?,
            req.status.as_str(),
            req.progress,
            req.error_reason,
            req.created_at,
            req.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: Uuid) -> Result<AssessmentRequest, DatabaseError> {
    conn.query_row(
        "SELECT id, drug_name, categories, routes, status, progress, error_reason,
         created_at, updated_at FROM requests WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(RequestRow {
                id: row.get(0)?,
                drug_name: row.get(1)?,
                categories: row.get(2)?,
                routes: row.get(3)?,
                status: row.get(4)?,
                progress: row.get(5)?,
                error_reason: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
            entity_type: "request".to_string(),
            id: id.to_string(),
        },
        _ => DatabaseError::Sqlite(e),
    })
    .and_then(request_from_row)
}

/// Update status (and optionally the failure reason). The orchestrator is
/// the only caller; it serializes updates per request.
pub fn update_request_status(
    conn: &Connection,
    id: Uuid,
    status: RequestStatus,
    error_reason: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE requests SET status = ?1, error_reason = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), error_reason, now_ts(), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "request".to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_request_progress(
    conn: &Connection,
    id: Uuid,
    progress: f32,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE requests SET progress = ?1, updated_at = ?2 WHERE id = ?3",
        params![progress.clamp(0.0, 100.0), now_ts(), id.to_string()],
    )?;
    Ok(())
}

struct RequestRow {
    id: String,
    drug_name: String,
    categories: String,
    routes: String,
    status: String,
    progress: f32,
    error_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

fn request_from_row(row: RequestRow) -> Result<AssessmentRequest, DatabaseError> {
    let status = RequestStatus::from_str(&row.status).ok_or(DatabaseError::InvalidEnum {
        field: "status".to_string(),
        value: row.status.clone(),
    })?;
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
        field: "id".to_string(),
        value: row.id.clone(),
    })?;
    let categories: Vec<String> = serde_json::from_str(&row.categories)?;
    let routes: Vec<DeliveryRoute> = serde_json::from_str(&row.routes)?;
    Ok(AssessmentRequest {
        id,
        drug_name: row.drug_name,
        categories,
        routes,
        status,
        progress: row.progress,
        error_reason: row.error_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn make_request() -> AssessmentRequest {
        AssessmentRequest::new(
            "apixaban",
            vec!["market_overview".into(), "physicochemical".into()],
            vec![DeliveryRoute::Transdermal],
        )
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = open_memory_database().unwrap();
        let req = make_request();
        insert_request(&conn, &req).unwrap();

        let loaded = get_request(&conn, req.id).unwrap();
        assert_eq!(loaded.drug_name, "apixaban");
        assert_eq!(loaded.categories.len(), 2);
        assert_eq!(loaded.status, RequestStatus::Submitted);
        assert_eq!(loaded.routes, vec![DeliveryRoute::Transdermal]);
    }

    #[test]
    fn get_missing_request_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_request(&conn, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn status_update_persists() {
        let conn = open_memory_database().unwrap();
        let req = make_request();
        insert_request(&conn, &req).unwrap();

        update_request_status(&conn, req.id, RequestStatus::Collecting, None).unwrap();
        assert_eq!(get_request(&conn, req.id).unwrap().status, RequestStatus::Collecting);

        update_request_status(&conn, req.id, RequestStatus::Failed, Some("failure ratio exceeded"))
            .unwrap();
        let loaded = get_request(&conn, req.id).unwrap();
        assert_eq!(loaded.status, RequestStatus::Failed);
        assert_eq!(loaded.error_reason.as_deref(), Some("failure ratio exceeded"));
    }

    #[test]
    fn status_update_on_missing_request_fails() {
        let conn = open_memory_database().unwrap();
        let err =
            update_request_status(&conn, Uuid::new_v4(), RequestStatus::Collecting, None).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn progress_clamped() {
        let conn = open_memory_database().unwrap();
        let req = make_request();
        insert_request(&conn, &req).unwrap();
        update_request_progress(&conn, req.id, 130.0).unwrap();
        assert_eq!(get_request(&conn, req.id).unwrap().progress, 100.0);
    }
}
