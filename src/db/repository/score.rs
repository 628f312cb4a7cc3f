use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{DeliveryRoute, ParameterScore};

pub fn insert_parameter_score(
    conn: &Connection,
    score: &ParameterScore,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO parameter_scores (id, request_id, route, parameter, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            score.id.to_string(),
            score.request_id.to_string(),
            score.route.as_str(),
            score.parameter,
            serde_json::to_string(score)?,
            score.created_at,
        ],
    )?;
    Ok(())
}

/// All scores for one (request, route), insertion order.
pub fn get_parameter_scores(
    conn: &Connection,
    request_id: Uuid,
    route: DeliveryRoute,
) -> Result<Vec<ParameterScore>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT payload FROM parameter_scores
         WHERE request_id = ?1 AND route = ?2
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![request_id.to_string(), route.as_str()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut scores = Vec::new();
    for row in rows {
        scores.push(serde_json::from_str(&row?)?);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::request::insert_request;
    use crate::models::AssessmentRequest;

    #[test]
    fn insert_and_list_by_route() {
        let conn = open_memory_database().unwrap();
        let req = AssessmentRequest::new("apixaban", vec![], vec![DeliveryRoute::Transdermal]);
        insert_request(&conn, &req).unwrap();

        let td = ParameterScore::new(
            req.id,
            DeliveryRoute::Transdermal,
            "Dose",
            Some(5.0),
            Some("mg".into()),
            7,
            0.25,
        );
        let tm = ParameterScore::new(
            req.id,
            DeliveryRoute::Transmucosal,
            "Dose",
            Some(5.0),
            Some("mg".into()),
            8,
            0.3,
        );
        insert_parameter_score(&conn, &td).unwrap();
        insert_parameter_score(&conn, &tm).unwrap();

        let scores = get_parameter_scores(&conn, req.id, DeliveryRoute::Transdermal).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].parameter, "Dose");
        assert_eq!(scores[0].raw_score, 7);
    }
}
