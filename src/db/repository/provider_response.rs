use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{ProviderResponse, StandardizedResponse};

pub fn insert_provider_response(
    conn: &Connection,
    resp: &ProviderResponse,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO provider_responses (id, request_id, category_id, provider_id,
         temperature, raw_response, standardized, cost_estimate, latency_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            resp.id.to_string(),
            resp.request_id.to_string(),
            resp.category_id,
            resp.provider_id,
            resp.temperature,
            resp.raw_response,
            serde_json::to_string(&resp.standardized)?,
            resp.cost_estimate,
            resp.latency_ms as i64,
            resp.created_at,
        ],
    )?;
    Ok(())
}

/// All responses for one (request, category), oldest first.
pub fn get_provider_responses(
    conn: &Connection,
    request_id: Uuid,
    category_id: &str,
) -> Result<Vec<ProviderResponse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, category_id, provider_id, temperature, raw_response,
         standardized, cost_estimate, latency_ms, created_at
         FROM provider_responses
         WHERE request_id = ?1 AND category_id = ?2
         ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string(), category_id], |row| {
        Ok(ResponseRow {
            id: row.get(0)?,
            request_id: row.get(1)?,
            category_id: row.get(2)?,
            provider_id: row.get(3)?,
            temperature: row.get(4)?,
            raw_response: row.get(5)?,
            standardized: row.get(6)?,
            cost_estimate: row.get(7)?,
            latency_ms: row.get(8)?,
            created_at: row.get(9)?,
        })
    })?;

    let mut responses = Vec::new();
    for row in rows {
        responses.push(response_from_row(row?)?);
    }
    Ok(responses)
}

struct ResponseRow {
    id: String,
    request_id: String,
    category_id: String,
    provider_id: String,
    temperature: f32,
    raw_response: String,
    standardized: String,
    cost_estimate: f64,
    latency_ms: i64,
    created_at: String,
}

fn response_from_row(row: ResponseRow) -> Result<ProviderResponse, DatabaseError> {
    let standardized: StandardizedResponse = serde_json::from_str(&row.standardized)?;
    let parse_id = |field: &str, value: &str| {
        Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidEnum {
            field: field.to_string(),
            value: value.to_string(),
        })
    };
    Ok(ProviderResponse {
        id: parse_id("id", &row.id)?,
        request_id: parse_id("request_id", &row.request_id)?,
        category_id: row.category_id,
        provider_id: row.provider_id,
        temperature: row.temperature,
        raw_response: row.raw_response,
        standardized,
        cost_estimate: row.cost_estimate,
        latency_ms: row.latency_ms as u64,
        created_at: row.created_at,
    })
}
