use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Insert an audit row for an inbound request, returning its id.
pub async fn insert_request(
    pool: &SqlitePool,
    source_ip: Option<&str>,
    user_agent: Option<&str>,
    method: &str,
    request_url: &str,
    request_raw: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO requests (source_ip, user_agent, method, request_url, request_raw, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id
        "#,
    )
    .bind(source_ip)
    .bind(user_agent)
    .bind(method)
    .bind(request_url)
    .bind(request_raw)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

/// Record the HTTP status eventually returned for a logged request.
pub async fn set_request_status(
    pool: &SqlitePool,
    request_id: i64,
    response_status: u16,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE requests SET response_status = ?1 WHERE id = ?2")
        .bind(response_status as i64)
        .bind(request_id)
        .execute(pool)
        .await?;

    Ok(())
}
