use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

/// Audit row joined with the document title for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Option<Uuid>,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: OffsetDateTime,
    pub document_title: Option<String>,
}

/// Append one audit row. Generic over the executor so callers can pass the
/// pool or an open transaction.
pub async fn record<'e, E>(
    exec: E,
    user_id: Uuid,
    document_id: Option<Uuid>,
    action: &str,
    detail: Option<&str>,
) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_logs (user_id, document_id, action, detail)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(document_id)
    .bind(action)
    .bind(detail)
    .execute(exec)
    .await?;
    Ok(())
}

/// Latest audit rows for a user, newest first, capped at 100.
pub async fn list_for_user<'e, E>(exec: E, user_id: Uuid) -> anyhow::Result<Vec<AuditLogEntry>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, AuditLogEntry>(
        r#"
        SELECT al.id, al.user_id, al.document_id, al.action, al.detail, al.created_at,
               d.title AS document_title
        FROM audit_logs al
        LEFT JOIN documents d ON al.document_id = d.id
        WHERE al.user_id = $1
        ORDER BY al.created_at DESC
        LIMIT 100
        "#,
    )
    .bind(user_id)
    .fetch_all(exec)
    .await?;
    Ok(rows)
}

/// Remove audit rows referencing a document; part of document deletion.
pub async fn delete_for_document<'e, E>(exec: E, document_id: Uuid) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM audit_logs WHERE document_id = $1")
        .bind(document_id)
        .execute(exec)
        .await?;
    Ok(())
}
