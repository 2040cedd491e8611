use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::documents::repo_types::{Document, Share, ShareWithRecipient, SharedDocument};

pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<Document>> {
    let rows = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, owner_id, title, description, storage_key, document_type, created_at
        FROM documents
        WHERE owner_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id_and_owner(
    db: &PgPool,
    id: Uuid,
    owner_id: Uuid,
) -> anyhow::Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, owner_id, title, description, storage_key, document_type, created_at
        FROM documents
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(db)
    .await?;
    Ok(doc)
}

pub async fn insert(
    db: &PgPool,
    owner_id: Uuid,
    title: &str,
    description: Option<&str>,
    storage_key: &str,
    document_type: Option<&str>,
) -> anyhow::Result<Document> {
    let doc = sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents (owner_id, title, description, storage_key, document_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, owner_id, title, description, storage_key, document_type, created_at
        "#,
    )
    .bind(owner_id)
    .bind(title)
    .bind(description)
    .bind(storage_key)
    .bind(document_type)
    .fetch_one(db)
    .await?;
    Ok(doc)
}

pub async fn delete_by_id<'e, E>(exec: E, id: Uuid) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn insert_share<'e, E>(
    exec: E,
    document_id: Uuid,
    shared_by: Uuid,
    shared_with: Uuid,
    permissions: &[String],
    expiry_date: Option<time::OffsetDateTime>,
) -> anyhow::Result<Share>
where
    E: PgExecutor<'e>,
{
    let share = sqlx::query_as::<_, Share>(
        r#"
        INSERT INTO document_shares (document_id, shared_by, shared_with, permissions, expiry_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, document_id, shared_by, shared_with, permissions, expiry_date, created_at
        "#,
    )
    .bind(document_id)
    .bind(shared_by)
    .bind(shared_with)
    .bind(permissions)
    .bind(expiry_date)
    .fetch_one(exec)
    .await?;
    Ok(share)
}

pub async fn shares_for_document(
    db: &PgPool,
    document_id: Uuid,
) -> anyhow::Result<Vec<ShareWithRecipient>> {
    let rows = sqlx::query_as::<_, ShareWithRecipient>(
        r#"
        SELECT s.id, s.permissions, s.expiry_date, s.created_at, u.email AS shared_with_email
        FROM document_shares s
        JOIN users u ON u.id = s.shared_with
        WHERE s.document_id = $1
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(document_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn delete_shares_for_document<'e, E>(exec: E, document_id: Uuid) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM document_shares WHERE document_id = $1")
        .bind(document_id)
        .execute(exec)
        .await?;
    Ok(())
}

/// Documents shared *to* a user through shares that have not expired.
/// Expired shares stay in the table but are inert for reads.
pub async fn list_shared_with(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<SharedDocument>> {
    let rows = sqlx::query_as::<_, SharedDocument>(
        r#"
        SELECT d.id, d.title, d.description, d.storage_key, d.document_type, d.created_at,
               u.name AS owner_name, ds.id AS share_id, ds.permissions, ds.expiry_date
        FROM documents d
        JOIN document_shares ds ON d.id = ds.document_id
        JOIN users u ON d.owner_id = u.id
        WHERE ds.shared_with = $1
          AND (ds.expiry_date IS NULL OR ds.expiry_date > NOW())
        ORDER BY ds.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// One share, addressed by share id, visible only to its recipient and only
/// while unexpired.
pub async fn find_active_share(
    db: &PgPool,
    share_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<SharedDocument>> {
    let row = sqlx::query_as::<_, SharedDocument>(
        r#"
        SELECT d.id, d.title, d.description, d.storage_key, d.document_type, d.created_at,
               u.name AS owner_name, ds.id AS share_id, ds.permissions, ds.expiry_date
        FROM document_shares ds
        JOIN documents d ON ds.document_id = d.id
        JOIN users u ON d.owner_id = u.id
        WHERE ds.id = $1 AND ds.shared_with = $2
          AND (ds.expiry_date IS NULL OR ds.expiry_date > NOW())
        "#,
    )
    .bind(share_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Resolve a document the user may download: their own, or one reaching them
/// through an active share.
pub async fn find_accessible(
    db: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(
        r#"
        SELECT DISTINCT d.id, d.owner_id, d.title, d.description, d.storage_key,
               d.document_type, d.created_at
        FROM documents d
        LEFT JOIN document_shares ds ON ds.document_id = d.id
        WHERE d.id = $1
          AND (d.owner_id = $2
               OR (ds.shared_with = $2
                   AND (ds.expiry_date IS NULL OR ds.expiry_date > NOW())))
        "#,
    )
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(doc)
}
