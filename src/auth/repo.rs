use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Find a user by email.
pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, identity_number, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, identity_number, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// True when either the email or the identity number is already registered.
pub async fn exists(db: &PgPool, email: &str, identity_number: &str) -> anyhow::Result<bool> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 OR identity_number = $2")
            .bind(email)
            .bind(identity_number)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

/// Create a new user with a hashed password.
pub async fn create(
    db: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    identity_number: &str,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, identity_number)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, password_hash, identity_number, created_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(identity_number)
    .fetch_one(db)
    .await?;
    Ok(user)
}

pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// True when `email` belongs to an account other than `id`.
pub async fn email_taken_by_other(db: &PgPool, email: &str, id: Uuid) -> anyhow::Result<bool> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id != $2")
            .bind(email)
            .bind(id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET name = $1, email = $2
        WHERE id = $3
        RETURNING id, name, email, password_hash, identity_number, created_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(user)
}
