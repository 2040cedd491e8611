use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Document metadata row. The object itself lives in the bucket under
/// `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub document_type: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Share grant. The recipient is stored as a resolved user id; the email used
/// to address the share is only a lookup input.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Share {
    pub id: Uuid,
    pub document_id: Uuid,
    pub shared_by: Uuid,
    pub shared_with: Uuid,
    pub permissions: Vec<String>,
    pub expiry_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Share joined with the recipient's email, for the owner's share listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShareWithRecipient {
    pub id: Uuid,
    pub permissions: Vec<String>,
    pub expiry_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub shared_with_email: String,
}

/// A document visible to a recipient through a non-expired share.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SharedDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub document_type: Option<String>,
    pub created_at: OffsetDateTime,
    pub owner_name: String,
    pub share_id: Uuid,
    pub permissions: Vec<String>,
    pub expiry_date: Option<OffsetDateTime>,
}
