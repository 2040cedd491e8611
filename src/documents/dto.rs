use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::documents::repo_types::{Document, Share, ShareWithRecipient, SharedDocument};

/// Dashboard payload: the caller's own documents plus documents reaching them
/// through non-expired shares.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub owned: Vec<Document>,
    pub shared_with_me: Vec<SharedDocument>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub document_id: Uuid,
    /// Recipient addressed by email; resolved to a user id at share time.
    pub shared_with: String,
    pub permissions: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry_date: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share: Share,
}

/// Owner's view of a document and everyone it is shared with.
#[derive(Debug, Serialize)]
pub struct ShareListResponse {
    pub document: Document,
    pub shares: Vec<ShareWithRecipient>,
}

/// Recipient's view of a single shared document.
#[derive(Debug, Serialize)]
pub struct SharedViewResponse {
    pub document: SharedDocument,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_request_parses_expiry_as_rfc3339() {
        let req: ShareRequest = serde_json::from_str(
            r#"{
                "document_id": "6e1cbb72-4e2f-4a09-9a1c-2a25c83f0d10",
                "shared_with": "bob@x.com",
                "permissions": ["view", "download"],
                "expiry_date": "2026-09-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(req.shared_with, "bob@x.com");
        assert_eq!(req.permissions, vec!["view", "download"]);
        assert_eq!(req.expiry_date.unwrap().year(), 2026);
    }

    #[test]
    fn share_request_expiry_is_optional() {
        let req: ShareRequest = serde_json::from_str(
            r#"{
                "document_id": "6e1cbb72-4e2f-4a09-9a1c-2a25c83f0d10",
                "shared_with": "bob@x.com",
                "permissions": ["view"]
            }"#,
        )
        .unwrap();
        assert!(req.expiry_date.is_none());
    }

    #[test]
    fn shared_document_hides_storage_key() {
        let doc = SharedDocument {
            id: Uuid::new_v4(),
            title: "T1".into(),
            description: None,
            storage_key: "uploads/secret-key.pdf".into(),
            document_type: Some("report".into()),
            created_at: OffsetDateTime::now_utc(),
            owner_name: "Alice".into(),
            share_id: Uuid::new_v4(),
            permissions: vec!["view".into()],
            expiry_date: None,
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(json.contains("Alice"));
    }
}
