/// Identity verification workflow
///
/// Owners upload documents and submit them for review; the admin lifecycle
/// manager resolves pending verifications when it approves or rejects the
/// account.
mod manager;

pub use manager::KycManager;

use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review decision on a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDecision {
    PendingReview,
    Approved,
    Rejected,
}

impl KycDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycDecision::PendingReview => "pending_review",
            KycDecision::Approved => "approved",
            KycDecision::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s {
            "pending_review" => Ok(KycDecision::PendingReview),
            "approved" => Ok(KycDecision::Approved),
            "rejected" => Ok(KycDecision::Rejected),
            _ => Err(HubError::Validation(format!("Invalid decision: {}", s))),
        }
    }
}

/// A verification submission and its review outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycVerification {
    pub id: String,
    pub user_id: String,
    pub decision: KycDecision,
    pub reason: Option<String>,
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// An uploaded identity document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycDocument {
    pub id: String,
    pub user_id: String,
    pub document_type: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub checksum: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A pending verification joined with the submitter's identity,
/// for the admin review queue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVerification {
    pub verification: KycVerification,
    pub email: String,
    pub full_name: Option<String>,
}
