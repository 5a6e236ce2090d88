/// KYC verification manager
use crate::{
    account::UserState,
    authz::{self, Capability, Role},
    doc_store::{self, DocumentBackend},
    error::{HubError, HubResult},
    kyc::{KycDecision, KycDocument, KycVerification, PendingVerification},
};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Manages verification submissions and their documents
#[derive(Clone)]
pub struct KycManager {
    db: SqlitePool,
    documents: Arc<dyn DocumentBackend>,
    upload_limit: usize,
}

impl KycManager {
    pub fn new(db: SqlitePool, documents: Arc<dyn DocumentBackend>, upload_limit: usize) -> Self {
        Self {
            db,
            documents,
            upload_limit,
        }
    }

    /// Store an identity document for the account.
    ///
    /// Only permitted while the account may still submit KYC (REGISTERED
    /// or REJECTED). The file lands in the document store under an
    /// account-scoped path; the row records its checksum.
    pub async fn upload_document(
        &self,
        user_id: &str,
        role: Role,
        state: UserState,
        document_type: &str,
        file_name: &str,
        mime_type: Option<&str>,
        data: Vec<u8>,
    ) -> HubResult<KycDocument> {
        authz::require(role, state, Capability::SubmitKyc)?;

        if data.is_empty() {
            return Err(HubError::Validation("Document is empty".to_string()));
        }
        if data.len() > self.upload_limit {
            return Err(HubError::Validation(format!(
                "Document exceeds upload limit of {} bytes",
                self.upload_limit
            )));
        }

        let document_id = Uuid::new_v4().to_string();
        let checksum = doc_store::checksum(&data);
        let file_size = data.len() as i64;
        let file_path = format!("{}/{}", user_id, document_id);
        let now = Utc::now();

        self.documents.put(user_id, &document_id, data).await?;

        sqlx::query(
            "INSERT INTO kyc_documents
             (id, user_id, document_type, file_name, file_path, file_size, mime_type, checksum, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document_id)
        .bind(user_id)
        .bind(document_type)
        .bind(file_name)
        .bind(&file_path)
        .bind(file_size)
        .bind(mime_type)
        .bind(&checksum)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(KycDocument {
            id: document_id,
            user_id: user_id.to_string(),
            document_type: document_type.to_string(),
            file_name: file_name.to_string(),
            file_path,
            file_size: Some(file_size),
            mime_type: mime_type.map(|s| s.to_string()),
            checksum,
            uploaded_at: now,
        })
    }

    /// Submit uploaded documents for review.
    ///
    /// Creates a pending verification and moves the account to
    /// KYC_SUBMITTED in the same transaction, so the queue entry and the
    /// state change are inseparable.
    pub async fn submit(
        &self,
        user_id: &str,
        role: Role,
        state: UserState,
    ) -> HubResult<KycVerification> {
        authz::require(role, state, Capability::SubmitKyc)?;

        let mut tx = self.db.begin().await?;

        let doc_count: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM kyc_documents WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?
                .get("count");
        if doc_count == 0 {
            return Err(HubError::Validation(
                "At least one document must be uploaded before submitting".to_string(),
            ));
        }

        let pending = sqlx::query(
            "SELECT id FROM kyc_verifications WHERE user_id = ? AND decision = 'pending_review'",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if pending.is_some() {
            return Err(HubError::Conflict(
                "A verification is already awaiting review".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO kyc_verifications (id, user_id, decision, created_at)
             VALUES (?, ?, 'pending_review', ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE profiles SET state = ?, updated_at = ? WHERE id = ?")
            .bind(UserState::KycSubmitted.as_str())
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Verification submitted for review");

        Ok(KycVerification {
            id,
            user_id: user_id.to_string(),
            decision: KycDecision::PendingReview,
            reason: None,
            admin_id: None,
            created_at: now,
            reviewed_at: None,
        })
    }

    /// Most recent verification for an account, if any
    pub async fn latest_verification(&self, user_id: &str) -> HubResult<Option<KycVerification>> {
        let row = sqlx::query(
            "SELECT id, user_id, decision, reason, admin_id, created_at, reviewed_at
             FROM kyc_verifications WHERE user_id = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(parse_verification_row).transpose()
    }

    /// Verifications awaiting review, oldest first, with submitter identity
    pub async fn pending_verifications(&self) -> HubResult<Vec<PendingVerification>> {
        let rows = sqlx::query(
            "SELECT v.id, v.user_id, v.decision, v.reason, v.admin_id, v.created_at, v.reviewed_at,
                    p.email, p.full_name
             FROM kyc_verifications v
             JOIN profiles p ON p.id = v.user_id
             WHERE v.decision = 'pending_review'
             ORDER BY v.created_at ASC",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingVerification {
                    verification: parse_verification_row(row)?,
                    email: row.get("email"),
                    full_name: row.get("full_name"),
                })
            })
            .collect()
    }

    /// Documents uploaded by an account
    pub async fn list_documents(&self, user_id: &str) -> HubResult<Vec<KycDocument>> {
        let rows = sqlx::query(
            "SELECT id, user_id, document_type, file_name, file_path, file_size, mime_type,
                    checksum, uploaded_at
             FROM kyc_documents WHERE user_id = ? ORDER BY uploaded_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_document_row).collect()
    }

    /// Fetch a document's content. Permitted for the owner and for admins
    /// reviewing the queue.
    pub async fn document_content(
        &self,
        requester_id: &str,
        requester_role: Role,
        requester_state: UserState,
        document_id: &str,
    ) -> HubResult<(KycDocument, Vec<u8>)> {
        let row = sqlx::query(
            "SELECT id, user_id, document_type, file_name, file_path, file_size, mime_type,
                    checksum, uploaded_at
             FROM kyc_documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.db)
        .await?;
        let document = match row {
            Some(row) => parse_document_row(&row)?,
            None => {
                return Err(HubError::NotFound(format!(
                    "No document with id {}",
                    document_id
                )))
            }
        };

        if document.user_id != requester_id {
            authz::require(requester_role, requester_state, Capability::AccessAdminPanel)?;
        }

        match self.documents.get(&document.user_id, &document.id).await? {
            Some(data) => Ok((document, data)),
            None => Err(HubError::DocumentStorage(format!(
                "Document {} missing from storage",
                document_id
            ))),
        }
    }
}

fn parse_verification_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<KycVerification> {
    Ok(KycVerification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        decision: KycDecision::from_str(row.get("decision"))?,
        reason: row.get("reason"),
        admin_id: row.get("admin_id"),
        created_at: row.get("created_at"),
        reviewed_at: row.get::<Option<DateTime<Utc>>, _>("reviewed_at"),
    })
}

fn parse_document_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<KycDocument> {
    Ok(KycDocument {
        id: row.get("id"),
        user_id: row.get("user_id"),
        document_type: row.get("document_type"),
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        checksum: row.get("checksum"),
        uploaded_at: row.get("uploaded_at"),
    })
}
