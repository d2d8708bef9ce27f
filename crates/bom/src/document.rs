//! BOM document aggregate: header, lifecycle, audit fields and the owned forest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgeerp_core::{AggregateRoot, BomDocumentId, DomainError, DomainResult, UserId};

use crate::store::BomForest;

/// Document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BomStatus {
    Draft,
    Approved,
    Active,
    Obsolete,
}

impl BomStatus {
    /// Only drafts accept structural or field edits.
    pub fn is_editable(self) -> bool {
        self == BomStatus::Draft
    }

    pub fn can_transition_to(self, next: BomStatus) -> bool {
        use BomStatus::*;
        matches!(
            (self, next),
            (Draft, Approved)
                | (Approved, Draft)
                | (Approved, Active)
                | (Approved, Obsolete)
                | (Active, Obsolete)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BomStatus::Draft => "draft",
            BomStatus::Approved => "approved",
            BomStatus::Active => "active",
            BomStatus::Obsolete => "obsolete",
        }
    }
}

impl core::fmt::Display for BomStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who created / last changed the document, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub modified_by: UserId,
    pub modified_at: DateTime<Utc>,
}

/// Aggregate root: a bill of materials. Exclusively owns its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomDocument {
    id: BomDocumentId,
    name: String,
    description: Option<String>,
    status: BomStatus,
    /// Business version label (e.g. "1.0"), unrelated to `revision`.
    version: String,
    audit: AuditInfo,
    revision: u64,
    forest: BomForest,
}

impl BomDocument {
    pub fn new(
        id: BomDocumentId,
        name: impl Into<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("document name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            description: None,
            status: BomStatus::Draft,
            version: "1.0".to_string(),
            audit: AuditInfo {
                created_by,
                created_at,
                modified_by: created_by,
                modified_at: created_at,
            },
            revision: 0,
            forest: BomForest::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn id_typed(&self) -> BomDocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> BomStatus {
        self.status
    }

    pub fn version_label(&self) -> &str {
        &self.version
    }

    pub fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn forest(&self) -> &BomForest {
        &self.forest
    }

    /// Move through the lifecycle; illegal jumps are invariant violations.
    pub fn transition(
        &mut self,
        next: BomStatus,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "cannot move bom document from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.record_change(actor, at);
        Ok(())
    }

    /// Swap in a new forest (mutation result or history snapshot).
    pub(crate) fn replace_forest(&mut self, forest: BomForest, actor: UserId, at: DateTime<Utc>) {
        self.forest = forest;
        self.record_change(actor, at);
    }

    fn record_change(&mut self, actor: UserId, at: DateTime<Utc>) {
        self.revision += 1;
        self.audit.modified_by = actor;
        self.audit.modified_at = at;
    }
}

impl AggregateRoot for BomDocument {
    type Id = BomDocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document() -> BomDocument {
        BomDocument::new(BomDocumentId::new(), "Bicycle", UserId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn new_document_is_an_empty_draft() {
        let doc = test_document();
        assert_eq!(doc.status(), BomStatus::Draft);
        assert!(doc.forest().is_empty());
        assert_eq!(doc.revision(), 0);
        assert_eq!(doc.version_label(), "1.0");
        assert_eq!(doc.audit().created_by, doc.audit().modified_by);
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = BomDocument::new(BomDocumentId::new(), "  ", UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lifecycle_follows_allowed_transitions() {
        let mut doc = test_document();
        let approver = UserId::new();

        doc.transition(BomStatus::Approved, approver, Utc::now()).unwrap();
        doc.transition(BomStatus::Active, approver, Utc::now()).unwrap();
        doc.transition(BomStatus::Obsolete, approver, Utc::now()).unwrap();

        assert_eq!(doc.status(), BomStatus::Obsolete);
        assert_eq!(doc.revision(), 3);
        assert_eq!(doc.audit().modified_by, approver);
    }

    #[test]
    fn illegal_transition_is_an_invariant_violation() {
        let mut doc = test_document();
        let err = doc.transition(BomStatus::Active, UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(doc.status(), BomStatus::Draft);
        assert_eq!(doc.revision(), 0);
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(BomStatus::Draft.is_editable());
        assert!(!BomStatus::Approved.is_editable());
        assert!(!BomStatus::Active.is_editable());
        assert!(!BomStatus::Obsolete.is_editable());
    }

    #[test]
    fn serializes_status_in_lowercase() {
        let json = serde_json::to_value(test_document()).unwrap();
        assert_eq!(json["status"], "draft");
    }
}
