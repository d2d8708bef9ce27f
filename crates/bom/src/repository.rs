//! Persistence collaborator: stores and retrieves whole BOM documents by id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use forgeerp_core::{AggregateRoot, BomDocumentId, ExpectedVersion};

use crate::document::BomDocument;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("bom document {0} not found")]
    NotFound(BomDocumentId),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("repository lock poisoned")]
    Poisoned,
}

/// Durable store of fully materialized documents. No partial/streaming access.
pub trait BomRepository: Send + Sync {
    /// Store `document`; `expected` is checked against the stored revision
    /// (0 when the document has never been saved).
    fn save(&self, document: &BomDocument, expected: ExpectedVersion) -> Result<(), RepositoryError>;

    fn load(&self, id: BomDocumentId) -> Result<BomDocument, RepositoryError>;

    /// Stored document ids, sorted.
    fn list(&self) -> Result<Vec<BomDocumentId>, RepositoryError>;

    fn delete(&self, id: BomDocumentId) -> Result<(), RepositoryError>;
}

impl<R> BomRepository for Arc<R>
where
    R: BomRepository + ?Sized,
{
    fn save(&self, document: &BomDocument, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).save(document, expected)
    }

    fn load(&self, id: BomDocumentId) -> Result<BomDocument, RepositoryError> {
        (**self).load(id)
    }

    fn list(&self) -> Result<Vec<BomDocumentId>, RepositoryError> {
        (**self).list()
    }

    fn delete(&self, id: BomDocumentId) -> Result<(), RepositoryError> {
        (**self).delete(id)
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    revision: u64,
    json: String,
}

/// In-memory repository for tests/dev.
///
/// Documents are kept in their serialized JSON form so every save/load goes
/// through the same integrity checks a real backend would.
#[derive(Debug, Default)]
pub struct InMemoryBomRepository {
    documents: RwLock<HashMap<BomDocumentId, StoredDocument>>,
}

impl InMemoryBomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BomRepository for InMemoryBomRepository {
    fn save(&self, document: &BomDocument, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(document)?;
        let id = document.id_typed();

        let mut documents = self.documents.write().map_err(|_| RepositoryError::Poisoned)?;
        let current = documents.get(&id).map(|d| d.revision).unwrap_or(0);
        expected
            .check(current)
            .map_err(|e| RepositoryError::Concurrency(format!("bom document {id}: {e}")))?;
        documents.insert(
            id,
            StoredDocument {
                revision: document.version(),
                json,
            },
        );
        Ok(())
    }

    fn load(&self, id: BomDocumentId) -> Result<BomDocument, RepositoryError> {
        let documents = self.documents.read().map_err(|_| RepositoryError::Poisoned)?;
        let stored = documents.get(&id).ok_or(RepositoryError::NotFound(id))?;
        Ok(serde_json::from_str(&stored.json)?)
    }

    fn list(&self) -> Result<Vec<BomDocumentId>, RepositoryError> {
        let documents = self.documents.read().map_err(|_| RepositoryError::Poisoned)?;
        let mut ids: Vec<_> = documents.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: BomDocumentId) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().map_err(|_| RepositoryError::Poisoned)?;
        documents
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}
