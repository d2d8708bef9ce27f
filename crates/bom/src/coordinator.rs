//! Mutation coordinator: the only write path into a BOM document.
//!
//! ```text
//! Mutation
//!   ↓
//! 1. Status gate (only drafts are editable)
//!   ↓
//! 2. Existence + field checks
//!   ↓
//! 3. Validation against the current, untouched forest
//!   ↓
//! 4. Warning policy (confirm / warn-only / strict)
//!   ↓
//! 5. Apply to a working copy, swap it in, push a history snapshot
//! ```
//!
//! Any failure before step 5 completes leaves the document exactly as it was.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use forgeerp_core::{BomItemId, DomainError, DomainResult, UserId};

use crate::aggregation::{self, FlattenedRequirement, InventorySnapshot};
use crate::config::EngineConfig;
use crate::document::{BomDocument, BomStatus};
use crate::history::{History, HistoryBoundsError};
use crate::item::{BomItem, ItemPatch, NewBomItem, Quantity};
use crate::store::{BomForest, Placement};
use crate::validation::{
    MovePosition, Operation, ValidationReport, ValidationWarning, Validator, WarningPolicy,
};

/// A requested change to a BOM document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Mutation {
    /// Create a node; `parent_id: None` adds a new root.
    AddItem {
        parent_id: Option<BomItemId>,
        item: NewBomItem,
    },
    UpdateItem {
        item_id: BomItemId,
        patch: ItemPatch,
    },
    /// Removes the node and its whole subtree.
    DeleteItem { item_id: BomItemId },
    MoveItem {
        source_id: BomItemId,
        target_id: BomItemId,
        position: MovePosition,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddItem { .. } => "add_item",
            Mutation::UpdateItem { .. } => "update_item",
            Mutation::DeleteItem { .. } => "delete_item",
            Mutation::MoveItem { .. } => "move_item",
        }
    }
}

/// A successfully applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The created, edited, deleted or moved node.
    pub item_id: BomItemId,
    /// Warnings the caller accepted (only non-empty under `WarnOnly`).
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("bom item {0} not found")]
    NotFound(BomItemId),

    /// Hard rule violations (or warnings under `Strict`).
    #[error("operation rejected: {}", .0.messages().join("; "))]
    Rejected(ValidationReport),

    /// Warnings need an explicit confirmation; re-issue with `WarnOnly`.
    #[error("confirmation required: {}", join_warnings(.0))]
    Unconfirmed(Vec<ValidationWarning>),

    #[error("bom document is {0} and cannot be edited")]
    Locked(BomStatus),

    /// Undo/redo past either end of the log; nothing changed.
    #[error(transparent)]
    History(#[from] HistoryBoundsError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl MutationError {
    /// The validation report behind a rejection, if any.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            MutationError::Rejected(report) => Some(report),
            _ => None,
        }
    }
}

fn join_warnings(warnings: &[ValidationWarning]) -> String {
    warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type MutationResult<T> = Result<T, MutationError>;

/// Outcome of a batch run. Each mutation is applied (or refused) on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: Vec<(usize, Applied)>,
    pub failures: Vec<(usize, MutationError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Single-writer coordinator over one document and its undo/redo history.
#[derive(Debug, Clone)]
pub struct MutationCoordinator {
    document: BomDocument,
    history: History<BomForest>,
    validator: Validator,
    config: EngineConfig,
    actor: UserId,
}

impl MutationCoordinator {
    pub fn new(document: BomDocument, actor: UserId, config: EngineConfig) -> Self {
        let history = History::new(document.forest().clone(), config.history_capacity);
        Self {
            document,
            history,
            validator: Validator::new(config.validation),
            config,
            actor,
        }
    }

    pub fn with_defaults(document: BomDocument, actor: UserId) -> Self {
        Self::new(document, actor, EngineConfig::default())
    }

    pub fn document(&self) -> &BomDocument {
        &self.document
    }

    pub fn forest(&self) -> &BomForest {
        self.document.forest()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    /// Attribute subsequent changes to another user.
    pub fn set_actor(&mut self, actor: UserId) {
        self.actor = actor;
    }

    pub fn into_document(self) -> BomDocument {
        self.document
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Dry-run validation (e.g. drag-hover feedback). Never mutates.
    pub fn preview(&self, operation: &Operation) -> ValidationReport {
        self.validator.validate(self.forest(), operation)
    }

    pub fn add_item(
        &mut self,
        parent_id: Option<BomItemId>,
        item: NewBomItem,
    ) -> MutationResult<Applied> {
        self.apply(Mutation::AddItem { parent_id, item }, self.config.warning_policy)
    }

    pub fn update_item(&mut self, item_id: BomItemId, patch: ItemPatch) -> MutationResult<Applied> {
        self.apply(Mutation::UpdateItem { item_id, patch }, self.config.warning_policy)
    }

    /// Deletes unconditionally; confirming a non-empty subtree is the caller's job.
    pub fn delete_item(&mut self, item_id: BomItemId) -> MutationResult<Applied> {
        self.apply(Mutation::DeleteItem { item_id }, self.config.warning_policy)
    }

    pub fn move_item(
        &mut self,
        source_id: BomItemId,
        target_id: BomItemId,
        position: MovePosition,
    ) -> MutationResult<Applied> {
        self.apply(
            Mutation::MoveItem {
                source_id,
                target_id,
                position,
            },
            self.config.warning_policy,
        )
    }

    /// Validate and apply one mutation as a unit of work.
    pub fn apply(&mut self, mutation: Mutation, policy: WarningPolicy) -> MutationResult<Applied> {
        let op = mutation.name();
        let result = self.apply_inner(mutation, policy);
        match &result {
            Ok(applied) => info!(
                document_id = %self.document.id_typed(),
                item_id = %applied.item_id,
                op,
                warnings = applied.warnings.len(),
                revision = self.document.revision(),
                "bom mutation applied"
            ),
            Err(MutationError::Unconfirmed(warnings)) => debug!(
                document_id = %self.document.id_typed(),
                op,
                warnings = warnings.len(),
                "bom mutation awaiting confirmation"
            ),
            Err(error) => warn!(
                document_id = %self.document.id_typed(),
                op,
                error = %error,
                "bom mutation refused"
            ),
        }
        result
    }

    /// Apply each mutation independently; failures are collected, not fatal.
    pub fn apply_batch(
        &mut self,
        mutations: impl IntoIterator<Item = Mutation>,
        policy: WarningPolicy,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (index, mutation) in mutations.into_iter().enumerate() {
            match self.apply(mutation, policy) {
                Ok(applied) => report.applied.push((index, applied)),
                Err(error) => report.failures.push((index, error)),
            }
        }
        info!(
            document_id = %self.document.id_typed(),
            applied = report.applied.len(),
            failed = report.failures.len(),
            "bom batch finished"
        );
        report
    }

    pub fn undo(&mut self) -> MutationResult<()> {
        self.ensure_editable()?;
        let snapshot = self.history.undo()?.clone();
        self.document.replace_forest(snapshot, self.actor, Utc::now());
        debug!(document_id = %self.document.id_typed(), "bom undo");
        Ok(())
    }

    pub fn redo(&mut self) -> MutationResult<()> {
        self.ensure_editable()?;
        let snapshot = self.history.redo()?.clone();
        self.document.replace_forest(snapshot, self.actor, Utc::now());
        debug!(document_id = %self.document.id_typed(), "bom redo");
        Ok(())
    }

    /// Lifecycle change. Not part of the undo history.
    pub fn transition(&mut self, status: BomStatus) -> DomainResult<()> {
        self.document.transition(status, self.actor, Utc::now())?;
        info!(document_id = %self.document.id_typed(), status = %status, "bom status changed");
        Ok(())
    }

    pub fn aggregate(
        &self,
        build_quantity: Quantity,
        inventory: &InventorySnapshot,
    ) -> DomainResult<Vec<FlattenedRequirement>> {
        aggregation::aggregate(self.forest(), build_quantity, inventory)
    }

    fn apply_inner(&mut self, mutation: Mutation, policy: WarningPolicy) -> MutationResult<Applied> {
        self.ensure_editable()?;
        match mutation {
            Mutation::AddItem { parent_id, item } => self.add(parent_id, item, policy),
            Mutation::UpdateItem { item_id, patch } => self.update(item_id, patch, policy),
            Mutation::DeleteItem { item_id } => self.delete(item_id),
            Mutation::MoveItem {
                source_id,
                target_id,
                position,
            } => self.relocate(source_id, target_id, position, policy),
        }
    }

    fn add(
        &mut self,
        parent_id: Option<BomItemId>,
        input: NewBomItem,
        policy: WarningPolicy,
    ) -> MutationResult<Applied> {
        input.check()?;
        let operation = match parent_id {
            Some(parent_id) => {
                self.ensure_exists(parent_id)?;
                Operation::AddChild {
                    parent_id,
                    new_item_kind: input.item_kind,
                }
            }
            None => Operation::AddRoot {
                new_item_kind: input.item_kind,
            },
        };
        let warnings = resolve(self.preview(&operation), policy)?;

        let item_id = BomItemId::new();
        let mut working = self.forest().clone();
        let item = BomItem::new(item_id, input);
        match parent_id {
            Some(parent_id) => working.insert_as_child(parent_id, item)?,
            None => working.insert_as_root(item)?,
        }
        self.commit(working);
        Ok(Applied { item_id, warnings })
    }

    fn update(
        &mut self,
        item_id: BomItemId,
        patch: ItemPatch,
        policy: WarningPolicy,
    ) -> MutationResult<Applied> {
        self.ensure_exists(item_id)?;
        patch.check()?;

        let current_kind = self.forest().get(item_id)?.item_kind();
        let warnings = match patch.item_kind {
            Some(new_kind) if new_kind != current_kind => {
                resolve(self.preview(&Operation::ChangeKind { item_id, new_kind }), policy)?
            }
            _ => Vec::new(),
        };

        let mut working = self.forest().clone();
        working.replace_fields(item_id, &patch)?;
        self.commit(working);
        Ok(Applied { item_id, warnings })
    }

    fn delete(&mut self, item_id: BomItemId) -> MutationResult<Applied> {
        self.ensure_exists(item_id)?;
        let mut working = self.forest().clone();
        let removed = working.detach(item_id)?;
        debug!(item_id = %item_id, removed = removed.len(), "bom subtree removed");
        self.commit(working);
        Ok(Applied {
            item_id,
            warnings: Vec::new(),
        })
    }

    fn relocate(
        &mut self,
        source_id: BomItemId,
        target_id: BomItemId,
        position: MovePosition,
        policy: WarningPolicy,
    ) -> MutationResult<Applied> {
        self.ensure_exists(source_id)?;
        self.ensure_exists(target_id)?;
        let warnings = resolve(
            self.preview(&Operation::MoveItem {
                source_id,
                target_id,
                position,
            }),
            policy,
        )?;

        let placement = match position {
            MovePosition::Before => Placement::Before(target_id),
            MovePosition::After => Placement::After(target_id),
            MovePosition::Inside => Placement::Inside(target_id),
        };
        let mut working = self.forest().clone();
        let subtree = working.detach(source_id)?;
        working.attach(subtree, placement)?;
        self.commit(working);
        Ok(Applied {
            item_id: source_id,
            warnings,
        })
    }

    fn commit(&mut self, working: BomForest) {
        self.history.push(working.clone());
        self.document.replace_forest(working, self.actor, Utc::now());
    }

    fn ensure_editable(&self) -> MutationResult<()> {
        let status = self.document.status();
        if !status.is_editable() {
            return Err(MutationError::Locked(status));
        }
        Ok(())
    }

    fn ensure_exists(&self, item_id: BomItemId) -> MutationResult<()> {
        if !self.forest().contains(item_id) {
            return Err(MutationError::NotFound(item_id));
        }
        Ok(())
    }
}

/// Turn a report into the warnings to hand back, or a refusal.
fn resolve(report: ValidationReport, policy: WarningPolicy) -> MutationResult<Vec<ValidationWarning>> {
    if !report.errors.is_empty() {
        return Err(MutationError::Rejected(report));
    }
    if report.warnings.is_empty() {
        return Ok(Vec::new());
    }
    match policy {
        WarningPolicy::WarnOnly => Ok(report.warnings),
        WarningPolicy::Confirm => Err(MutationError::Unconfirmed(report.warnings)),
        WarningPolicy::Strict => Err(MutationError::Rejected(report)),
    }
}
