//! Thread-safe handle around a [`MutationCoordinator`].
//!
//! Writes take the exclusive lock for the whole unit of work; reads share the
//! lock, so they see the forest either before or after a mutation, never in
//! between.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use forgeerp_core::{DomainError, DomainResult};

use crate::aggregation::{FlattenedRequirement, InventorySnapshot};
use crate::coordinator::{Applied, BatchReport, Mutation, MutationCoordinator, MutationResult};
use crate::document::BomDocument;
use crate::item::Quantity;
use crate::store::BomForest;
use crate::validation::{Operation, ValidationReport, WarningPolicy};

/// Cheap to clone; all clones share one coordinator.
#[derive(Debug, Clone)]
pub struct SharedCoordinator {
    inner: Arc<RwLock<MutationCoordinator>>,
}

impl SharedCoordinator {
    pub fn new(coordinator: MutationCoordinator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(coordinator)),
        }
    }

    fn read_guard(&self) -> DomainResult<RwLockReadGuard<'_, MutationCoordinator>> {
        self.inner
            .read()
            .map_err(|_| DomainError::conflict("bom coordinator lock poisoned"))
    }

    fn write_guard(&self) -> DomainResult<RwLockWriteGuard<'_, MutationCoordinator>> {
        self.inner
            .write()
            .map_err(|_| DomainError::conflict("bom coordinator lock poisoned"))
    }

    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&MutationCoordinator) -> R) -> DomainResult<R> {
        let guard = self.read_guard()?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut MutationCoordinator) -> R) -> DomainResult<R> {
        let mut guard = self.write_guard()?;
        Ok(f(&mut guard))
    }

    pub fn apply(&self, mutation: Mutation, policy: WarningPolicy) -> MutationResult<Applied> {
        self.write_guard()?.apply(mutation, policy)
    }

    pub fn apply_batch(
        &self,
        mutations: impl IntoIterator<Item = Mutation>,
        policy: WarningPolicy,
    ) -> DomainResult<BatchReport> {
        Ok(self.write_guard()?.apply_batch(mutations, policy))
    }

    pub fn undo(&self) -> MutationResult<()> {
        self.write_guard()?.undo()
    }

    pub fn redo(&self) -> MutationResult<()> {
        self.write_guard()?.redo()
    }

    /// Consistent copy of the current forest.
    pub fn snapshot(&self) -> DomainResult<BomForest> {
        self.read(|c| c.forest().clone())
    }

    pub fn document(&self) -> DomainResult<BomDocument> {
        self.read(|c| c.document().clone())
    }

    pub fn preview(&self, operation: &Operation) -> DomainResult<ValidationReport> {
        self.read(|c| c.preview(operation))
    }

    pub fn aggregate(
        &self,
        build_quantity: Quantity,
        inventory: &InventorySnapshot,
    ) -> DomainResult<Vec<FlattenedRequirement>> {
        self.read_guard()?.aggregate(build_quantity, inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKind, NewBomItem};
    use chrono::Utc;
    use forgeerp_core::{BomDocumentId, UserId};
    use std::thread;

    fn shared() -> SharedCoordinator {
        let actor = UserId::new();
        let document = BomDocument::new(BomDocumentId::new(), "Rack", actor, Utc::now()).unwrap();
        SharedCoordinator::new(MutationCoordinator::with_defaults(document, actor))
    }

    fn component(name: String) -> NewBomItem {
        NewBomItem::new(ItemKind::Component, name.clone(), name, Quantity::ONE, "pcs")
    }

    #[test]
    fn concurrent_writers_are_serialized() {
        let handle = shared();
        let root = handle
            .apply(
                Mutation::AddItem {
                    parent_id: None,
                    item: NewBomItem::new(ItemKind::Assembly, "RACK", "Rack", Quantity::ONE, "pcs"),
                },
                WarningPolicy::WarnOnly,
            )
            .unwrap()
            .item_id;

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for n in 0..10 {
                        handle
                            .apply(
                                Mutation::AddItem {
                                    parent_id: Some(root),
                                    item: component(format!("W{worker}-{n}")),
                                },
                                WarningPolicy::WarnOnly,
                            )
                            .unwrap();
                        let snapshot = handle.snapshot().unwrap();
                        assert!(snapshot.check_integrity().is_ok());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let forest = handle.snapshot().unwrap();
        assert_eq!(forest.len(), 41);
        assert_eq!(forest.get(root).unwrap().children().len(), 40);
        assert_eq!(handle.document().unwrap().revision(), 41);
    }

    #[test]
    fn closures_run_against_the_guarded_coordinator() {
        let handle = shared();
        let other = UserId::new();
        handle.write(|c| c.set_actor(other)).unwrap();
        assert_eq!(handle.read(|c| c.actor()).unwrap(), other);
        assert!(!handle.read(|c| c.can_undo()).unwrap());
    }

    #[test]
    fn reads_go_through_the_same_coordinator() {
        let handle = shared();
        let other = handle.clone();
        handle
            .apply(
                Mutation::AddItem {
                    parent_id: None,
                    item: NewBomItem::new(ItemKind::Material, "CU", "Copper", Quantity::units(3).unwrap(), "kg"),
                },
                WarningPolicy::Confirm,
            )
            .unwrap();

        let rows = other
            .aggregate(Quantity::units(2).unwrap(), &InventorySnapshot::default())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].required_quantity, rust_decimal::Decimal::from(6));

        other.undo().unwrap();
        assert!(handle.snapshot().unwrap().is_empty());
        assert!(handle.read(|c| c.can_redo()).unwrap());
    }
}
