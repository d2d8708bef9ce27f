//! Bill-of-materials structure engine.
//!
//! A BOM document owns a forest of items (products, assemblies, components,
//! materials). Every edit goes through the [`MutationCoordinator`], which
//! validates against the untouched forest, applies the change as a unit of
//! work and records an undo/redo snapshot. Requirement rollup against an
//! inventory snapshot is a pure function over the current forest.
//!
//! No IO lives here: inventory acquisition and persistence transport are the
//! caller's job ([`BomRepository`] is the persistence seam).

pub mod aggregation;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod history;
pub mod item;
pub mod repository;
pub mod shared;
pub mod store;
pub mod validation;

pub use aggregation::{
    aggregate, classify, summarize_by_reference, AvailabilityBreakdown, AvailabilityStatus,
    FlattenedRequirement, InventoryItem, InventorySnapshot, MaterialDemand,
};
pub use config::EngineConfig;
pub use coordinator::{Applied, BatchReport, Mutation, MutationCoordinator, MutationError, MutationResult};
pub use document::{AuditInfo, BomDocument, BomStatus};
pub use history::{History, HistoryBoundsError};
pub use item::{Alternative, BomItem, ItemKind, ItemPatch, NewBomItem, Quantity};
pub use repository::{BomRepository, InMemoryBomRepository, RepositoryError};
pub use shared::SharedCoordinator;
pub use store::{BomForest, DetachedSubtree, Placement};
pub use validation::{
    validate, MovePosition, Operation, ValidationConfig, ValidationError, ValidationReport,
    ValidationWarning, Validator, WarningPolicy,
};
