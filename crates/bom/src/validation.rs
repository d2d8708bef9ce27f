//! Structural validation for proposed BOM edits.
//!
//! `validate` is a pure function over a read-only forest: it never mutates and
//! always runs against the pre-mutation tree. A report carries hard errors
//! (the edit must be rejected) and soft warnings (the caller decides, see
//! [`WarningPolicy`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgeerp_core::BomItemId;

use crate::item::ItemKind;
use crate::store::BomForest;

/// Default nesting depth above which a warning is raised.
pub const DEFAULT_MAX_DEPTH: usize = 8;
/// Default descendant count above which moving a node raises a warning.
pub const DEFAULT_LARGE_SUBTREE: usize = 20;

/// Where a moved node lands relative to its target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePosition {
    /// Sibling, immediately before the target.
    Before,
    /// Sibling, immediately after the target.
    After,
    /// Last child of the target.
    Inside,
}

/// A proposed structural change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Operation {
    MoveItem {
        source_id: BomItemId,
        target_id: BomItemId,
        position: MovePosition,
    },
    AddChild {
        parent_id: BomItemId,
        new_item_kind: ItemKind,
    },
    AddRoot {
        new_item_kind: ItemKind,
    },
    /// Field edit that changes an existing node's kind.
    ChangeKind {
        item_id: BomItemId,
        new_kind: ItemKind,
    },
}

/// Rule violation; the operation must be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum ValidationError {
    #[error("cannot move an item into itself ({item_id})")]
    SelfMove { item_id: BomItemId },

    #[error("operation would create a cycle: {target_id} lies inside the subtree of {source_id}")]
    Cycle {
        source_id: BomItemId,
        target_id: BomItemId,
    },

    #[error("materials cannot have children ({parent_id} is a material)")]
    MaterialParent { parent_id: BomItemId },

    #[error("products are top-level only: a product cannot be nested under product {ancestor_id}")]
    NestedProduct { ancestor_id: BomItemId },

    #[error("item {item_id} not found")]
    NotFound { item_id: BomItemId },
}

/// Non-fatal finding; needs a policy decision by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum ValidationWarning {
    #[error(
        "resulting depth {depth} exceeds {threshold} levels: deep structure may be hard to navigate and may affect production scheduling estimates"
    )]
    DeepNesting { depth: usize, threshold: usize },

    #[error("large subtree affected: {descendants} descendants (threshold {threshold})")]
    LargeSubtree { descendants: usize, threshold: usize },
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// No hard errors (warnings may still be present).
    pub fn is_allowed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Neither errors nor warnings.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Human-readable messages, errors first.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(ToString::to_string)
            .chain(self.warnings.iter().map(ToString::to_string))
            .collect()
    }
}

/// What to do when an operation has warnings but no errors.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningPolicy {
    /// Refuse and hand the warnings back; the caller re-issues with
    /// `WarnOnly` once a human has confirmed.
    #[default]
    Confirm,
    /// Always proceed; warnings are returned alongside the result.
    WarnOnly,
    /// Treat warnings as errors.
    Strict,
}

impl core::str::FromStr for WarningPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(Self::Confirm),
            "warn-only" | "warn_only" | "warnonly" => Ok(Self::WarnOnly),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown warning policy '{other}'")),
        }
    }
}

/// Thresholds for the soft rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub max_depth: usize,
    pub large_subtree: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            large_subtree: DEFAULT_LARGE_SUBTREE,
        }
    }
}

impl ValidationConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_large_subtree(mut self, large_subtree: usize) -> Self {
        self.large_subtree = large_subtree;
        self
    }
}

/// Validation with default thresholds.
pub fn validate(forest: &BomForest, operation: &Operation) -> ValidationReport {
    Validator::default().validate(forest, operation)
}

/// Validation engine bound to a set of thresholds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(&self, forest: &BomForest, operation: &Operation) -> ValidationReport {
        let mut report = ValidationReport::default();
        match *operation {
            Operation::MoveItem {
                source_id,
                target_id,
                position,
            } => self.check_move(forest, source_id, target_id, position, &mut report),
            Operation::AddChild {
                parent_id,
                new_item_kind,
            } => self.check_add_child(forest, parent_id, new_item_kind, &mut report),
            Operation::AddRoot { .. } => self.check_depth(1, &mut report),
            Operation::ChangeKind { item_id, new_kind } => {
                check_change_kind(forest, item_id, new_kind, &mut report)
            }
        }
        report
    }

    fn check_move(
        &self,
        forest: &BomForest,
        source_id: BomItemId,
        target_id: BomItemId,
        position: MovePosition,
        report: &mut ValidationReport,
    ) {
        for id in [source_id, target_id] {
            if !forest.contains(id) {
                report.errors.push(ValidationError::NotFound { item_id: id });
            }
        }
        if !report.errors.is_empty() {
            return;
        }

        if source_id == target_id {
            report
                .errors
                .push(ValidationError::SelfMove { item_id: source_id });
            return;
        }

        // Both sibling and inside placements hang the subtree off the target's
        // chain, so the target must not be inside the moved subtree.
        if forest.subtree_contains(source_id, target_id) {
            report.errors.push(ValidationError::Cycle {
                source_id,
                target_id,
            });
            return;
        }

        let new_parent = match position {
            MovePosition::Inside => Some(target_id),
            MovePosition::Before | MovePosition::After => forest.parent_of(target_id),
        };

        if let Some(parent_id) = new_parent {
            if is_material(forest, parent_id) {
                report.errors.push(ValidationError::MaterialParent { parent_id });
            }
            if let Some(ancestor_id) = product_at_or_above(forest, parent_id) {
                if subtree_has_product(forest, source_id) {
                    report.errors.push(ValidationError::NestedProduct { ancestor_id });
                }
            }
        }

        let landing_depth = match new_parent {
            Some(parent_id) => forest.depth(parent_id).unwrap_or(0) + 1,
            None => 1,
        };
        let height = forest.subtree_height(source_id).unwrap_or(1);
        self.check_depth(landing_depth + height - 1, report);

        let descendants = forest.descendants(source_id).map(|d| d.len()).unwrap_or(0);
        if descendants > self.config.large_subtree {
            report.warnings.push(ValidationWarning::LargeSubtree {
                descendants,
                threshold: self.config.large_subtree,
            });
        }
    }

    fn check_add_child(
        &self,
        forest: &BomForest,
        parent_id: BomItemId,
        kind: ItemKind,
        report: &mut ValidationReport,
    ) {
        let Ok(parent) = forest.get(parent_id) else {
            report.errors.push(ValidationError::NotFound { item_id: parent_id });
            return;
        };

        if !parent.item_kind().can_have_children() {
            report.errors.push(ValidationError::MaterialParent { parent_id });
        }
        if kind == ItemKind::Product {
            if let Some(ancestor_id) = product_at_or_above(forest, parent_id) {
                report.errors.push(ValidationError::NestedProduct { ancestor_id });
            }
        }

        let depth = forest.depth(parent_id).unwrap_or(0) + 1;
        self.check_depth(depth, report);
    }

    fn check_depth(&self, depth: usize, report: &mut ValidationReport) {
        if depth > self.config.max_depth {
            report.warnings.push(ValidationWarning::DeepNesting {
                depth,
                threshold: self.config.max_depth,
            });
        }
    }
}

fn check_change_kind(
    forest: &BomForest,
    item_id: BomItemId,
    new_kind: ItemKind,
    report: &mut ValidationReport,
) {
    let Ok(item) = forest.get(item_id) else {
        report.errors.push(ValidationError::NotFound { item_id });
        return;
    };

    match new_kind {
        ItemKind::Material if !item.children().is_empty() => {
            report
                .errors
                .push(ValidationError::MaterialParent { parent_id: item_id });
        }
        ItemKind::Product => {
            let above = forest
                .ancestors(item_id)
                .find(|id| kind_of(forest, *id) == Some(ItemKind::Product));
            if let Some(ancestor_id) = above {
                report.errors.push(ValidationError::NestedProduct { ancestor_id });
            }
            let below = forest.descendants(item_id).unwrap_or_default();
            if below
                .iter()
                .any(|id| kind_of(forest, *id) == Some(ItemKind::Product))
            {
                report.errors.push(ValidationError::NestedProduct {
                    ancestor_id: item_id,
                });
            }
        }
        _ => {}
    }
}

fn kind_of(forest: &BomForest, id: BomItemId) -> Option<ItemKind> {
    forest.get(id).ok().map(|item| item.item_kind())
}

fn is_material(forest: &BomForest, id: BomItemId) -> bool {
    kind_of(forest, id) == Some(ItemKind::Material)
}

/// Nearest product among `id` and its ancestors.
fn product_at_or_above(forest: &BomForest, id: BomItemId) -> Option<BomItemId> {
    std::iter::once(id)
        .chain(forest.ancestors(id))
        .find(|candidate| kind_of(forest, *candidate) == Some(ItemKind::Product))
}

fn subtree_has_product(forest: &BomForest, root: BomItemId) -> bool {
    kind_of(forest, root) == Some(ItemKind::Product)
        || forest
            .descendants(root)
            .unwrap_or_default()
            .iter()
            .any(|id| kind_of(forest, *id) == Some(ItemKind::Product))
}
