//! BOM node store: arena-backed forest with O(1) id lookup.
//!
//! The store is a structural substrate only. It never applies business rules
//! (cycles, type nesting); callers validate against a read-only view first and
//! then use the primitives here.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use forgeerp_core::{BomItemId, DomainError, DomainResult};

use crate::item::{BomItem, ItemPatch};

/// Where a (detached or new) subtree is attached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "at", content = "id")]
pub enum Placement {
    /// Appended to the end of the root list.
    Root,
    /// Appended to the end of the given parent's children.
    Inside(BomItemId),
    /// Immediately before the given sibling.
    Before(BomItemId),
    /// Immediately after the given sibling.
    After(BomItemId),
}

/// A subtree removed from the forest, still wired internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSubtree {
    root: BomItemId,
    nodes: HashMap<BomItemId, BomItem>,
}

impl DetachedSubtree {
    /// A single childless node.
    pub fn single(item: BomItem) -> DomainResult<Self> {
        if !item.children().is_empty() {
            return Err(DomainError::invariant(format!(
                "item {} must not reference children before insertion",
                item.id()
            )));
        }
        let root = item.id();
        Ok(Self {
            root,
            nodes: HashMap::from([(root, item)]),
        })
    }

    pub fn root(&self) -> BomItemId {
        self.root
    }

    pub fn root_item(&self) -> Option<&BomItem> {
        self.nodes.get(&self.root)
    }

    pub fn contains(&self, id: BomItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &BomItem> {
        self.nodes.values()
    }
}

/// The forest of one BOM document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ForestRecord", into = "ForestRecord")]
pub struct BomForest {
    roots: Vec<BomItemId>,
    nodes: HashMap<BomItemId, BomItem>,
    /// child -> parent; roots have no entry.
    parents: HashMap<BomItemId, BomItemId>,
}

impl BomForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: BomItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[BomItemId] {
        &self.roots
    }

    pub fn get(&self, id: BomItemId) -> DomainResult<&BomItem> {
        self.nodes
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("bom item {id}")))
    }

    /// `None` for roots and for unknown ids.
    pub fn parent_of(&self, id: BomItemId) -> Option<BomItemId> {
        self.parents.get(&id).copied()
    }

    pub fn insert_as_root(&mut self, item: BomItem) -> DomainResult<()> {
        self.attach(DetachedSubtree::single(item)?, Placement::Root)
    }

    pub fn insert_as_child(&mut self, parent_id: BomItemId, item: BomItem) -> DomainResult<()> {
        self.attach(DetachedSubtree::single(item)?, Placement::Inside(parent_id))
    }

    /// Reattach a subtree. Fails without touching the forest if the anchor is
    /// unknown or any id in the subtree is already present.
    pub fn attach(&mut self, subtree: DetachedSubtree, placement: Placement) -> DomainResult<()> {
        if let Some(clash) = subtree.nodes.keys().find(|id| self.nodes.contains_key(id)) {
            return Err(DomainError::conflict(format!("bom item {clash} already exists")));
        }

        match placement {
            Placement::Root => self.roots.push(subtree.root),
            Placement::Inside(parent_id) => {
                let parent = self
                    .nodes
                    .get_mut(&parent_id)
                    .ok_or_else(|| DomainError::not_found(format!("bom item {parent_id}")))?;
                parent.children_mut().push(subtree.root);
                self.parents.insert(subtree.root, parent_id);
            }
            Placement::Before(anchor) | Placement::After(anchor) => {
                let offset = usize::from(matches!(placement, Placement::After(_)));
                let parent_id = self.parent_of(anchor);
                let siblings = self.sibling_list_mut(anchor)?;
                let index = siblings
                    .iter()
                    .position(|id| *id == anchor)
                    .ok_or_else(|| DomainError::not_found(format!("bom item {anchor}")))?;
                siblings.insert(index + offset, subtree.root);
                if let Some(parent_id) = parent_id {
                    self.parents.insert(subtree.root, parent_id);
                }
            }
        }

        for (id, item) in subtree.nodes {
            for child in item.children() {
                self.parents.insert(*child, id);
            }
            self.nodes.insert(id, item);
        }
        Ok(())
    }

    /// Remove a node and everything below it, returning the intact subtree.
    pub fn detach(&mut self, id: BomItemId) -> DomainResult<DetachedSubtree> {
        self.get(id)?;
        let below = self.descendants(id)?;

        match self.parents.remove(&id) {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children_mut().retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut nodes = HashMap::with_capacity(below.len() + 1);
        for node_id in std::iter::once(id).chain(below) {
            self.parents.remove(&node_id);
            if let Some(item) = self.nodes.remove(&node_id) {
                nodes.insert(node_id, item);
            }
        }

        Ok(DetachedSubtree { root: id, nodes })
    }

    /// In-place field update; `children` is never touched.
    pub fn replace_fields(&mut self, id: BomItemId, patch: &ItemPatch) -> DomainResult<()> {
        let item = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("bom item {id}")))?;
        item.apply_patch(patch);
        Ok(())
    }

    /// Ancestors of `id`, nearest first. Empty for roots and unknown ids.
    pub fn ancestors(&self, id: BomItemId) -> Ancestors<'_> {
        Ancestors {
            forest: self,
            next: self.parent_of(id),
            remaining: self.nodes.len(),
        }
    }

    /// Nesting depth; roots are at depth 1.
    pub fn depth(&self, id: BomItemId) -> DomainResult<usize> {
        self.get(id)?;
        Ok(1 + self.ancestors(id).count())
    }

    /// True if `candidate` is `root` or lies anywhere below it.
    pub fn subtree_contains(&self, root: BomItemId, candidate: BomItemId) -> bool {
        candidate == root || self.ancestors(candidate).any(|ancestor| ancestor == root)
    }

    /// All nodes below `id` in pre-order (excluding `id`).
    pub fn descendants(&self, id: BomItemId) -> DomainResult<Vec<BomItemId>> {
        let start = self.get(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<BomItemId> = start.children().iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(item) = self.nodes.get(&next) {
                stack.extend(item.children().iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Number of levels in the subtree rooted at `id` (a leaf has height 1).
    pub fn subtree_height(&self, id: BomItemId) -> DomainResult<usize> {
        let root_depth = self.depth(id)?;
        let deepest = self
            .descendants(id)?
            .into_iter()
            .map(|d| self.ancestors(d).count() + 1)
            .max()
            .unwrap_or(root_depth);
        Ok(deepest - root_depth + 1)
    }

    /// Pre-order walk over every tree, roots in order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            forest: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Where-used lookup by catalog code, in pre-order.
    pub fn find_by_reference_code(&self, reference_code: &str) -> Vec<&BomItem> {
        self.walk()
            .filter(|item| item.reference_code() == reference_code)
            .collect()
    }

    /// Re-derive the structural invariants from scratch: unique ids, single
    /// parent, no orphans, no cycles, and a parent index that matches.
    pub fn check_integrity(&self) -> DomainResult<()> {
        let derived = verify_structure(&self.roots, &self.nodes)?;
        if derived != self.parents {
            return Err(DomainError::invariant("parent index out of sync with children"));
        }
        Ok(())
    }

    fn sibling_list_mut(&mut self, anchor: BomItemId) -> DomainResult<&mut Vec<BomItemId>> {
        match self.parents.get(&anchor).copied() {
            Some(parent_id) => self
                .nodes
                .get_mut(&parent_id)
                .map(|parent| parent.children_mut())
                .ok_or_else(|| DomainError::not_found(format!("bom item {parent_id}"))),
            None if self.roots.contains(&anchor) => Ok(&mut self.roots),
            None => Err(DomainError::not_found(format!("bom item {anchor}"))),
        }
    }
}

/// Iterator returned by [`BomForest::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    forest: &'a BomForest,
    next: Option<BomItemId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = BomItemId;

    fn next(&mut self) -> Option<Self::Item> {
        // A well-formed forest never has a chain longer than its node count.
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next?;
        self.next = self.forest.parent_of(current);
        Some(current)
    }
}

/// Iterator returned by [`BomForest::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    forest: &'a BomForest,
    stack: Vec<BomItemId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a BomItem;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(item) = self.forest.nodes.get(&id) {
                self.stack.extend(item.children().iter().rev().copied());
                return Some(item);
            }
        }
        None
    }
}

/// Serialized form: roots plus every item in pre-order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestRecord {
    roots: Vec<BomItemId>,
    items: Vec<BomItem>,
}

impl From<BomForest> for ForestRecord {
    fn from(forest: BomForest) -> Self {
        let items = forest.walk().cloned().collect();
        Self {
            roots: forest.roots,
            items,
        }
    }
}

impl TryFrom<ForestRecord> for BomForest {
    type Error = DomainError;

    fn try_from(record: ForestRecord) -> Result<Self, Self::Error> {
        let mut nodes = HashMap::with_capacity(record.items.len());
        for item in record.items {
            let id = item.id();
            if nodes.insert(id, item).is_some() {
                return Err(DomainError::invariant(format!("duplicate bom item id {id}")));
            }
        }
        let parents = verify_structure(&record.roots, &nodes)?;
        Ok(Self {
            roots: record.roots,
            nodes,
            parents,
        })
    }
}

fn verify_structure(
    roots: &[BomItemId],
    nodes: &HashMap<BomItemId, BomItem>,
) -> DomainResult<HashMap<BomItemId, BomItemId>> {
    let mut parents = HashMap::with_capacity(nodes.len());
    for (id, item) in nodes {
        for child in item.children() {
            if !nodes.contains_key(child) {
                return Err(DomainError::invariant(format!(
                    "bom item {id} references unknown child {child}"
                )));
            }
            if parents.insert(*child, *id).is_some() {
                return Err(DomainError::invariant(format!(
                    "bom item {child} has more than one parent"
                )));
            }
        }
    }

    let mut seen_roots = HashSet::with_capacity(roots.len());
    for root in roots {
        if !nodes.contains_key(root) {
            return Err(DomainError::invariant(format!("unknown root {root}")));
        }
        if parents.contains_key(root) || !seen_roots.insert(*root) {
            return Err(DomainError::invariant(format!("root {root} is attached twice")));
        }
    }

    let mut visited = HashSet::with_capacity(nodes.len());
    let mut stack: Vec<BomItemId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            return Err(DomainError::invariant(format!("cycle through bom item {id}")));
        }
        if let Some(item) = nodes.get(&id) {
            stack.extend(item.children().iter().copied());
        }
    }
    if visited.len() != nodes.len() {
        return Err(DomainError::invariant(format!(
            "{} bom item(s) unreachable from the roots",
            nodes.len() - visited.len()
        )));
    }

    Ok(parents)
}
