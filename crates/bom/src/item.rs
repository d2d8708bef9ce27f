//! BOM item model: kinds, quantities, substitutes and field patches.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use forgeerp_core::{BomItemId, DomainError, DomainResult};

/// What a node represents in the manufacturing structure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    Assembly,
    Component,
    Material,
}

impl ItemKind {
    /// Materials are leaves; every other kind may carry children.
    pub fn can_have_children(self) -> bool {
        self != ItemKind::Material
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Product => "product",
            ItemKind::Assembly => "assembly",
            ItemKind::Component => "component",
            ItemKind::Material => "material",
        }
    }
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strictly positive quantity consumed per one unit of the parent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ONE: Quantity = Quantity(Decimal::ONE);

    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// Whole-number quantity; zero is rejected.
    pub fn units(count: u32) -> DomainResult<Self> {
        Self::new(Decimal::from(count))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Substitute material. Informational: aggregation never consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub reference_code: String,
    pub name: String,
    pub replacement_ratio: Decimal,
    /// Lower value = preferred.
    pub priority: u32,
}

/// Input for creating a node (the id and children are assigned by the engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBomItem {
    pub item_kind: ItemKind,
    pub reference_code: String,
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    pub description: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl NewBomItem {
    pub fn new(
        item_kind: ItemKind,
        reference_code: impl Into<String>,
        name: impl Into<String>,
        quantity: Quantity,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            item_kind,
            reference_code: reference_code.into(),
            name: name.into(),
            quantity,
            unit: unit.into(),
            description: None,
            alternatives: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Field-level checks that do not depend on the tree.
    pub fn check(&self) -> DomainResult<()> {
        ensure_name(&self.name)
    }
}

/// A node in a BOM forest.
///
/// `children` is only ever changed by the store's structural primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    id: BomItemId,
    item_kind: ItemKind,
    reference_code: String,
    name: String,
    quantity: Quantity,
    unit: String,
    description: Option<String>,
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    children: Vec<BomItemId>,
}

impl BomItem {
    /// Build a childless node from creation input.
    pub fn new(id: BomItemId, input: NewBomItem) -> Self {
        Self {
            id,
            item_kind: input.item_kind,
            reference_code: input.reference_code,
            name: input.name,
            quantity: input.quantity,
            unit: input.unit,
            description: input.description,
            alternatives: input.alternatives,
            attributes: input.attributes,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> BomItemId {
        self.id
    }

    pub fn item_kind(&self) -> ItemKind {
        self.item_kind
    }

    pub fn reference_code(&self) -> &str {
        &self.reference_code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn children(&self) -> &[BomItemId] {
        &self.children
    }

    pub fn is_material(&self) -> bool {
        self.item_kind == ItemKind::Material
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<BomItemId> {
        &mut self.children
    }

    pub(crate) fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(kind) = patch.item_kind {
            self.item_kind = kind;
        }
        if let Some(code) = &patch.reference_code {
            self.reference_code = code.clone();
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(alternatives) = &patch.alternatives {
            self.alternatives = alternatives.clone();
        }
        if let Some(attributes) = &patch.attributes {
            self.attributes = attributes.clone();
        }
    }
}

/// Field-only edit. `None` leaves a field untouched.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub item_kind: Option<ItemKind>,
    pub reference_code: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<Quantity>,
    pub unit: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub description: Option<Option<String>>,
    pub alternatives: Option<Vec<Alternative>>,
    pub attributes: Option<BTreeMap<String, String>>,
}

/// A present key, `null` included, is `Some`; an absent key falls back to `default`.
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.item_kind = Some(kind);
        self
    }

    pub fn reference_code(mut self, code: impl Into<String>) -> Self {
        self.reference_code = Some(code.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn alternatives(mut self, alternatives: Vec<Alternative>) -> Self {
        self.alternatives = Some(alternatives);
        self
    }

    pub fn attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn check(&self) -> DomainResult<()> {
        match &self.name {
            Some(name) => ensure_name(name),
            None => Ok(()),
        }
    }
}

fn ensure_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steel() -> NewBomItem {
        NewBomItem::new(
            ItemKind::Material,
            "MAT-STEEL-01",
            "Steel sheet",
            Quantity::units(2).unwrap(),
            "kg",
        )
    }

    #[test]
    fn quantity_rejects_zero_and_negative() {
        assert!(matches!(
            Quantity::new(Decimal::ZERO),
            Err(DomainError::Validation(_))
        ));
        assert!(Quantity::new(Decimal::new(-5, 1)).is_err());
        assert_eq!(Quantity::new(Decimal::new(25, 2)).unwrap().value(), Decimal::new(25, 2));
    }

    #[test]
    fn quantity_deserialization_is_checked() {
        let ok: Quantity = serde_json::from_str("\"1.5\"").unwrap();
        assert_eq!(ok.value(), Decimal::new(15, 1));
        assert!(serde_json::from_str::<Quantity>("\"0\"").is_err());
    }

    #[test]
    fn materials_are_leaves() {
        assert!(!ItemKind::Material.can_have_children());
        assert!(ItemKind::Assembly.can_have_children());
        assert!(ItemKind::Product.can_have_children());
    }

    #[test]
    fn new_item_starts_without_children() {
        let item = BomItem::new(BomItemId::new(), steel().with_attribute("grade", "S235"));
        assert!(item.children().is_empty());
        assert_eq!(item.attributes().get("grade").map(String::as_str), Some("S235"));
        assert!(item.is_material());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut input = steel();
        input.name = "   ".to_string();
        assert!(matches!(input.check(), Err(DomainError::Validation(_))));
        assert!(ItemPatch::new().name("").check().is_err());
    }

    #[test]
    fn patch_updates_fields_but_never_children() {
        let child = BomItemId::new();
        let mut item = BomItem::new(
            BomItemId::new(),
            NewBomItem::new(ItemKind::Assembly, "ASM-1", "Frame", Quantity::ONE, "pcs")
                .with_description("welded"),
        );
        item.children_mut().push(child);

        let patch = ItemPatch::new()
            .name("Frame v2")
            .quantity(Quantity::units(4).unwrap())
            .description(None);
        item.apply_patch(&patch);

        assert_eq!(item.name(), "Frame v2");
        assert_eq!(item.quantity(), Quantity::units(4).unwrap());
        assert_eq!(item.description(), None);
        assert_eq!(item.reference_code(), "ASM-1");
        assert_eq!(item.children(), &[child]);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ItemPatch::new().is_empty());
        assert!(!ItemPatch::new().unit("m").is_empty());
    }
}
