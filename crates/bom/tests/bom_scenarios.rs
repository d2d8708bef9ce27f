use chrono::Utc;
use rust_decimal::Decimal;

use forgeerp_bom::{
    AvailabilityStatus, BomDocument, BomRepository, BomStatus, EngineConfig, InMemoryBomRepository,
    InventoryItem, InventorySnapshot, ItemKind, ItemPatch, MovePosition, Mutation,
    MutationCoordinator, MutationError, NewBomItem, Quantity, ValidationError, ValidationWarning,
    WarningPolicy, summarize_by_reference,
};
use forgeerp_core::{BomDocumentId, BomItemId, ExpectedVersion, UserId};

fn draft(name: &str) -> (BomDocument, UserId) {
    forgeerp_observability::init_for_tests();
    let actor = UserId::new();
    let document = BomDocument::new(BomDocumentId::new(), name, actor, Utc::now()).unwrap();
    (document, actor)
}

fn item(kind: ItemKind, code: &str, name: &str, qty: u32) -> NewBomItem {
    let unit = if kind == ItemKind::Material { "pcs" } else { "ea" };
    NewBomItem::new(kind, code, name, Quantity::units(qty).unwrap(), unit)
}

fn stock(code: &str, on_hand: i64, reorder: i64) -> InventoryItem {
    InventoryItem {
        reference_code: code.to_string(),
        name: code.to_string(),
        unit: "pcs".to_string(),
        stock_on_hand: Decimal::from(on_hand),
        reorder_threshold: Decimal::from(reorder),
    }
}

/// Bicycle
///   Frame (x1)
///     Bolt (x4)
///   Wheel (x2)
///     Spoke (x32)
///     Bolt (x2)
struct Bicycle {
    coord: MutationCoordinator,
    bike: BomItemId,
    frame: BomItemId,
    wheel: BomItemId,
    spoke: BomItemId,
}

fn bicycle() -> Bicycle {
    let (document, actor) = draft("Bicycle");
    let mut coord = MutationCoordinator::with_defaults(document, actor);
    let bike = coord
        .add_item(None, item(ItemKind::Product, "BIKE", "Bicycle", 1))
        .unwrap()
        .item_id;
    let frame = coord
        .add_item(Some(bike), item(ItemKind::Assembly, "FRAME", "Frame", 1))
        .unwrap()
        .item_id;
    coord
        .add_item(Some(frame), item(ItemKind::Material, "BOLT", "Bolt", 4))
        .unwrap();
    let wheel = coord
        .add_item(Some(bike), item(ItemKind::Assembly, "WHEEL", "Wheel", 2))
        .unwrap()
        .item_id;
    let spoke = coord
        .add_item(Some(wheel), item(ItemKind::Material, "SPOKE", "Spoke", 32))
        .unwrap()
        .item_id;
    coord
        .add_item(Some(wheel), item(ItemKind::Material, "BOLT", "Bolt", 2))
        .unwrap();
    Bicycle {
        coord,
        bike,
        frame,
        wheel,
        spoke,
    }
}

#[test]
fn moving_an_assembly_into_its_own_descendant_is_rejected_and_changes_nothing() {
    let mut b = bicycle();
    let before = b.coord.forest().clone();
    let revision = b.coord.document().revision();

    let err = b
        .coord
        .move_item(b.wheel, b.spoke, MovePosition::Inside)
        .unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(
        report.errors,
        vec![ValidationError::Cycle {
            source_id: b.wheel,
            target_id: b.spoke,
        }]
    );
    assert_eq!(b.coord.forest(), &before);
    assert_eq!(b.coord.document().revision(), revision);
}

#[test]
fn materials_never_receive_children() {
    let mut b = bicycle();

    let err = b
        .coord
        .add_item(Some(b.spoke), item(ItemKind::Material, "NIPPLE", "Nipple", 1))
        .unwrap_err();
    assert!(matches!(
        err.report().map(|r| r.errors.as_slice()),
        Some([ValidationError::MaterialParent { parent_id }]) if *parent_id == b.spoke
    ));

    let err = b
        .coord
        .move_item(b.frame, b.spoke, MovePosition::Inside)
        .unwrap_err();
    assert!(matches!(err, MutationError::Rejected(_)));
    assert!(b.coord.forest().get(b.spoke).unwrap().children().is_empty());
}

#[test]
fn products_cannot_be_nested() {
    let mut b = bicycle();
    let err = b
        .coord
        .add_item(Some(b.frame), item(ItemKind::Product, "TRIKE", "Tricycle", 1))
        .unwrap_err();
    assert!(matches!(
        err.report().map(|r| r.errors.as_slice()),
        Some([ValidationError::NestedProduct { ancestor_id }]) if *ancestor_id == b.bike
    ));
}

#[test]
fn ninth_level_needs_confirmation_then_applies_with_warning() {
    let (document, actor) = draft("Tower");
    let mut coord = MutationCoordinator::with_defaults(document, actor);

    let mut parent = coord
        .add_item(None, item(ItemKind::Assembly, "L1", "Level 1", 1))
        .unwrap()
        .item_id;
    for level in 2..=8 {
        parent = coord
            .add_item(
                Some(parent),
                item(ItemKind::Assembly, &format!("L{level}"), &format!("Level {level}"), 1),
            )
            .unwrap()
            .item_id;
    }
    assert_eq!(coord.forest().depth(parent).unwrap(), 8);
    let revision = coord.document().revision();

    let deep = item(ItemKind::Material, "L9", "Level 9", 1);
    let expected = ValidationWarning::DeepNesting {
        depth: 9,
        threshold: 8,
    };

    let err = coord.add_item(Some(parent), deep.clone()).unwrap_err();
    assert_eq!(err, MutationError::Unconfirmed(vec![expected.clone()]));
    assert_eq!(coord.document().revision(), revision);

    let err = coord
        .apply(
            Mutation::AddItem {
                parent_id: Some(parent),
                item: deep.clone(),
            },
            WarningPolicy::Strict,
        )
        .unwrap_err();
    assert!(matches!(&err, MutationError::Rejected(r) if r.errors.is_empty() && r.warnings == vec![expected.clone()]));

    let applied = coord
        .apply(
            Mutation::AddItem {
                parent_id: Some(parent),
                item: deep,
            },
            WarningPolicy::WarnOnly,
        )
        .unwrap();
    assert_eq!(applied.warnings, vec![expected]);
    assert_eq!(coord.forest().depth(applied.item_id).unwrap(), 9);
}

#[test]
fn undo_and_redo_walk_the_snapshot_log() {
    let mut b = bicycle();
    let built = b.coord.forest().clone();

    b.coord
        .move_item(b.wheel, b.frame, MovePosition::Before)
        .unwrap();
    let moved = b.coord.forest().clone();
    assert_eq!(moved.get(b.bike).unwrap().children(), &[b.wheel, b.frame]);

    b.coord
        .update_item(b.spoke, ItemPatch::new().quantity(Quantity::units(36).unwrap()))
        .unwrap();

    b.coord.undo().unwrap();
    assert_eq!(b.coord.forest(), &moved);
    b.coord.undo().unwrap();
    assert_eq!(b.coord.forest(), &built);

    b.coord.redo().unwrap();
    assert_eq!(b.coord.forest(), &moved);

    // a fresh mutation discards the redo branch
    b.coord.delete_item(b.frame).unwrap();
    assert!(!b.coord.can_redo());
    assert!(matches!(b.coord.redo(), Err(MutationError::History(_))));
    assert!(!b.coord.forest().contains(b.frame));
}

#[test]
fn history_limit_from_configuration_bounds_undo() {
    let config = EngineConfig::from_lookup(|key| {
        (key == "FORGEERP_BOM_HISTORY_LIMIT").then(|| "3".to_string())
    })
    .unwrap();
    let (document, actor) = draft("Shelf");
    let mut coord = MutationCoordinator::new(document, actor, config);

    for n in 0..5 {
        coord
            .add_item(None, item(ItemKind::Component, &format!("P{n}"), "Plank", 1))
            .unwrap();
    }
    coord.undo().unwrap();
    coord.undo().unwrap();
    assert!(!coord.can_undo());
    assert_eq!(coord.forest().len(), 3);
}

#[test]
fn rollup_multiplies_along_paths_and_classifies_stock() {
    let b = bicycle();
    let inventory: InventorySnapshot = vec![stock("BOLT", 30, 40), stock("SPOKE", 150, 100)]
        .into_iter()
        .collect();

    let rows = b
        .coord
        .aggregate(Quantity::units(3).unwrap(), &inventory)
        .unwrap();
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.path.as_str(), r.required_quantity, r.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Bicycle/Frame/Bolt", Decimal::from(12), AvailabilityStatus::Warning),
            ("Bicycle/Wheel/Spoke", Decimal::from(192), AvailabilityStatus::Critical),
            ("Bicycle/Wheel/Bolt", Decimal::from(12), AvailabilityStatus::Warning),
        ]
    );

    let totals = summarize_by_reference(&rows, &inventory).unwrap();
    assert_eq!(totals[0].reference_code, "BOLT");
    assert_eq!(totals[0].occurrences, 2);
    assert_eq!(totals[0].required_quantity, Decimal::from(24));
    assert_eq!(totals[0].status, AvailabilityStatus::Warning);

    let unknown = b
        .coord
        .aggregate(Quantity::ONE, &InventorySnapshot::default())
        .unwrap();
    assert!(unknown.iter().all(|r| r.status == AvailabilityStatus::Unknown));
}

#[test]
fn approved_documents_are_read_only_until_reopened() {
    let mut b = bicycle();
    b.coord.transition(BomStatus::Approved).unwrap();

    let err = b.coord.delete_item(b.frame).unwrap_err();
    assert_eq!(err, MutationError::Locked(BomStatus::Approved));
    assert_eq!(b.coord.undo(), Err(MutationError::Locked(BomStatus::Approved)));

    b.coord.transition(BomStatus::Draft).unwrap();
    b.coord.delete_item(b.frame).unwrap();
    assert!(b.coord.transition(BomStatus::Active).is_err());
}

#[test]
fn documents_survive_a_repository_round_trip() {
    let b = bicycle();
    let actor = b.coord.actor();
    let repo = InMemoryBomRepository::new();
    let document = b.coord.into_document();
    repo.save(&document, ExpectedVersion::Exact(0)).unwrap();

    let loaded = repo.load(document.id_typed()).unwrap();
    assert_eq!(loaded, document);
    assert!(loaded.forest().check_integrity().is_ok());

    // reloaded documents keep editing from where they were
    let mut coord = MutationCoordinator::with_defaults(loaded, actor);
    coord
        .add_item(
            Some(b.wheel),
            item(ItemKind::Component, "HUB", "Hub", 1),
        )
        .unwrap();
    let edited = coord.into_document();
    repo.save(&edited, ExpectedVersion::Exact(document.revision()))
        .unwrap();
    assert_eq!(
        repo.load(edited.id_typed()).unwrap().forest().len(),
        document.forest().len() + 1
    );
}
