//! End-to-end reconciliation against the SQLite store.

use assert_matches::assert_matches;
use rust_decimal::Decimal;

use variant_sync::db::Database;
use variant_sync::draft::{DraftAction, VariantDraft};
use variant_sync::models::{Asset, Lifecycle, Product, ProductStatus, SizeCode};
use variant_sync::reconcile::{self, ReconciliationReport, SyncOptions, plan};
use variant_sync::service::InventoryService;

fn product(category_id: &str) -> Product {
    Product {
        id: None,
        slug: None,
        name: "Linen Shirt".into(),
        description: "Breathable summer shirt".into(),
        price: Decimal::new(2999, 2),
        discount_price: Decimal::new(2499, 2),
        category_id: Some(category_id.into()),
        sku: "LS-001".into(),
        status: ProductStatus::Published,
        tags: vec!["summer".into()],
        assets: vec![Asset::image("https://cdn.example.com/shirt.jpg")],
    }
}

/// Store a product with one Red variant holding SIZE_38 at stock 5.
async fn seeded() -> (Database, VariantDraft) {
    let db = Database::open_in_memory().unwrap();
    let category = db.add_category("Shirts").unwrap();

    let (draft, variant_id) = VariantDraft::new(product(&category.id)).add_variant();
    let mut draft = draft;
    let sizes: Vec<_> = draft.variant(&variant_id).unwrap().sizes.clone();
    for slot in sizes {
        draft = if slot.code == SizeCode::Size38 {
            draft.edit_size_stock(&slot.id, 5).unwrap()
        } else {
            draft.remove_size(&variant_id, &slot.id).unwrap()
        };
    }

    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    (db, settled)
}

#[tokio::test]
async fn first_save_creates_everything_and_settles() {
    let (db, draft) = seeded().await;

    let product_id = draft.product().id.clone().expect("product id assigned");
    assert!(draft.product().slug.as_deref().unwrap().starts_with("linen-shirt-"));
    assert_eq!(draft.variants().len(), 1);
    assert_eq!(draft.variants()[0].lifecycle, Lifecycle::Persisted);

    let stored = db.load_product(&product_id).await.unwrap();
    assert_eq!(stored.variants.len(), 1);
    assert_eq!(stored.variants[0].id, draft.variants()[0].id);
    assert_eq!(stored.variants[0].sizes.len(), 1);
    assert_eq!(stored.variants[0].sizes[0].code, SizeCode::Size38);
    assert_eq!(stored.variants[0].sizes[0].stock, 5);
    assert_eq!(stored.variants[0].sizes[0].id, draft.variants()[0].sizes[0].id);
}

#[tokio::test]
async fn persisted_variant_update_scenario() {
    let (db, draft) = seeded().await;
    let product_id = draft.product().id.clone().unwrap();
    let variant_id = draft.variants()[0].id.clone();

    // Reload from the store, then add SIZE_40 at stock 0
    let draft = VariantDraft::load(db.load_product(&product_id).await.unwrap());
    let (draft, size_id) = draft.add_size(&variant_id).unwrap();
    let draft = draft
        .apply(DraftAction::EditSizeCode {
            variant_id: variant_id.clone(),
            size_id,
            code: SizeCode::Size40,
        })
        .unwrap();

    let planned = plan(&draft, draft.baseline(), SyncOptions::default());
    assert_eq!(planned.anchor.name(), "update_product");
    let names: Vec<_> = planned.operations.iter().map(|op| op.name()).collect();
    assert_eq!(names, vec!["update_variant", "update_size_stock", "add_sizes"]);

    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(settled.variants()[0]
        .sizes
        .iter()
        .all(|s| s.lifecycle == Lifecycle::Persisted));

    let stored = db.load_product(&product_id).await.unwrap();
    let codes: Vec<_> = stored.variants[0]
        .sizes
        .iter()
        .map(|s| (s.code, s.stock))
        .collect();
    assert_eq!(codes, vec![(SizeCode::Size38, 5), (SizeCode::Size40, 0)]);
}

#[tokio::test]
async fn reassigned_size_code_reaches_the_store() {
    let (db, draft) = seeded().await;
    let product_id = draft.product().id.clone().unwrap();
    let variant_id = draft.variants()[0].id.clone();
    let size_id = draft.variants()[0].sizes[0].id.clone();

    let draft = draft
        .apply(DraftAction::EditSizeCode {
            variant_id: variant_id.clone(),
            size_id,
            code: SizeCode::Size36,
        })
        .unwrap();
    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());

    let stored = db.load_product(&product_id).await.unwrap();
    let codes: Vec<_> = stored.variants[0]
        .sizes
        .iter()
        .map(|s| (s.code, s.stock))
        .collect();
    assert_eq!(codes, vec![(SizeCode::Size36, 5)]);
    assert_eq!(settled.baseline(), Some(&stored));

    // The freed code can be taken again
    let (draft, _) = settled.add_size(&variant_id).unwrap();
    let (report, _) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());

    let stored = db.load_product(&product_id).await.unwrap();
    let codes: Vec<_> = stored.variants[0].sizes.iter().map(|s| s.code).collect();
    assert_eq!(codes, vec![SizeCode::Size36, SizeCode::Size38]);
}

#[tokio::test]
async fn removals_reach_the_store() {
    let (db, draft) = seeded().await;
    let product_id = draft.product().id.clone().unwrap();
    let variant_id = draft.variants()[0].id.clone();
    let size_id = draft.variants()[0].sizes[0].id.clone();

    // Swap SIZE_38 for a fresh size, and add a second color
    let draft = draft.remove_size(&variant_id, &size_id).unwrap();
    let (draft, _) = draft.add_size(&variant_id).unwrap();
    let (draft, second) = draft.add_variant();
    let draft = draft
        .edit_variant_color(&second, "Navy", "000080".parse().unwrap())
        .unwrap();

    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());

    let stored = db.load_product(&product_id).await.unwrap();
    assert_eq!(stored.variants.len(), 2);
    assert_eq!(stored.variants[0].sizes.len(), 1);
    assert_eq!(stored.variants[0].sizes[0].code, SizeCode::Size36);
    assert_eq!(stored.variants[1].color_name, "Navy");
    assert_eq!(stored.variants[1].sizes.len(), 6);

    // Deleting the first color removes it and its sizes
    let draft = settled.remove_variant(&variant_id).unwrap();
    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(settled.variant(&variant_id).is_none());

    let stored = db.load_product(&product_id).await.unwrap();
    assert_eq!(stored.variants.len(), 1);
    assert_eq!(stored.variants[0].color_name, "Navy");
    assert_eq!(settled.baseline(), Some(&stored));
}

#[tokio::test]
async fn failed_operation_is_reported_and_retried() {
    let (db, draft) = seeded().await;
    let variant_id = draft.variants()[0].id.clone();
    let size_id = draft.variants()[0].sizes[0].id.clone();

    // The size disappears behind the draft's back
    db.delete_size(&size_id).await.unwrap();

    let draft = draft.edit_size_stock(&size_id, 9).unwrap();
    let (draft, _) = draft.add_variant();
    let (report, settled) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();

    assert_matches!(report, ReconciliationReport::PartialFailure { .. });
    let failed: Vec<_> = report.failed().map(|o| o.operation.name()).collect();
    assert_eq!(failed, vec!["update_size_stock"]);

    // The new color went through regardless
    assert_eq!(settled.variants().len(), 2);
    assert!(settled.variants().iter().all(|v| v.lifecycle == Lifecycle::Persisted));

    // A retry only repeats what is still pending
    let options = SyncOptions {
        skip_unchanged: true,
    };
    let retry = plan(&settled, settled.baseline(), options);
    let names: Vec<_> = retry.operations.iter().map(|op| op.name()).collect();
    assert_eq!(names, vec!["update_size_stock"]);
    assert_eq!(retry.operations[0].variant_id(), variant_id);
}

#[tokio::test]
async fn anchor_failure_stops_the_pass() {
    let (db, draft) = seeded().await;
    let product_id = draft.product().id.clone().unwrap();

    let mut snapshot = db.load_product(&product_id).await.unwrap();
    snapshot.product.id = Some("missing-product".into());
    let orphan = VariantDraft::load(snapshot);
    let (orphan, _) = orphan.add_variant();

    let (report, settled) = reconcile::save(&db, &orphan, SyncOptions::default())
        .await
        .unwrap();
    assert_matches!(report, ReconciliationReport::Fatal { ref error, .. } => {
        assert!(error.contains("missing-product"));
    });
    assert_eq!(settled, orphan);

    // Nothing reached the store
    let stored = db.load_product(&product_id).await.unwrap();
    assert_eq!(stored.variants.len(), 1);
}

#[tokio::test]
async fn unknown_category_fails_the_anchor() {
    let db = Database::open_in_memory().unwrap();
    let (draft, _) = VariantDraft::new(product("no-such-category")).add_variant();

    let (report, _) = reconcile::save(&db, &draft, SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_fatal());
}
