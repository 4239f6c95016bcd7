// ==========================================
// 导入引擎集成测试
// ==========================================
// 覆盖: 幂等 / dry run 无副作用 / 大小写不敏感身份 / type 不参与身份 /
//       行级隔离 / 批次内重复身份 / 致命错误终止 / 提交模式
// ==========================================

mod test_helpers;

use offer_catalog_import::config::ConfigManager;
use offer_catalog_import::domain::{
    CommitMode, FieldValue, ImportOptions, ImportStrategy, ImportSummary, OfferField, RowAction,
};
use offer_catalog_import::importer::{CatalogImporter, CatalogImporterImpl};
use offer_catalog_import::repository::{
    CatalogRepository, CatalogRepositoryImpl, ImportBatchRepositoryImpl,
};
use std::collections::BTreeMap;
use test_helpers::{
    build_importer, create_test_db, offer_row, open_shared, raw_row, snapshot,
    FailingCatalogRepository,
};

/// 行号 → 判定结果
fn actions(summary: &ImportSummary) -> BTreeMap<usize, RowAction> {
    let mut map = BTreeMap::new();
    for e in &summary.created {
        map.insert(e.row_number, RowAction::Created);
    }
    for e in &summary.updated {
        map.insert(e.row_number, RowAction::Updated);
    }
    for e in &summary.skipped {
        map.insert(e.row_number, RowAction::Skipped);
    }
    for e in &summary.invalid {
        map.insert(e.row_number, RowAction::Invalid);
    }
    for e in &summary.errors {
        map.insert(e.row_number, RowAction::Error);
    }
    map
}

fn camry_oil_change(after_price: &str) -> offer_catalog_import::domain::RawRow {
    offer_row(
        "Toyota",
        "Camry",
        "Oil Change",
        "Oil Change",
        "89.99",
        after_price,
        "59.99",
    )
}

#[tokio::test]
async fn test_toyota_create_rerun_update() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    // 首次导入 → 新建
    let first = importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(first.totals.created, 1);
    assert_eq!(first.totals.total(), 1);

    // 相同文件再次导入 → 跳过
    let second = importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(second.totals.skipped, 1);
    assert_eq!(second.skipped[0].reason, "no changes detected");

    // 修改 after_price → 更新，仅一个变更
    let third = importer
        .import_rows(vec![camry_oil_change("59.99")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(third.totals.updated, 1);
    let changes = &third.updated[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, OfferField::AfterPrice);
    assert_eq!(changes[0].old, FieldValue::Price(69.99));
    assert_eq!(changes[0].new, FieldValue::Price(59.99));

    let record = importer
        .catalog_repo()
        .find_by_identity(&offer_catalog_import::IdentityKey::new(
            "toyota", "camry", "oil change",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.after_price, 59.99);
}

#[tokio::test]
async fn test_second_identical_commit_is_all_skipped() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    let rows = vec![
        camry_oil_change("69.99"),
        offer_row("Honda", "Civic", "Wash", "Premium Wash", "30", "25", ""),
        offer_row("Ford", "", "Tires", "Rotation", "40", "35", "0"),
    ];

    let first = importer
        .import_rows(rows.clone(), ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(first.totals.created, 3);

    let second = importer
        .import_rows(rows, ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(second.totals.skipped, 3);
    assert_eq!(second.totals.total(), 3);
}

#[tokio::test]
async fn test_dry_run_matches_commit_and_leaves_store_untouched() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    importer
        .import_rows(
            vec![
                camry_oil_change("69.99"),
                offer_row("Honda", "Civic", "Wash", "Premium Wash", "30", "25", ""),
            ],
            ImportOptions::commit(),
        )
        .await
        .unwrap();

    let rows = vec![
        camry_oil_change("69.99"),                                          // skip
        offer_row("Honda", "Civic", "Wash", "Premium Wash", "30", "20", ""), // update
        offer_row("Kia", "Rio", "Brakes", "Pads", "120", "99", ""),          // create
        offer_row("Kia", "Rio", "Brakes", "", "120", "99", ""),              // invalid
        offer_row("kia", "RIO", "Brakes", "pads", "120", "89", ""),          // update (in-batch)
    ];

    let before = snapshot(importer.catalog_repo()).await;
    let dry = importer
        .import_rows(rows.clone(), ImportOptions::dry_run())
        .await
        .unwrap();
    let after = snapshot(importer.catalog_repo()).await;
    assert_eq!(before, after, "dry run must not change the catalog");

    let committed = importer
        .import_rows(rows, ImportOptions::commit())
        .await
        .unwrap();

    assert_eq!(actions(&dry), actions(&committed));
    assert_eq!(dry.totals, committed.totals);
    assert_eq!(
        dry.updated.last().map(|u| u.changes.clone()),
        committed.updated.last().map(|u| u.changes.clone())
    );
}

#[tokio::test]
async fn test_identity_is_case_insensitive() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();

    let upper = offer_row(
        "TOYOTA",
        "CAMRY",
        "Oil Change",
        "OIL CHANGE",
        "89.99",
        "65.00",
        "59.99",
    );
    let summary = importer
        .import_rows(vec![upper], ImportOptions::commit())
        .await
        .unwrap();

    assert_eq!(summary.totals.updated, 1);
    assert_eq!(summary.updated[0].identity.brand, "Toyota");
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_type_is_not_part_of_identity() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();

    let recategorized = offer_row(
        "Toyota",
        "Camry",
        "Maintenance",
        "Oil Change",
        "89.99",
        "69.99",
        "59.99",
    );
    let summary = importer
        .import_rows(vec![recategorized], ImportOptions::commit())
        .await
        .unwrap();

    assert_eq!(summary.totals.updated, 1);
    let changes = &summary.updated[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, OfferField::Type);
    assert_eq!(changes[0].new, FieldValue::Text("Maintenance".to_string()));
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_bad_row_does_not_abort_batch() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    let rows = vec![
        offer_row("A", "", "", "P1", "10", "9", ""),
        offer_row("B", "", "", "P2", "10", "9", ""),
        offer_row("C", "", "", "P3", "10", "-5", ""),
        offer_row("D", "", "", "P4", "10", "9", ""),
        offer_row("E", "", "", "P5", "10", "9", ""),
    ];

    let summary = importer
        .import_rows(rows, ImportOptions::commit())
        .await
        .unwrap();

    assert_eq!(summary.totals.created, 4);
    assert_eq!(summary.totals.invalid, 1);
    assert_eq!(summary.invalid[0].row_number, 3);
    assert_eq!(summary.invalid[0].reason, "negative or malformed price");
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_missing_product_name_is_invalid() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    let summary = importer
        .import_rows(
            vec![raw_row(&[
                ("Brand", "Toyota"),
                ("Model", "Camry"),
                ("After Price", "69.99"),
            ])],
            ImportOptions::commit(),
        )
        .await
        .unwrap();

    assert_eq!(summary.totals.invalid, 1);
    assert!(summary.invalid[0].reason.contains("product name"));
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_out_of_range_price_is_invalid_and_rerun_is_stable() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));
    let rows = || {
        vec![
            offer_row("Toyota", "Camry", "Oil", "Oil Change", "1e307", "10", ""),
            offer_row("Toyota", "Camry", "Oil", "Wash", "99999999.99", "10", ""),
        ]
    };

    let first = importer
        .import_rows(rows(), ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(first.totals.invalid, 1);
    assert_eq!(first.invalid[0].row_number, 1);
    assert_eq!(first.invalid[0].reason, "negative or malformed price");
    assert_eq!(first.totals.created, 1);

    let second = importer
        .import_rows(rows(), ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(second.totals.invalid, 1);
    assert_eq!(second.totals.skipped, 1);
    assert_eq!(second.totals.updated, 0);
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_discount_zero_and_absent_both_directions() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));
    let row = |discount: &str| offer_row("Toyota", "Camry", "", "Wash", "20", "15", discount);

    importer
        .import_rows(vec![row("0")], ImportOptions::commit())
        .await
        .unwrap();

    // 0 → 缺省
    let cleared = importer
        .import_rows(vec![row("")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(cleared.totals.updated, 1);
    let change = &cleared.updated[0].changes[0];
    assert_eq!(change.field, OfferField::DiscountedPrice);
    assert_eq!(change.old, FieldValue::Price(0.0));
    assert_eq!(change.new, FieldValue::Absent);

    // 缺省 → 0
    let restored = importer
        .import_rows(vec![row("0")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(restored.totals.updated, 1);
    assert_eq!(restored.updated[0].changes[0].old, FieldValue::Absent);
    assert_eq!(restored.updated[0].changes[0].new, FieldValue::Price(0.0));

    // 0 → 0
    let unchanged = importer
        .import_rows(vec![row("0")], ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(unchanged.totals.skipped, 1);
}

#[tokio::test]
async fn test_in_batch_duplicate_identity() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    let rows = vec![
        offer_row("Mazda", "CX-5", "Wash", "Basic Wash", "20", "15", ""),
        offer_row("MAZDA", "cx-5", "Wash", "basic wash", "20", "15", ""),
        offer_row("mazda", "CX-5", "Wash", "Basic Wash", "20", "12", ""),
    ];

    let dry = importer
        .import_rows(rows.clone(), ImportOptions::dry_run())
        .await
        .unwrap();
    let expected: BTreeMap<usize, RowAction> = [
        (1, RowAction::Created),
        (2, RowAction::Skipped),
        (3, RowAction::Updated),
    ]
    .into_iter()
    .collect();
    assert_eq!(actions(&dry), expected);
    assert_eq!(dry.updated[0].record_id, None);
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 0);

    let committed = importer
        .import_rows(rows, ImportOptions::commit())
        .await
        .unwrap();
    assert_eq!(actions(&committed), expected);
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_storage_unavailable_stops_batch() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    let importer = CatalogImporterImpl::with_defaults(
        FailingCatalogRepository::new(CatalogRepositoryImpl::from_connection(conn.clone()), 2),
        ImportBatchRepositoryImpl::from_connection(conn.clone()),
        ConfigManager::from_connection(conn.clone()).unwrap(),
    );

    let rows = vec![
        offer_row("A", "", "", "P1", "10", "9", ""),
        offer_row("B", "", "", "P2", "10", "9", ""),
        offer_row("C", "", "", "P3", "10", "9", ""),
        offer_row("D", "", "", "P4", "10", "9", ""),
    ];

    let summary = importer
        .import_rows(rows, ImportOptions::commit())
        .await
        .unwrap();

    assert_eq!(summary.totals.created, 2);
    assert_eq!(summary.totals.total(), 2);
    assert_eq!(summary.total_rows, 4);
    assert!(summary
        .fatal_error
        .as_deref()
        .is_some_and(|e| e.contains("disk I/O error")));
    assert!(summary.has_errors());

    let repo = CatalogRepositoryImpl::from_connection(conn);
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_always_new_conflict_is_row_level() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();

    for (commit_mode, product) in [
        (CommitMode::PerRow, "Premium Wash"),
        (CommitMode::Batch, "Express Wash"),
    ] {
        let options = ImportOptions::commit()
            .with_strategy(ImportStrategy::AlwaysNew)
            .with_commit_mode(commit_mode);
        let rows = vec![
            camry_oil_change("69.99"),
            offer_row("Honda", "Civic", "Wash", product, "30", "25", ""),
        ];
        let summary = importer.import_rows(rows, options).await.unwrap();

        assert_eq!(summary.totals.error, 1, "mode {}", commit_mode);
        assert_eq!(summary.errors[0].row_number, 1);
        assert_eq!(summary.totals.created, 1);
        assert!(summary.fatal_error.is_none());
    }

    assert_eq!(importer.catalog_repo().count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_batch_mode_commits_non_errored_rows() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = build_importer(open_shared(&db_path));

    importer
        .import_rows(vec![camry_oil_change("69.99")], ImportOptions::commit())
        .await
        .unwrap();

    let options = ImportOptions::commit()
        .with_strategy(ImportStrategy::AlwaysNew)
        .with_commit_mode(CommitMode::Batch);
    let rows = vec![
        offer_row("Kia", "Rio", "", "Pads", "120", "99", ""),
        camry_oil_change("50"),
        offer_row("Kia", "Soul", "", "Pads", "120", "99", ""),
    ];

    let summary = importer.import_rows(rows, options).await.unwrap();
    assert_eq!(summary.totals.created, 2);
    assert_eq!(summary.totals.error, 1);
    assert_eq!(importer.catalog_repo().count().await.unwrap(), 3);

    let camry = importer
        .catalog_repo()
        .find_by_identity(&offer_catalog_import::IdentityKey::new(
            "Toyota",
            "Camry",
            "Oil Change",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(camry.after_price, 69.99);
}
