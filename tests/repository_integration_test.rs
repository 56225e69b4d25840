// ==========================================
// 配方版本与成本核算系统 - 仓储层集成测试
// ==========================================
// 覆盖: 配方文档读写回程/指针操作/部分更新/暂存行生命周期
// ==========================================

mod test_helpers;

use chrono::{Duration, TimeZone, Utc};
use recipe_backend::domain::recipe::{
    Component, Recipe, RecipeVersion, VersionFieldSet, VersionProcess,
};
use recipe_backend::domain::staging::{StagedRow, StagedRowInput};
use recipe_backend::domain::types::VersionState;
use recipe_backend::repository::error::RepositoryError;
use recipe_backend::repository::recipe_repo::{RecipeRepository, SqliteRecipeRepository};
use recipe_backend::repository::staging_repo::{SqliteStagingRepository, StagingRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

// ==========================================
// 辅助函数
// ==========================================

fn setup() -> (NamedTempFile, Arc<Mutex<Connection>>) {
    let (temp_file, conn) = test_helpers::create_test_db().expect("创建测试数据库失败");
    test_helpers::seed_product(&conn, "pt-301002", "301002", "PT", None, None)
        .expect("写入成品失败");
    test_helpers::seed_product(&conn, "mp-801007", "801007", "MP", Some(4500.0), None)
        .expect("写入原料失败");
    test_helpers::seed_product(&conn, "mp-801008", "801008", "MP", Some(1200.0), None)
        .expect("写入原料失败");
    (temp_file, conn)
}

fn sample_version(number: i64) -> RecipeVersion {
    RecipeVersion {
        version: number,
        state: VersionState::Draft,
        publish_date: Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
        publisher: Some("ops".to_string()),
        base_qty: 10.0,
        unit_pt: Some("un".to_string()),
        process: Some(VersionProcess::Special {
            name: Some("手工分装".to_string()),
            cost: Some(1000.0),
        }),
        components: vec![
            Component {
                product_id: "mp-801007".to_string(),
                qty_per_base: 5.0,
                unit: Some("kg".to_string()),
                waste_pct: 2.0,
            },
            Component {
                product_id: "mp-801008".to_string(),
                qty_per_base: 3.0,
                unit: None,
                waste_pct: 0.0,
            },
        ],
        cost: None,
    }
}

fn sample_recipe() -> Recipe {
    let now = Utc::now();
    Recipe {
        recipe_id: "r-1".to_string(),
        product_id: "pt-301002".to_string(),
        current_version: None,
        versions: vec![sample_version(1)],
        created_at: now,
        updated_at: now,
    }
}

// ==========================================
// 配方仓储
// ==========================================

#[tokio::test]
async fn test_insert_and_find_roundtrip() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);

    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    let loaded = repo
        .find_by_product_id("pt-301002")
        .await
        .expect("查询失败")
        .expect("配方不存在");

    assert_eq!(loaded.recipe_id, "r-1");
    assert_eq!(loaded.current_version, None);
    assert_eq!(loaded.versions.len(), 1);

    let v1 = &loaded.versions[0];
    assert_eq!(v1.state, VersionState::Draft);
    assert_eq!(
        v1.process,
        Some(VersionProcess::Special {
            name: Some("手工分装".to_string()),
            cost: Some(1000.0)
        })
    );
    // 组件按写入顺序返回
    assert_eq!(v1.components.len(), 2);
    assert_eq!(v1.components[0].product_id, "mp-801007");
    assert_eq!(v1.components[1].product_id, "mp-801008");

    assert!(repo.find_by_product_id("no-such").await.expect("查询失败").is_none());
}

#[tokio::test]
async fn test_insert_duplicate_product_unique_violation() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);

    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    let mut duplicate = sample_recipe();
    duplicate.recipe_id = "r-2".to_string();
    let err = repo.insert(&duplicate).await.unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
}

#[tokio::test]
async fn test_push_version_and_pointer_ops() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);
    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    repo.push_version("r-1", &sample_version(2), true).await.expect("追加版本失败");

    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    assert_eq!(loaded.versions.len(), 2);
    assert_eq!(loaded.current_version, Some(2));
    // 版本按写入顺序返回
    assert_eq!(loaded.versions[0].version, 1);
    assert_eq!(loaded.versions[1].version, 2);

    repo.set_current_pointer("r-1", 1).await.expect("设置指针失败");
    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    assert_eq!(loaded.current_version, Some(1));

    repo.clear_current_pointer("r-1").await.expect("清除指针失败");
    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    assert_eq!(loaded.current_version, None);
}

#[tokio::test]
async fn test_set_version_state_and_cost() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);
    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    repo.set_version_state("r-1", 1, VersionState::Current)
        .await
        .expect("更新状态失败");
    repo.set_version_cost("r-1", 1, 45000.0).await.expect("写入成本失败");

    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    assert_eq!(loaded.versions[0].state, VersionState::Current);
    assert_eq!(loaded.versions[0].cost, Some(45000.0));

    // 不存在的版本 → NotFound
    assert!(matches!(
        repo.set_version_state("r-1", 9, VersionState::Obsolete).await.unwrap_err(),
        RepositoryError::NotFound { .. }
    ));
    assert!(matches!(
        repo.set_version_cost("r-1", 9, 1.0).await.unwrap_err(),
        RepositoryError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_update_version_fields_partial() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);
    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    let fields = VersionFieldSet {
        base_qty: Some(25.0),
        process: Some(None), // 清除工序
        ..Default::default()
    };
    repo.update_version_fields("r-1", 1, &fields).await.expect("更新字段失败");

    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    let v1 = &loaded.versions[0];
    assert_eq!(v1.base_qty, 25.0);
    assert_eq!(v1.process, None);
    // 未提供的字段保持不变
    assert_eq!(v1.publisher.as_deref(), Some("ops"));
    assert_eq!(v1.components.len(), 2);
}

#[tokio::test]
async fn test_replace_version_swaps_components() {
    let (_tmp, conn) = setup();
    let repo = SqliteRecipeRepository::new(conn);
    repo.insert(&sample_recipe()).await.expect("写入配方失败");

    let mut replacement = sample_version(1);
    replacement.state = VersionState::Current;
    replacement.components = vec![Component {
        product_id: "mp-801008".to_string(),
        qty_per_base: 9.0,
        unit: Some("kg".to_string()),
        waste_pct: 0.0,
    }];
    repo.replace_version("r-1", &replacement).await.expect("替换版本失败");

    let loaded = repo.find_by_product_id("pt-301002").await.unwrap().unwrap();
    let v1 = &loaded.versions[0];
    assert_eq!(v1.state, VersionState::Current);
    assert_eq!(v1.components.len(), 1);
    assert_eq!(v1.components[0].product_id, "mp-801008");

    // 替换不存在的版本 → NotFound
    assert!(matches!(
        repo.replace_version("r-1", &sample_version(5)).await.unwrap_err(),
        RepositoryError::NotFound { .. }
    ));
}

// ==========================================
// 暂存仓储
// ==========================================

fn staged_rows(batch_id: &str, count: usize) -> Vec<StagedRow> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            StagedRow::from_input(
                StagedRowInput {
                    product_sku: Some("301002".to_string()),
                    version: Some("1".to_string()),
                    component_sku: Some(format!("80100{}", i)),
                    qty_per_base: Some("5".to_string()),
                    ..Default::default()
                },
                batch_id,
                now,
            )
        })
        .collect()
}

#[tokio::test]
async fn test_staging_row_lifecycle() {
    let (_tmp, conn) = setup();
    let repo = SqliteStagingRepository::new(conn);

    let inserted = repo.insert_rows(&staged_rows("b-1", 4)).await.expect("写入失败");
    assert_eq!(inserted, 4);
    repo.insert_rows(&staged_rows("b-2", 2)).await.expect("写入失败");

    assert_eq!(repo.count_batch("b-1").await.expect("计数失败"), 4);
    assert_eq!(repo.count_batch("no-such").await.expect("计数失败"), 0);

    let sample = repo.sample_batch("b-1", 2).await.expect("样本查询失败");
    assert_eq!(sample.len(), 2);
    assert_eq!(sample[0].batch_id, "b-1");
    assert_eq!(sample[0].fields.component_sku.as_deref(), Some("801000"));

    let all = repo.rows_for_batch("b-1").await.expect("查询失败");
    assert_eq!(all.len(), 4);

    // 删除只影响目标批次
    assert_eq!(repo.delete_batch("b-1").await.expect("删除失败"), 4);
    assert_eq!(repo.count_batch("b-1").await.expect("计数失败"), 0);
    assert_eq!(repo.count_batch("b-2").await.expect("计数失败"), 2);
}

#[tokio::test]
async fn test_staging_purge_by_cutoff() {
    let (_tmp, conn) = setup();
    let repo = SqliteStagingRepository::new(conn);

    let old_time = Utc::now() - Duration::days(10);
    let mut old_rows = staged_rows("b-old", 3);
    for row in &mut old_rows {
        row.created_at = old_time;
    }
    repo.insert_rows(&old_rows).await.expect("写入失败");
    repo.insert_rows(&staged_rows("b-new", 2)).await.expect("写入失败");

    let purged = repo
        .purge_older_than(Utc::now() - Duration::days(7))
        .await
        .expect("清理失败");
    assert_eq!(purged, 3);
    assert_eq!(repo.count_batch("b-old").await.expect("计数失败"), 0);
    assert_eq!(repo.count_batch("b-new").await.expect("计数失败"), 2);
}
