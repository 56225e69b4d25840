// ==========================================
// 配方版本与成本核算系统 - 门面端到端测试
// ==========================================
// 路径: CSV 上传 → 暂存 → 批次状态 → 促升 → 查询 → 核算
// ==========================================

mod test_helpers;

use recipe_backend::api::error::ApiError;
use recipe_backend::api::RecipeApi;
use recipe_backend::domain::types::{CostMethod, VersionState};
use rusqlite::Connection;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

// ==========================================
// 辅助函数
// ==========================================

fn setup() -> (NamedTempFile, RecipeApi) {
    let (temp_file, conn) = test_helpers::create_test_db().expect("创建测试数据库失败");
    seed_catalog(&conn);
    let api = RecipeApi::new(conn).expect("组装门面失败");
    (temp_file, api)
}

fn seed_catalog(conn: &Arc<Mutex<Connection>>) {
    test_helpers::seed_product(conn, "pt-301002", "301002", "PT", Some(9000.0), None)
        .expect("写入成品失败");
    test_helpers::seed_product(conn, "mp-801007", "801007", "MP", Some(4500.0), Some(4000.0))
        .expect("写入原料失败");
    test_helpers::seed_product(conn, "mp-801008", "801008", "MP", Some(1200.0), None)
        .expect("写入原料失败");
}

const CSV_CONTENT: &str = "\
product_sku,version,state,mark_current,base_qty,unit_pt,component_sku,qty_per_base,unit_mp,waste_pct,publish_date,publisher
301002,1,vigente,si,10,un,801007,5,kg,2,2025-01-15,ops
301002,1,,,,,801008,3,kg,0,,
";

// ==========================================
// 端到端流程
// ==========================================

#[tokio::test]
async fn test_csv_to_valuation_full_flow() {
    let (_tmp, api) = setup();

    // 1. 上传 CSV 内容入暂存
    let staged = api.stage_csv_content(CSV_CONTENT).await.expect("暂存失败");
    assert_eq!(staged.inserted, 2);

    // 2. 批次状态预览
    let status = api.batch_status(&staged.batch_id).await.expect("状态查询失败");
    assert_eq!(status.total, 2);
    assert!(!status.first_rows.is_empty());

    // 3. 试算不落库
    let dry = api
        .promote_batch(&staged.batch_id, false, true)
        .await
        .expect("试算失败");
    assert_eq!(dry.recipes_created, 1);
    assert!(matches!(
        api.get_recipe("301002").await.unwrap_err(),
        ApiError::NotFound(_)
    ));

    // 4. 真实促升
    let summary = api
        .promote_batch(&staged.batch_id, false, false)
        .await
        .expect("促升失败");
    assert_eq!(summary.recipes_created, 1);
    assert_eq!(summary.currents_set, 1);
    assert!(summary.errors.is_empty());

    // 5. 查询配方
    let recipe = api.get_recipe("301002").await.expect("查询配方失败");
    assert_eq!(recipe.current_version, Some(1));
    let v1 = recipe.find_version(1).expect("版本1不存在");
    assert_eq!(v1.state, VersionState::Current);
    assert_eq!(v1.components.len(), 2);

    // 6. 净价口径核算并持久化
    // 801007: 5 × 1.02 = 5.1 → 22950; 801008: 3 × 1200 = 3600
    let result = api
        .value_version("301002", None, CostMethod::NetPrice, None, true)
        .await
        .expect("核算失败");
    assert_eq!(result.total, 26550.0);
    assert_eq!(result.currency, "CLP"); // 配置默认币种

    let recipe = api.get_recipe("301002").await.expect("查询配方失败");
    assert_eq!(recipe.find_version(1).unwrap().cost, Some(26550.0));

    // 7. 批次清理
    let deleted = api.clear_batch(&staged.batch_id).await.expect("清理失败");
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn test_stage_csv_file_from_disk() {
    let (_tmp, api) = setup();

    let mut csv_file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时CSV失败");
    csv_file.write_all(CSV_CONTENT.as_bytes()).expect("写入CSV失败");
    csv_file.flush().expect("刷新CSV失败");

    let staged = api
        .stage_csv_file(csv_file.path().to_str().unwrap())
        .await
        .expect("文件暂存失败");
    assert_eq!(staged.inserted, 2);
}

#[tokio::test]
async fn test_stage_csv_file_errors() {
    let (_tmp, api) = setup();

    // 文件不存在
    let err = api.stage_csv_file("/no/such/file.csv").await.unwrap_err();
    assert!(matches!(err, ApiError::ImportFailed(_)));
    assert_eq!(err.code(), "IMPORT_FAILED");

    // 不支持的扩展名
    let txt_file = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .expect("创建临时文件失败");
    let err = api
        .stage_csv_file(txt_file.path().to_str().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportFailed(_)));
}

#[tokio::test]
async fn test_import_template_roundtrip() {
    let (_tmp, api) = setup();

    // 模板本身可以直接走上传路径
    let template = api.import_template();
    let staged = api.stage_csv_content(&template).await.expect("模板暂存失败");
    assert_eq!(staged.inserted, 2);
    assert!(staged.warnings.is_empty());
}

#[tokio::test]
async fn test_api_error_codes() {
    let (_tmp, api) = setup();

    let err = api.get_recipe("301002").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let err = api.set_current("301002", 1).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
