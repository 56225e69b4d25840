// ==========================================
// 配方版本与成本核算系统 - 核算引擎集成测试
// ==========================================
// 覆盖: 三种成本口径/损耗放大/工序成本口径/持久化/降级警告
// ==========================================

mod test_helpers;

use recipe_backend::config::StagingConfigReader;
use recipe_backend::domain::recipe::{
    ComponentInput, CreateRecipeInput, ProcessInput, VersionInput,
};
use recipe_backend::domain::types::{CostMethod, VersionState};
use recipe_backend::engine::error::EngineError;
use recipe_backend::engine::valuation::ValuationEngine;
use recipe_backend::engine::version_engine::RecipeVersionEngine;
use recipe_backend::repository::catalog_repo::SqliteCatalogRepository;
use recipe_backend::repository::recipe_repo::SqliteRecipeRepository;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

struct MockConfigReader;

#[async_trait::async_trait]
impl StagingConfigReader for MockConfigReader {
    async fn get_staging_retention_days(&self) -> Result<i64, Box<dyn Error>> {
        Ok(7)
    }

    async fn get_staging_sample_rows(&self) -> Result<usize, Box<dyn Error>> {
        Ok(5)
    }

    async fn get_default_currency(&self) -> Result<String, Box<dyn Error>> {
        Ok("CLP".to_string())
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn setup() -> (NamedTempFile, ValuationEngine, RecipeVersionEngine) {
    let (temp_file, conn) = test_helpers::create_test_db().expect("创建测试数据库失败");
    seed_catalog(&conn);

    let catalog = Arc::new(SqliteCatalogRepository::new(conn.clone()));
    let recipes = Arc::new(SqliteRecipeRepository::new(conn.clone()));

    let valuation = ValuationEngine::new(
        catalog.clone(),
        recipes.clone(),
        Arc::new(MockConfigReader),
    );
    let versions = RecipeVersionEngine::new(catalog, recipes);
    (temp_file, valuation, versions)
}

fn seed_catalog(conn: &Arc<Mutex<Connection>>) {
    test_helpers::seed_product(conn, "pt-301002", "301002", "PT", Some(9000.0), None)
        .expect("写入成品失败");
    // 801007: 净价 4500，末次成本 4000
    test_helpers::seed_product(conn, "mp-801007", "801007", "MP", Some(4500.0), Some(4000.0))
        .expect("写入原料失败");
    // 801009: 无净价，末次成本 100
    test_helpers::seed_product(conn, "mp-801009", "801009", "MP", None, Some(100.0))
        .expect("写入原料失败");
    // 801010: 全无价格
    test_helpers::seed_product(conn, "mp-801010", "801010", "MP", None, None)
        .expect("写入原料失败");
    // 801011: 净价 100，目录含税价 200，末次成本 50
    test_helpers::seed_product_priced(
        conn, "mp-801011", "801011", "MP", Some(100.0), Some(200.0), Some(50.0),
    )
    .expect("写入原料失败");
    test_helpers::seed_process(conn, "proc-p01", "P01", Some(500.0)).expect("写入工序失败");
}

async fn create_recipe(
    versions: &RecipeVersionEngine,
    components: Vec<ComponentInput>,
    process: Option<ProcessInput>,
) {
    let input = CreateRecipeInput {
        product_sku: "301002".to_string(),
        current_version: None,
        version: VersionInput {
            number: 1,
            state: VersionState::Current,
            publish_date: Some("2025-01-15".to_string()),
            publisher: Some("ops".to_string()),
            base_qty: 10.0,
            unit_pt: Some("un".to_string()),
            process,
            components,
            mark_current: true,
        },
    };
    versions.create_recipe(&input).await.expect("创建配方失败");
}

fn component(sku: &str, qty: f64, waste: Option<f64>) -> ComponentInput {
    ComponentInput {
        component_sku: sku.to_string(),
        qty_per_base: qty,
        unit: Some("kg".to_string()),
        waste_pct: waste,
    }
}

// ==========================================
// 成本口径
// ==========================================

#[tokio::test]
async fn test_net_price_valuation() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801007", 10.0, None)], None).await;

    let result = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");

    assert_eq!(result.version, 1);
    assert_eq!(result.currency, "CLP");
    assert_eq!(result.breakdown.len(), 1);
    assert_eq!(result.breakdown[0].unit_cost, 4500.0);
    assert_eq!(result.breakdown[0].qty_eff, 10.0);
    assert_eq!(result.breakdown[0].subtotal, 45000.0);
    assert_eq!(result.total, 45000.0);
    assert_eq!(result.process_cost, 0.0);
}

#[tokio::test]
async fn test_gross_price_prefers_catalog_gross() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801011", 10.0, None)], None).await;

    let result = valuation
        .value_version("301002", Some(1), CostMethod::GrossPrice, None, false)
        .await
        .expect("核算失败");

    // 目录含税价 200 直接使用，不由净价推算
    assert_eq!(result.breakdown[0].unit_cost, 200.0);
    assert_eq!(result.total, 2000.0);
}

#[tokio::test]
async fn test_gross_price_derives_when_missing() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801007", 10.0, None)], None).await;

    let result = valuation
        .value_version("301002", Some(1), CostMethod::GrossPrice, None, false)
        .await
        .expect("核算失败");

    // 801007 无含税价: 由净价推算 4500 × 1.19 = 5355
    assert_eq!(result.breakdown[0].unit_cost, 5355.0);
    assert_eq!(result.total, 53550.0);
}

#[tokio::test]
async fn test_last_cost_with_net_fallback() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(
        &versions,
        vec![
            component("801007", 1.0, None),  // last_cost 4000
            component("801009", 2.0, None),  // 无净价 → 净价口径回退 last_cost
        ],
        None,
    )
    .await;

    let result = valuation
        .value_version("301002", None, CostMethod::LastCost, None, false)
        .await
        .expect("核算失败");
    assert_eq!(result.breakdown[0].unit_cost, 4000.0);
    assert_eq!(result.breakdown[1].unit_cost, 100.0);
    assert_eq!(result.total, 4000.0 + 200.0);

    let net = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");
    assert_eq!(net.breakdown[1].unit_cost, 100.0); // 净价缺失回退末次成本
}

// ==========================================
// 损耗与舍入
// ==========================================

#[tokio::test]
async fn test_waste_pct_scales_effective_qty() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801007", 10.0, Some(5.0))], None).await;

    let result = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");

    // qty_eff = round6(10 × 1.05) = 10.5
    assert_eq!(result.breakdown[0].qty_eff, 10.5);
    assert_eq!(result.breakdown[0].subtotal, 47250.0);
    assert_eq!(result.total, 47250.0);
}

// ==========================================
// 工序成本口径
// ==========================================

#[tokio::test]
async fn test_special_process_cost_included() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(
        &versions,
        vec![component("801007", 10.0, None)],
        Some(ProcessInput {
            special_process_name: Some("手工分装".to_string()),
            special_process_cost: Some(1000.0),
            ..Default::default()
        }),
    )
    .await;

    let result = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");

    assert_eq!(result.process_cost, 1000.0);
    assert_eq!(result.total, 46000.0);
}

#[tokio::test]
async fn test_catalog_process_cost_excluded() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(
        &versions,
        vec![component("801007", 10.0, None)],
        Some(ProcessInput {
            process_code: Some("P01".to_string()), // 目录工序 cost=500
            ..Default::default()
        }),
    )
    .await;

    let result = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");

    // 目录工序成本不计入总额，但给出警告
    assert_eq!(result.process_cost, 0.0);
    assert_eq!(result.total, 45000.0);
    assert!(result.warnings.iter().any(|w| w.contains("工序")));
}

// ==========================================
// 降级与持久化
// ==========================================

#[tokio::test]
async fn test_zero_cost_warning() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801010", 3.0, None)], None).await;

    let result = valuation
        .value_version("301002", None, CostMethod::NetPrice, None, false)
        .await
        .expect("核算失败");

    assert_eq!(result.total, 0.0);
    assert!(result.warnings.iter().any(|w| w.contains("801010")));
}

#[tokio::test]
async fn test_persist_writes_version_cost() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801007", 10.0, None)], None).await;

    // 未持久化前 cost 为空
    let recipe = versions.get_recipe("301002").await.expect("查询配方失败");
    assert_eq!(recipe.find_version(1).unwrap().cost, None);

    valuation
        .value_version("301002", None, CostMethod::NetPrice, None, true)
        .await
        .expect("核算失败");

    let recipe = versions.get_recipe("301002").await.expect("查询配方失败");
    assert_eq!(recipe.find_version(1).unwrap().cost, Some(45000.0));
}

#[tokio::test]
async fn test_currency_label_override() {
    let (_tmp, valuation, versions) = setup();
    create_recipe(&versions, vec![component("801007", 1.0, None)], None).await;

    let result = valuation
        .value_version(
            "301002",
            None,
            CostMethod::NetPrice,
            Some("USD".to_string()),
            false,
        )
        .await
        .expect("核算失败");
    assert_eq!(result.currency, "USD");
}

#[tokio::test]
async fn test_missing_version_and_no_current() {
    let (_tmp, valuation, versions) = setup();

    // 配方不存在
    assert!(matches!(
        valuation
            .value_version("301002", None, CostMethod::NetPrice, None, false)
            .await
            .unwrap_err(),
        EngineError::NotFound(_)
    ));

    create_recipe(&versions, vec![component("801007", 1.0, None)], None).await;
    versions.disable_current("301002").await.expect("停用失败");

    // 无当前版本且未指定版本号 → Validation
    assert!(matches!(
        valuation
            .value_version("301002", None, CostMethod::NetPrice, None, false)
            .await
            .unwrap_err(),
        EngineError::Validation(_)
    ));

    // 指定不存在的版本 → NotFound
    assert!(matches!(
        valuation
            .value_version("301002", Some(9), CostMethod::NetPrice, None, false)
            .await
            .unwrap_err(),
        EngineError::NotFound(_)
    ));
}
