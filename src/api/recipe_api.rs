// ==========================================
// 配方版本与成本核算系统 - 对外门面
// ==========================================
// 职责: 组装仓储/引擎，暴露全部对外操作（查询/版本生命周期/导入/核算）
// 说明: 所有引擎共享同一 SQLite 连接（Arc<Mutex<Connection>>）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::recipe::{ComponentInput, CreateRecipeInput, Recipe, VersionInput, VersionUpdate};
use crate::domain::staging::{BatchStatus, PromoteSummary, StageResult, StagedRowInput};
use crate::domain::types::CostMethod;
use crate::domain::valuation::ValuationResult;
use crate::engine::promotion::BatchPromotionEngine;
use crate::engine::valuation::ValuationEngine;
use crate::engine::version_engine::RecipeVersionEngine;
use crate::importer::csv_reader::RecipeCsvReader;
use crate::repository::catalog_repo::SqliteCatalogRepository;
use crate::repository::recipe_repo::SqliteRecipeRepository;
use crate::repository::staging_repo::SqliteStagingRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

// ==========================================
// RecipeApi - 对外门面
// ==========================================
pub struct RecipeApi {
    version_engine: RecipeVersionEngine,
    promotion_engine: BatchPromotionEngine,
    valuation_engine: ValuationEngine,
}

impl RecipeApi {
    /// 从共享连接组装全部引擎
    pub fn new(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let catalog = Arc::new(SqliteCatalogRepository::new(conn.clone()));
        let recipes = Arc::new(SqliteRecipeRepository::new(conn.clone()));
        let staging = Arc::new(SqliteStagingRepository::new(conn.clone()));
        let config = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        );

        Ok(Self {
            version_engine: RecipeVersionEngine::new(catalog.clone(), recipes.clone()),
            promotion_engine: BatchPromotionEngine::new(
                catalog.clone(),
                recipes.clone(),
                staging,
                config.clone(),
            ),
            valuation_engine: ValuationEngine::new(catalog, recipes, config),
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn get_recipe(&self, product_sku: &str) -> ApiResult<Recipe> {
        Ok(self.version_engine.get_recipe(product_sku).await?)
    }

    /// 按产品引用（product_id 或 SKU）读取配方
    pub async fn get_recipe_by_product_ref(&self, product_ref: &str) -> ApiResult<Recipe> {
        Ok(self
            .version_engine
            .get_recipe_by_product_ref(product_ref)
            .await?)
    }

    // ==========================================
    // 版本生命周期
    // ==========================================

    pub async fn create_recipe(&self, input: &CreateRecipeInput) -> ApiResult<Recipe> {
        Ok(self.version_engine.create_recipe(input).await?)
    }

    pub async fn add_version(&self, product_sku: &str, input: &VersionInput) -> ApiResult<Recipe> {
        Ok(self.version_engine.add_version(product_sku, input).await?)
    }

    pub async fn set_current(&self, product_sku: &str, version: i64) -> ApiResult<Recipe> {
        Ok(self.version_engine.set_current(product_sku, version).await?)
    }

    pub async fn disable_current(&self, product_sku: &str) -> ApiResult<Recipe> {
        Ok(self.version_engine.disable_current(product_sku).await?)
    }

    pub async fn disable_version(&self, product_sku: &str, version: i64) -> ApiResult<Recipe> {
        Ok(self
            .version_engine
            .disable_version(product_sku, version)
            .await?)
    }

    pub async fn update_version(
        &self,
        product_sku: &str,
        version: i64,
        update: &VersionUpdate,
    ) -> ApiResult<Recipe> {
        Ok(self
            .version_engine
            .update_version(product_sku, version, update)
            .await?)
    }

    pub async fn replace_components(
        &self,
        product_sku: &str,
        version: i64,
        components: &[ComponentInput],
    ) -> ApiResult<Recipe> {
        Ok(self
            .version_engine
            .replace_components(product_sku, version, components)
            .await?)
    }

    // ==========================================
    // 批量导入
    // ==========================================

    /// 解析导入模板 CSV 文件并写入暂存区
    pub async fn stage_csv_file(&self, path: &str) -> ApiResult<StageResult> {
        let rows = RecipeCsvReader::read_staged_rows(path)?;
        Ok(self.promotion_engine.stage_rows(rows).await?)
    }

    /// 解析上传的 CSV 内容并写入暂存区
    pub async fn stage_csv_content(&self, content: &str) -> ApiResult<StageResult> {
        let rows = RecipeCsvReader::read_staged_rows_from_str(content)?;
        Ok(self.promotion_engine.stage_rows(rows).await?)
    }

    /// 直接写入已结构化的暂存行（集成方绕过 CSV 时用）
    pub async fn stage_rows(&self, rows: Vec<StagedRowInput>) -> ApiResult<StageResult> {
        Ok(self.promotion_engine.stage_rows(rows).await?)
    }

    pub async fn batch_status(&self, batch_id: &str) -> ApiResult<BatchStatus> {
        Ok(self.promotion_engine.batch_status(batch_id).await?)
    }

    pub async fn promote_batch(
        &self,
        batch_id: &str,
        overwrite_version: bool,
        dry_run: bool,
    ) -> ApiResult<PromoteSummary> {
        Ok(self
            .promotion_engine
            .promote(batch_id, overwrite_version, dry_run)
            .await?)
    }

    pub async fn clear_batch(&self, batch_id: &str) -> ApiResult<usize> {
        Ok(self.promotion_engine.clear_batch(batch_id).await?)
    }

    pub async fn purge_expired_staging(&self) -> ApiResult<usize> {
        Ok(self.promotion_engine.purge_expired().await?)
    }

    /// 导入模板 CSV（表头 + 示例行）
    pub fn import_template(&self) -> String {
        RecipeCsvReader::template_csv()
    }

    // ==========================================
    // 成本核算
    // ==========================================

    pub async fn value_version(
        &self,
        product_sku: &str,
        version: Option<i64>,
        cost_method: CostMethod,
        currency: Option<String>,
        persist: bool,
    ) -> ApiResult<ValuationResult> {
        Ok(self
            .valuation_engine
            .value_version(product_sku, version, cost_method, currency, persist)
            .await?)
    }
}
