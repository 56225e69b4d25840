// ==========================================
// 配方版本与成本核算系统 - 配方版本引擎
// ==========================================
// 职责: 配方创建、版本追加、当前版本切换、停用、部分更新
// 红线: 每个配方同一时刻最多一个当前版本
// 红线: 版本号配方内唯一，重复追加报冲突
// ==========================================

use crate::domain::recipe::{
    CreateRecipeInput, ProcessInput, Recipe, RecipeVersion, VersionFieldSet, VersionInput,
    VersionProcess, VersionUpdate,
};
use crate::domain::types::VersionState;
use crate::engine::common::normalize_publish_date;
use crate::engine::components::resolve_and_aggregate;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::recipe_repo::RecipeRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RecipeVersionEngine - 配方版本引擎
// ==========================================
pub struct RecipeVersionEngine {
    catalog: Arc<dyn CatalogRepository>,
    recipes: Arc<dyn RecipeRepository>,
}

impl RecipeVersionEngine {
    pub fn new(catalog: Arc<dyn CatalogRepository>, recipes: Arc<dyn RecipeRepository>) -> Self {
        Self { catalog, recipes }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按成品 SKU 读取配方
    pub async fn get_recipe(&self, product_sku: &str) -> EngineResult<Recipe> {
        let product = self
            .catalog
            .find_finished_by_sku(product_sku)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("成品不存在: {}", product_sku)))?;

        self.recipes
            .find_by_product_id(&product.product_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("配方不存在: {}", product_sku)))
    }

    /// 按产品引用（product_id 或 SKU，先按 id 再按 SKU）读取配方
    pub async fn get_recipe_by_product_ref(&self, product_ref: &str) -> EngineResult<Recipe> {
        let product = match self.catalog.find_product_by_id(product_ref).await? {
            Some(p) => Some(p),
            None => self.catalog.find_product_by_sku(product_ref).await?,
        }
        .ok_or_else(|| EngineError::NotFound(format!("产品不存在: {}", product_ref)))?;

        self.recipes
            .find_by_product_id(&product.product_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("配方不存在: {}", product_ref)))
    }

    // ==========================================
    // 创建与追加
    // ==========================================

    /// 创建配方（含首版本）
    ///
    /// current_version 推导: 显式指定优先；否则当首版本为当前态且 mark_current 时取首版本号
    #[instrument(skip(self, input), fields(product_sku = %input.product_sku))]
    pub async fn create_recipe(&self, input: &CreateRecipeInput) -> EngineResult<Recipe> {
        let product = self
            .catalog
            .find_finished_by_sku(&input.product_sku)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("成品不存在: {}", input.product_sku)))?;

        if self
            .recipes
            .find_by_product_id(&product.product_id)
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!(
                "配方已存在: {}",
                input.product_sku
            )));
        }

        let version = self.build_version(&input.version).await?;

        let current_version = input.current_version.or_else(|| {
            if version.state == VersionState::Current && input.version.mark_current {
                Some(version.version)
            } else {
                None
            }
        });

        let now = Utc::now();
        let recipe = Recipe {
            recipe_id: Uuid::new_v4().to_string(),
            product_id: product.product_id.clone(),
            current_version,
            versions: vec![version],
            created_at: now,
            updated_at: now,
        };

        self.recipes.insert(&recipe).await?;
        info!(
            product_sku = %input.product_sku,
            version = input.version.number,
            "配方已创建"
        );

        self.reload(&product.product_id).await
    }

    /// 追加新版本
    ///
    /// mark_current 仅移动指针，不改动前一当前版本的状态（状态切换走 set_current）
    #[instrument(skip(self, input), fields(product_sku = %product_sku, version = input.number))]
    pub async fn add_version(
        &self,
        product_sku: &str,
        input: &VersionInput,
    ) -> EngineResult<Recipe> {
        let product = self
            .catalog
            .find_finished_by_sku(product_sku)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("成品不存在: {}", product_sku)))?;

        let recipe = self
            .recipes
            .find_by_product_id(&product.product_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("配方不存在: {}", product_sku)))?;

        if recipe.has_version(input.number) {
            return Err(EngineError::Conflict(format!(
                "版本已存在: {} v{}",
                product_sku, input.number
            )));
        }

        let version = self.build_version(input).await?;
        self.recipes
            .push_version(&recipe.recipe_id, &version, input.mark_current)
            .await?;
        info!(product_sku = %product_sku, version = input.number, "版本已追加");

        self.reload(&product.product_id).await
    }

    // ==========================================
    // 当前版本切换
    // ==========================================

    /// 将指定版本设为当前版本
    ///
    /// 目标版本置当前态；原当前版本（若不同）置停用态；指针移动
    #[instrument(skip(self))]
    pub async fn set_current(&self, product_sku: &str, version: i64) -> EngineResult<Recipe> {
        let recipe = self.get_recipe(product_sku).await?;

        if !recipe.has_version(version) {
            return Err(EngineError::NotFound(format!(
                "版本不存在: {} v{}",
                product_sku, version
            )));
        }

        self.recipes
            .set_version_state(&recipe.recipe_id, version, VersionState::Current)
            .await?;

        if let Some(prev) = recipe.current_version {
            if prev != version && recipe.has_version(prev) {
                self.recipes
                    .set_version_state(&recipe.recipe_id, prev, VersionState::Obsolete)
                    .await?;
            }
        }

        self.recipes
            .set_current_pointer(&recipe.recipe_id, version)
            .await?;
        info!(product_sku = %product_sku, version = version, "当前版本已切换");

        self.reload(&recipe.product_id).await
    }

    /// 停用当前版本（无当前版本时为幂等空操作）
    #[instrument(skip(self))]
    pub async fn disable_current(&self, product_sku: &str) -> EngineResult<Recipe> {
        let recipe = self.get_recipe(product_sku).await?;

        if let Some(current) = recipe.current_version {
            if recipe.has_version(current) {
                self.recipes
                    .set_version_state(&recipe.recipe_id, current, VersionState::Obsolete)
                    .await?;
            }
            self.recipes
                .clear_current_pointer(&recipe.recipe_id)
                .await?;
            info!(product_sku = %product_sku, version = current, "当前版本已停用");
        }

        self.reload(&recipe.product_id).await
    }

    /// 停用指定版本（若恰为当前版本则同时清除指针）
    #[instrument(skip(self))]
    pub async fn disable_version(&self, product_sku: &str, version: i64) -> EngineResult<Recipe> {
        let recipe = self.get_recipe(product_sku).await?;

        if !recipe.has_version(version) {
            return Err(EngineError::Validation(format!(
                "版本不存在: {} v{}",
                product_sku, version
            )));
        }

        self.recipes
            .set_version_state(&recipe.recipe_id, version, VersionState::Obsolete)
            .await?;
        if recipe.current_version == Some(version) {
            self.recipes
                .clear_current_pointer(&recipe.recipe_id)
                .await?;
        }
        info!(product_sku = %product_sku, version = version, "版本已停用");

        self.reload(&recipe.product_id).await
    }

    // ==========================================
    // 部分更新
    // ==========================================

    /// 版本部分字段更新（仅提供的字段被修改；components 为整体替换）
    #[instrument(skip(self, update))]
    pub async fn update_version(
        &self,
        product_sku: &str,
        version: i64,
        update: &VersionUpdate,
    ) -> EngineResult<Recipe> {
        let recipe = self.get_recipe(product_sku).await?;

        if !recipe.has_version(version) {
            return Err(EngineError::NotFound(format!(
                "版本不存在: {} v{}",
                product_sku, version
            )));
        }

        let mut fields = VersionFieldSet {
            state: update.state,
            publisher: update.publisher.clone(),
            unit_pt: update.unit_pt.clone(),
            ..Default::default()
        };

        if let Some(raw) = &update.publish_date {
            fields.publish_date = Some(normalize_publish_date(Some(raw.as_str()))?);
        }
        if let Some(base_qty) = update.base_qty {
            if !base_qty.is_finite() || base_qty <= 0.0 {
                return Err(EngineError::Validation(format!(
                    "基准批量必须为正数: {}",
                    base_qty
                )));
            }
            fields.base_qty = Some(base_qty);
        }
        if let Some(process_input) = &update.process {
            // 更新路径严格校验: 工序编码必须能解析
            fields.process = Some(match process_input {
                Some(p) => self.resolve_process_strict(p).await?,
                None => None,
            });
        }
        if let Some(inputs) = &update.components {
            let resolved = resolve_and_aggregate(self.catalog.as_ref(), inputs).await?;
            for warning in &resolved.warnings {
                warn!(product_sku = %product_sku, version = version, "{}", warning);
            }
            fields.components = Some(resolved.components);
        }

        self.recipes
            .update_version_fields(&recipe.recipe_id, version, &fields)
            .await?;
        info!(product_sku = %product_sku, version = version, "版本已更新");

        self.reload(&recipe.product_id).await
    }

    /// 整体替换版本组件列表
    #[instrument(skip(self, inputs))]
    pub async fn replace_components(
        &self,
        product_sku: &str,
        version: i64,
        inputs: &[crate::domain::recipe::ComponentInput],
    ) -> EngineResult<Recipe> {
        let recipe = self.get_recipe(product_sku).await?;

        if !recipe.has_version(version) {
            return Err(EngineError::NotFound(format!(
                "版本不存在: {} v{}",
                product_sku, version
            )));
        }

        let resolved = resolve_and_aggregate(self.catalog.as_ref(), inputs).await?;
        for warning in &resolved.warnings {
            warn!(product_sku = %product_sku, version = version, "{}", warning);
        }

        self.recipes
            .replace_version_components(&recipe.recipe_id, version, &resolved.components)
            .await?;
        info!(
            product_sku = %product_sku,
            version = version,
            components = resolved.components.len(),
            "版本组件已替换"
        );

        self.reload(&recipe.product_id).await
    }

    // ==========================================
    // 内部构造
    // ==========================================

    /// 从输入构造版本实体（组件解析、日期归一、工序解析）
    async fn build_version(&self, input: &VersionInput) -> EngineResult<RecipeVersion> {
        if input.number < 1 {
            return Err(EngineError::Validation(format!(
                "版本号必须为正整数: {}",
                input.number
            )));
        }
        if !input.base_qty.is_finite() || input.base_qty <= 0.0 {
            return Err(EngineError::Validation(format!(
                "基准批量必须为正数: {}",
                input.base_qty
            )));
        }

        let publish_date = normalize_publish_date(input.publish_date.as_deref())?;

        let resolved = resolve_and_aggregate(self.catalog.as_ref(), &input.components).await?;
        for warning in &resolved.warnings {
            warn!(version = input.number, "{}", warning);
        }

        let process = match &input.process {
            Some(p) => self.resolve_process_lenient(p).await?,
            None => None,
        };

        Ok(RecipeVersion {
            version: input.number,
            state: input.state,
            publish_date,
            publisher: input.publisher.clone(),
            base_qty: input.base_qty,
            unit_pt: input.unit_pt.clone(),
            process,
            components: resolved.components,
            cost: None,
        })
    }

    /// 宽松工序解析（创建/追加路径）: 编码解析失败时丢弃工序并记警告
    async fn resolve_process_lenient(
        &self,
        input: &ProcessInput,
    ) -> EngineResult<Option<VersionProcess>> {
        if let Some(code) = input.process_code.as_deref().map(str::trim) {
            if !code.is_empty() {
                match self.catalog.find_process_by_code(code).await? {
                    Some(process) => {
                        return Ok(Some(VersionProcess::Catalog {
                            process_id: process.process_id,
                        }))
                    }
                    None => {
                        warn!(process_code = %code, "工序编码无法解析，版本不挂工序");
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Self::special_from_input(input))
    }

    /// 严格工序解析（更新路径）: 编码解析失败报 Validation 错误
    async fn resolve_process_strict(
        &self,
        input: &ProcessInput,
    ) -> EngineResult<Option<VersionProcess>> {
        if let Some(code) = input.process_code.as_deref().map(str::trim) {
            if !code.is_empty() {
                let process = self
                    .catalog
                    .find_process_by_code(code)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Validation(format!("工序编码无法解析: {}", code))
                    })?;
                return Ok(Some(VersionProcess::Catalog {
                    process_id: process.process_id,
                }));
            }
        }
        Ok(Self::special_from_input(input))
    }

    fn special_from_input(input: &ProcessInput) -> Option<VersionProcess> {
        let name = input
            .special_process_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let cost = input.special_process_cost.filter(|c| c.is_finite());

        if name.is_some() || cost.is_some() {
            Some(VersionProcess::Special { name, cost })
        } else {
            None
        }
    }

    async fn reload(&self, product_id: &str) -> EngineResult<Recipe> {
        self.recipes
            .find_by_product_id(product_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("配方不存在: {}", product_id)))
    }
}
