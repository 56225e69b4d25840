// ==========================================
// 配方版本与成本核算系统 - 成本核算引擎
// ==========================================
// 职责: 按成本口径对配方版本计价，输出逐组件明细
// 口径: 净价(缺失回退末次成本) / 含税价(缺失由净价×1.19推算) / 末次成本(缺失回退净价)
// 红线: 回落只在字段缺失时发生；存储为 0 的价格按 0 计价（触发零成本警告）
// 红线: 目录工序成本不计入总额（仅内联特殊工序成本参与合计）
// ==========================================

use crate::config::staging_config_trait::StagingConfigReader;
use crate::domain::catalog::Product;
use crate::domain::recipe::VersionProcess;
use crate::domain::types::CostMethod;
use crate::domain::valuation::{ValuationLine, ValuationResult};
use crate::engine::common::round6;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::recipe_repo::RecipeRepository;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 含税口径的税率系数（IVA 19%）
const GROSS_FACTOR: f64 = 1.19;

// ==========================================
// ValuationEngine - 成本核算引擎
// ==========================================
pub struct ValuationEngine {
    catalog: Arc<dyn CatalogRepository>,
    recipes: Arc<dyn RecipeRepository>,
    config: Arc<dyn StagingConfigReader>,
}

impl ValuationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        recipes: Arc<dyn RecipeRepository>,
        config: Arc<dyn StagingConfigReader>,
    ) -> Self {
        Self {
            catalog,
            recipes,
            config,
        }
    }

    /// 核算指定版本（version 缺省取当前版本）
    ///
    /// persist 为真时将合计写回版本的 cost 字段；组件引用解析失败降级为零成本行
    #[instrument(skip(self), fields(product_sku = %product_sku))]
    pub async fn value_version(
        &self,
        product_sku: &str,
        version: Option<i64>,
        cost_method: CostMethod,
        currency: Option<String>,
        persist: bool,
    ) -> EngineResult<ValuationResult> {
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

        let version_no = match version.or(recipe.current_version) {
            Some(v) => v,
            None => {
                return Err(EngineError::Validation(format!(
                    "配方无当前版本且未指定版本号: {}",
                    product_sku
                )))
            }
        };

        let target = recipe.find_version(version_no).ok_or_else(|| {
            EngineError::NotFound(format!("版本不存在: {} v{}", product_sku, version_no))
        })?;

        let currency = match currency.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            Some(c) => c,
            None => self
                .config
                .get_default_currency()
                .await
                .unwrap_or_else(|_| "CLP".to_string()),
        };

        // 批量目录查询后按 product_id 建索引
        let ids: Vec<String> = target
            .components
            .iter()
            .map(|c| c.product_id.clone())
            .collect();
        let products = self.catalog.find_products_by_ids(&ids).await?;
        let by_id: HashMap<&str, &Product> =
            products.iter().map(|p| (p.product_id.as_str(), p)).collect();

        let mut warnings = Vec::new();
        let mut breakdown = Vec::with_capacity(target.components.len());
        let mut material_total = 0.0;

        for component in &target.components {
            match by_id.get(component.product_id.as_str()) {
                Some(product) => {
                    let unit_cost = unit_cost_for(product, cost_method);
                    if unit_cost == 0.0 {
                        warnings.push(format!("组件 {} 成本为 0", product.sku));
                    }
                    let qty_eff =
                        round6(component.qty_per_base * (1.0 + component.waste_pct / 100.0));
                    let subtotal = round6(qty_eff * unit_cost);
                    material_total += subtotal;

                    breakdown.push(ValuationLine {
                        sku: product.sku.clone(),
                        product_id: product.product_id.clone(),
                        description: product.name.clone().unwrap_or_default(),
                        unit: component
                            .unit
                            .clone()
                            .or_else(|| product.unit.clone())
                            .unwrap_or_default(),
                        unit_cost,
                        qty_eff,
                        subtotal,
                    });
                }
                None => {
                    // 引用悬空: 降级为零成本行，不中断核算
                    warnings.push(format!("组件产品不存在: {}", component.product_id));
                    breakdown.push(ValuationLine {
                        sku: String::new(),
                        product_id: component.product_id.clone(),
                        description: String::new(),
                        unit: component.unit.clone().unwrap_or_default(),
                        unit_cost: 0.0,
                        qty_eff: 0.0,
                        subtotal: 0.0,
                    });
                }
            }
        }

        let process_cost = match &target.process {
            Some(VersionProcess::Special { cost, .. }) => cost.unwrap_or(0.0),
            Some(VersionProcess::Catalog { process_id }) => {
                warn!(process_id = %process_id, "目录工序成本不计入核算总额");
                warnings.push(format!("目录工序成本未计入总额: {}", process_id));
                0.0
            }
            None => 0.0,
        };

        let total = round6(material_total + process_cost);

        if persist {
            self.recipes
                .set_version_cost(&recipe.recipe_id, version_no, total)
                .await?;
        }

        info!(
            product_sku = %product_sku,
            version = version_no,
            cost_method = %cost_method,
            total = total,
            persisted = persist,
            "版本核算完成"
        );

        Ok(ValuationResult {
            product_sku: product.sku,
            version: version_no,
            cost_method,
            currency,
            breakdown,
            process_cost,
            total,
            valued_at: Utc::now(),
            warnings,
        })
    }
}

/// 单位成本取值（字段缺失时的回落链）
///
/// - 净价: net_price，缺失回退 last_cost
/// - 含税价: gross_price，缺失时由净价推算 round6(net × 1.19)（net>0），再回退 last_cost
/// - 末次成本: last_cost，缺失回退 net_price
///
/// 回落只针对缺失字段；存储为 0 的价格原样参与计价。
fn unit_cost_for(product: &Product, method: CostMethod) -> f64 {
    match method {
        CostMethod::NetPrice => product.net_price.or(product.last_cost).unwrap_or(0.0),
        CostMethod::GrossPrice => match (product.gross_price, product.net_price) {
            (Some(gross), _) => gross,
            (None, Some(net)) if net > 0.0 => round6(net * GROSS_FACTOR),
            _ => product.last_cost.unwrap_or(0.0),
        },
        CostMethod::LastCost => product.last_cost.or(product.net_price).unwrap_or(0.0),
    }
}
