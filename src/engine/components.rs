// ==========================================
// 配方版本与成本核算系统 - 组件解析与合并
// ==========================================
// 职责: SKU → product_id 目录解析 + 重复材料合并
// 不变量: 同一版本内同一材料只保留一行（数量累加，单位/损耗取首见值）
// ==========================================

use crate::domain::recipe::{Component, ComponentInput};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::CatalogRepository;
use std::collections::HashMap;

/// 解析合并结果
pub struct ResolvedComponents {
    pub components: Vec<Component>,
    pub warnings: Vec<String>,
}

/// 校验单行组件输入（数量/损耗范围）
fn validate_input(input: &ComponentInput) -> EngineResult<()> {
    if input.component_sku.trim().is_empty() {
        return Err(EngineError::Validation("组件 SKU 不能为空".to_string()));
    }
    if !(input.qty_per_base >= 0.0) || !input.qty_per_base.is_finite() {
        return Err(EngineError::Validation(format!(
            "组件 {} 用量非法: {}",
            input.component_sku, input.qty_per_base
        )));
    }
    if let Some(waste) = input.waste_pct {
        if !waste.is_finite() || !(0.0..=100.0).contains(&waste) {
            return Err(EngineError::Validation(format!(
                "组件 {} 损耗百分比超出 0–100: {}",
                input.component_sku, waste
            )));
        }
    }
    Ok(())
}

/// 解析组件输入列表并按材料合并
///
/// 每个 SKU 必须能在目录解析，否则整体报 NotFound（直连 API 路径严格校验）。
/// 同一材料重复出现时数量累加、单位/损耗保留首见值，单位不一致时产出警告。
pub async fn resolve_and_aggregate(
    catalog: &dyn CatalogRepository,
    inputs: &[ComponentInput],
) -> EngineResult<ResolvedComponents> {
    let mut components: Vec<Component> = Vec::new();
    let mut index_by_product: HashMap<String, usize> = HashMap::new();
    let mut warnings: Vec<String> = Vec::new();

    for input in inputs {
        validate_input(input)?;

        let sku = input.component_sku.trim();
        let product = catalog
            .find_product_by_sku(sku)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("组件产品不存在: {}", sku)))?;

        match index_by_product.get(&product.product_id) {
            Some(&idx) => {
                // 重复材料: 数量累加，其余字段保留首见值
                let existing = &mut components[idx];
                existing.qty_per_base += input.qty_per_base;
                if existing.unit.is_some()
                    && input.unit.is_some()
                    && existing.unit != input.unit
                {
                    warnings.push(format!(
                        "组件 {} 重复行单位不一致（{} vs {}），保留首见单位",
                        sku,
                        existing.unit.as_deref().unwrap_or(""),
                        input.unit.as_deref().unwrap_or("")
                    ));
                }
            }
            None => {
                index_by_product.insert(product.product_id.clone(), components.len());
                components.push(Component {
                    product_id: product.product_id,
                    qty_per_base: input.qty_per_base,
                    unit: input.unit.clone(),
                    waste_pct: input.waste_pct.unwrap_or(0.0),
                });
            }
        }
    }

    Ok(ResolvedComponents {
        components,
        warnings,
    })
}
