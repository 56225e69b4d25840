// ==========================================
// 配方版本与成本核算系统 - 核算领域模型
// ==========================================
// 用途: 核算引擎输出（派生报表，默认不持久化）
// 约定: 金额/数量统一 6 位小数舍入; currency 仅为标签，不做汇率换算
// ==========================================

use crate::domain::types::CostMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ValuationLine - 单组件成本明细
// ==========================================
// 约定: 引用无法解析时输出零成本/零数量行（降级不中断），字段恒为字符串
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationLine {
    pub sku: String,
    pub product_id: String,
    pub description: String,
    pub unit: String,
    pub unit_cost: f64,
    pub qty_eff: f64,   // 有效数量 = round6(qty_per_base × (1 + waste_pct/100))
    pub subtotal: f64,  // round6(qty_eff × unit_cost)
}

// ==========================================
// ValuationResult - 核算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    pub product_sku: String,
    pub version: i64,
    pub cost_method: CostMethod,
    pub currency: String,
    pub breakdown: Vec<ValuationLine>,
    pub process_cost: f64,
    pub total: f64,  // round6(Σ subtotal + process_cost)
    pub valued_at: DateTime<Utc>,
    pub warnings: Vec<String>,
}
