// ==========================================
// 配方版本与成本核算系统 - 目录领域模型
// ==========================================
// 红线: 目录数据对核心只读（由外部产品/工序库维护）
// 用途: 组件 SKU 解析、成本取价、工序解析
// ==========================================

use crate::domain::types::ProductKind;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 产品目录记录
// ==========================================
// 对齐: product 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,          // 产品唯一标识
    pub sku: String,                 // SKU（唯一）
    pub name: Option<String>,        // 名称
    pub kind: ProductKind,           // 分类: 成品(PT)/原料(MP)
    pub unit: Option<String>,        // 计量单位
    pub net_price: Option<f64>,      // 净价
    pub gross_price: Option<f64>,    // 含税价
    pub last_cost: Option<f64>,      // 最近一次成本
}

// ==========================================
// Process - 工序目录记录
// ==========================================
// 对齐: process 表
// 说明: 版本也可以不引用目录工序，而是内联"特殊工序"名称+成本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub process_id: String,    // 工序唯一标识
    pub code: String,          // 工序编码（唯一）
    pub name: Option<String>,  // 名称
    pub cost: Option<f64>,     // 固定成本
}
