// ==========================================
// 配方版本与成本核算系统 - 领域类型定义
// ==========================================
// 红线: 一个配方最多只有一个 current 版本
// 序列化格式: snake_case (与导入模板/数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 版本生命周期状态 (Version State)
// ==========================================
// 状态机: draft → current → obsolete（draft 可直接 disable 为 obsolete）
// 一旦离开 draft 不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionState {
    Draft,    // 草稿: 已创建，尚未投产，可编辑
    Current,  // 当前: 生产/核算使用中（每个配方最多一个）
    Obsolete, // 废弃: 历史版本，不再用于生产
}

impl VersionState {
    /// 数据库存储字符串
    pub fn to_db_str(self) -> &'static str {
        match self {
            VersionState::Draft => "draft",
            VersionState::Current => "current",
            VersionState::Obsolete => "obsolete",
        }
    }

    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(VersionState::Draft),
            "current" => Some(VersionState::Current),
            "obsolete" => Some(VersionState::Obsolete),
            _ => None,
        }
    }

    /// 宽松解析（导入模板用）
    ///
    /// 兼容旧版西语模板值 borrador/vigente/obsoleta；空值/未知值回落为 Draft。
    pub fn parse_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "draft" | "borrador" => VersionState::Draft,
            "current" | "vigente" => VersionState::Current,
            "obsolete" | "obsoleta" => VersionState::Obsolete,
            _ => VersionState::Draft,
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 产品分类 (Product Kind)
// ==========================================
// 数据库存储沿用目录库的 PT（成品）/ MP（原料）编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    Finished, // 成品 (PT)
    Raw,      // 原料 (MP)
}

impl ProductKind {
    pub fn to_db_str(self) -> &'static str {
        match self {
            ProductKind::Finished => "PT",
            ProductKind::Raw => "MP",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PT" => Some(ProductKind::Finished),
            "MP" => Some(ProductKind::Raw),
            _ => None,
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 成本取价方法 (Cost Method)
// ==========================================
// 回落链:
// - net_price 缺失 → last_cost
// - gross_price 缺失 → net_price × 1.19（net>0 时）→ last_cost
// - last_cost 缺失 → net_price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMethod {
    NetPrice,
    GrossPrice,
    LastCost,
}

impl CostMethod {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim() {
            "net_price" => Some(CostMethod::NetPrice),
            "gross_price" => Some(CostMethod::GrossPrice),
            "last_cost" => Some(CostMethod::LastCost),
            _ => None,
        }
    }
}

impl fmt::Display for CostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostMethod::NetPrice => write!(f, "net_price"),
            CostMethod::GrossPrice => write!(f, "gross_price"),
            CostMethod::LastCost => write!(f, "last_cost"),
        }
    }
}
