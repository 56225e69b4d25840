// ==========================================
// 配方版本与成本核算系统 - 配方领域模型
// ==========================================
// 红线: 版本号在配方内唯一; current_version 若有值必须指向存在的版本
// 红线: 同一版本内同一材料只出现一次（数量合并，不重复存储）
// ==========================================

use crate::domain::types::VersionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Component - 版本内组件（原料行）
// ==========================================
// 对齐: recipe_component 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub product_id: String,   // 原料产品标识（目录引用）
    pub qty_per_base: f64,    // 每基准批量的用量（≥0）
    pub unit: Option<String>, // 计量单位（重复材料合并时保留首见单位）
    pub waste_pct: f64,       // 损耗百分比（0–100，默认0）
}

// ==========================================
// VersionProcess - 版本工序引用
// ==========================================
// 不变量: 目录工序引用与内联特殊工序互斥（XOR），用枚举在类型层面排除双设
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VersionProcess {
    /// 目录工序（process 表引用）
    Catalog { process_id: String },
    /// 内联特殊工序（名称+成本，不走目录）
    Special {
        name: Option<String>,
        cost: Option<f64>,
    },
}

// ==========================================
// RecipeVersion - 配方版本
// ==========================================
// 对齐: recipe_version 表 + recipe_component 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeVersion {
    pub version: i64,                     // 版本号（正整数，配方内唯一）
    pub state: VersionState,              // 生命周期状态
    pub publish_date: DateTime<Utc>,      // 发布日期
    pub publisher: Option<String>,        // 发布人
    pub base_qty: f64,                    // 基准批量（>0）
    pub unit_pt: Option<String>,          // 基准批量单位
    pub process: Option<VersionProcess>,  // 工序（目录 XOR 内联）
    pub components: Vec<Component>,       // 组件列表（已合并去重）
    pub cost: Option<f64>,                // 持久化的核算总成本（valuation persist 写入）
}

impl RecipeVersion {
    /// 内联特殊工序成本（目录工序成本不计入核算总额）
    pub fn special_process_cost(&self) -> Option<f64> {
        match &self.process {
            Some(VersionProcess::Special { cost, .. }) => *cost,
            _ => None,
        }
    }
}

// ==========================================
// Recipe - 配方文档（每个成品一条）
// ==========================================
// 生命周期: 首次提交版本时创建，之后只变更版本，不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub recipe_id: String,             // 配方唯一标识
    pub product_id: String,            // 成品产品标识（唯一约束）
    pub current_version: Option<i64>,  // 当前版本号（最多一个）
    pub versions: Vec<RecipeVersion>,  // 版本列表（按写入顺序）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// 按版本号查找版本
    pub fn find_version(&self, version: i64) -> Option<&RecipeVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn has_version(&self, version: i64) -> bool {
        self.find_version(version).is_some()
    }
}

// ==========================================
// 输入载荷（引擎入口，字段已类型化）
// ==========================================

/// 组件输入（按 SKU 引用，待目录解析）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInput {
    pub component_sku: String,
    pub qty_per_base: f64,
    pub unit: Option<String>,
    #[serde(default)]
    pub waste_pct: Option<f64>,
}

/// 工序输入（编码引用目录工序，或内联特殊工序）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessInput {
    pub process_code: Option<String>,
    pub special_process_name: Option<String>,
    pub special_process_cost: Option<f64>,
}

/// 版本输入（create_recipe / add_version 共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInput {
    pub number: i64,
    pub state: VersionState,
    /// 发布日期（支持 ISO 日期/时间、dd-mm-YYYY、dd/mm/YYYY、YYYY/mm/dd；缺省为今日）
    pub publish_date: Option<String>,
    pub publisher: Option<String>,
    pub base_qty: f64,
    pub unit_pt: Option<String>,
    pub process: Option<ProcessInput>,
    pub components: Vec<ComponentInput>,
    /// 是否将该版本设为配方当前版本
    #[serde(default)]
    pub mark_current: bool,
}

/// 创建配方输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipeInput {
    pub product_sku: String,
    /// 显式指定 current_version（缺省时按首版本 state+mark_current 推导）
    pub current_version: Option<i64>,
    pub version: VersionInput,
}

/// 版本部分更新（仅提供的字段被修改）
///
/// process 语义: None=不修改, Some(None)=清除工序, Some(Some(p))=设置工序
#[derive(Debug, Clone, Default)]
pub struct VersionUpdate {
    pub state: Option<VersionState>,
    pub publish_date: Option<String>,
    pub publisher: Option<String>,
    pub base_qty: Option<f64>,
    pub unit_pt: Option<String>,
    pub process: Option<Option<ProcessInput>>,
    /// 若提供则整体替换组件列表（解析+合并后），不与现有列表合并
    pub components: Option<Vec<ComponentInput>>,
}

/// 仓储层版本字段集（已解析为存储类型）
///
/// process 语义与 VersionUpdate 相同，但已解析为 VersionProcess。
#[derive(Debug, Clone, Default)]
pub struct VersionFieldSet {
    pub state: Option<VersionState>,
    pub publish_date: Option<DateTime<Utc>>,
    pub publisher: Option<String>,
    pub base_qty: Option<f64>,
    pub unit_pt: Option<String>,
    pub process: Option<Option<VersionProcess>>,
    pub components: Option<Vec<Component>>,
}
