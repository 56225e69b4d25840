// ==========================================
// 配方版本与成本核算系统 - 导入暂存领域模型
// ==========================================
// 用途: CSV 导入管道中间产物（上传 → 暂存 → 促升/清理）
// 生命周期: 仅在导入流程内; 超过保留窗口自动清理
// 红线: 16 个暂存列名是与导入模板的线上契约，不得改名
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// StagedRowInput - 上传的一行原始数据
// ==========================================
// 列集与导入模板一一对应，全部为弱类型字符串，促升时才解析
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagedRowInput {
    pub product_sku: Option<String>,
    pub version: Option<String>,
    pub state: Option<String>,
    pub mark_current: Option<String>,
    pub base_qty: Option<String>,
    pub unit_pt: Option<String>,
    pub component_sku: Option<String>,
    pub qty_per_base: Option<String>,
    pub unit_mp: Option<String>,
    pub waste_pct: Option<String>,
    pub process_code: Option<String>,
    pub special_process_name: Option<String>,
    pub special_process_cost: Option<String>,
    pub publish_date: Option<String>,
    pub publisher: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// StagedRow - 已入库的暂存行
// ==========================================
// 对齐: staging_recipe_row 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedRow {
    pub row_id: String,
    pub batch_id: String,
    #[serde(flatten)]
    pub fields: StagedRowInput,
    pub created_at: DateTime<Utc>,
}

impl StagedRow {
    /// 从上传行构造暂存行（生成 row_id，打上批次标签）
    pub fn from_input(input: StagedRowInput, batch_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            row_id: Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            fields: input,
            created_at: now,
        }
    }
}

// ==========================================
// StageResult - 暂存结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub batch_id: String,
    pub inserted: usize,
    pub warnings: Vec<String>,
}

// ==========================================
// BatchStatus - 批次状态（总数 + 样本行）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub total: usize,
    pub first_rows: Vec<StagedRow>,
}

// ==========================================
// PromoteSummary - 促升汇总计数器
// ==========================================
// 线上契约: 计数器字段名沿用既有导入工具的西语命名（serde rename）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromoteSummary {
    #[serde(rename = "gruposProcesados")]
    pub groups_processed: usize,
    #[serde(rename = "recetasCreadas")]
    pub recipes_created: usize,
    #[serde(rename = "recetasActualizadas")]
    pub recipes_updated: usize,
    #[serde(rename = "versionesAgregadas")]
    pub versions_added: usize,
    #[serde(rename = "versionesRechazadas")]
    pub versions_rejected: usize,
    #[serde(rename = "vigentesSeteadas")]
    pub currents_set: usize,
    pub warnings: Vec<String>,
    #[serde(rename = "errores")]
    pub errors: Vec<String>,
}
