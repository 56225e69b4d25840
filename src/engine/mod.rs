// ==========================================
// 配方版本与成本核算系统 - 引擎层
// ==========================================
// 职责: 业务流程编排（版本生命周期 / 批量促升 / 成本核算）
// 模式: 引擎持有仓储 trait 对象，数据访问全部下沉仓储层
// ==========================================

pub mod common;
pub mod components;
pub mod error;
pub mod promotion;
pub mod valuation;
pub mod version_engine;

pub use error::{EngineError, EngineResult};
pub use promotion::BatchPromotionEngine;
pub use valuation::ValuationEngine;
pub use version_engine::RecipeVersionEngine;
