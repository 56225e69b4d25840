// ==========================================
// 配方版本与成本核算系统 - 库入口
// ==========================================
// 分层:
// - domain: 领域实体与类型
// - repository: SQLite 数据访问
// - engine: 业务流程（版本生命周期 / 批量促升 / 成本核算）
// - importer: 导入模板 CSV 解析
// - api: 对外门面
// ==========================================

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod importer;
pub mod logging;
pub mod repository;

pub use api::{ApiError, RecipeApi};
pub use engine::{EngineError, EngineResult};

/// 应用版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用名称
pub const APP_NAME: &str = "recipe-backend";
