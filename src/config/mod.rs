// ==========================================
// 配方版本与成本核算系统 - 配置层
// ==========================================

pub mod config_manager;
pub mod staging_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use staging_config_trait::StagingConfigReader;
