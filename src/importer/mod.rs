// ==========================================
// 配方版本与成本核算系统 - 导入层
// ==========================================
// 职责: 导入模板文件解析（文件 → 暂存行输入）
// ==========================================

pub mod csv_reader;
pub mod error;

pub use csv_reader::{RecipeCsvReader, TEMPLATE_HEADERS};
pub use error::{ImportError, ImportResult};
