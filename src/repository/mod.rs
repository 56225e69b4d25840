// ==========================================
// 配方版本与成本核算系统 - 仓储层
// ==========================================
// 职责: SQLite 数据访问，不含业务逻辑
// 模式: trait 定义接口，Sqlite* 为具体实现（便于引擎层替换/测试）
// ==========================================

pub mod catalog_repo;
pub mod error;
pub mod recipe_repo;
pub mod staging_repo;

pub use catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use recipe_repo::{RecipeRepository, SqliteRecipeRepository};
pub use staging_repo::{SqliteStagingRepository, StagingRepository};
