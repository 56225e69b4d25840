// ==========================================
// 配方版本与成本核算系统 - 领域层
// ==========================================
// 职责: 实体与类型定义，不含数据访问与业务流程
// ==========================================

pub mod catalog;
pub mod recipe;
pub mod staging;
pub mod types;
pub mod valuation;

// 重导出核心实体
pub use catalog::{Process, Product};
pub use recipe::{
    Component, ComponentInput, CreateRecipeInput, ProcessInput, Recipe, RecipeVersion,
    VersionFieldSet, VersionInput, VersionProcess, VersionUpdate,
};
pub use staging::{BatchStatus, PromoteSummary, StageResult, StagedRow, StagedRowInput};
pub use types::{CostMethod, ProductKind, VersionState};
pub use valuation::{ValuationLine, ValuationResult};
