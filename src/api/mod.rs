// ==========================================
// 配方版本与成本核算系统 - API 层
// ==========================================

pub mod error;
pub mod recipe_api;

pub use error::{ApiError, ApiResult};
pub use recipe_api::RecipeApi;
