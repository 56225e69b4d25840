// ==========================================
// 配方版本与成本核算系统 - 可执行入口
// ==========================================
// 职责: 初始化日志与数据库、清理过期暂存行
// 对外操作经由 RecipeApi（库形态集成到上层服务）
// ==========================================

use recipe_backend::api::RecipeApi;
use recipe_backend::{db, logging};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    logging::init();

    info!(
        version = recipe_backend::VERSION,
        "{} 启动",
        recipe_backend::APP_NAME
    );

    let db_path = db::get_default_db_path();
    info!(db_path = %db_path, "数据库路径");

    let conn = match db::open_sqlite_connection(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            error!("数据库连接失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::init_schema(&conn) {
        error!("schema 初始化失败: {}", e);
        std::process::exit(1);
    }

    match db::read_schema_version(&conn) {
        Ok(Some(v)) if v == db::CURRENT_SCHEMA_VERSION => {
            info!(schema_version = v, "schema 版本校验通过");
        }
        Ok(v) => {
            warn!(
                found = ?v,
                expected = db::CURRENT_SCHEMA_VERSION,
                "schema 版本与代码期望不一致"
            );
        }
        Err(e) => {
            warn!("schema 版本读取失败: {}", e);
        }
    }

    let api = match RecipeApi::new(Arc::new(Mutex::new(conn))) {
        Ok(api) => api,
        Err(e) => {
            error!("引擎组装失败: {}", e);
            std::process::exit(1);
        }
    };

    // 启动即清理一次过期暂存行
    match api.purge_expired_staging().await {
        Ok(purged) => info!(purged = purged, "过期暂存行清理完成"),
        Err(e) => warn!("过期暂存行清理失败: {}", e),
    }

    info!("初始化完成");
}
