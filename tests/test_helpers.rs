// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、目录种子数据等功能
// ==========================================

use recipe_backend::db;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - Arc<Mutex<Connection>>: 共享连接
#[allow(dead_code)]
pub fn create_test_db() -> Result<(NamedTempFile, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, Arc::new(Mutex::new(conn))))
}

/// 写入产品目录种子数据
#[allow(dead_code)]
pub fn seed_product(
    conn: &Arc<Mutex<Connection>>,
    product_id: &str,
    sku: &str,
    kind: &str,
    net_price: Option<f64>,
    last_cost: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let conn = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
    conn.execute(
        r#"INSERT INTO product (product_id, sku, name, kind, unit, net_price, gross_price, last_cost)
           VALUES (?1, ?2, ?3, ?4, 'kg', ?5, NULL, ?6)"#,
        params![product_id, sku, format!("产品 {}", sku), kind, net_price, last_cost],
    )?;
    Ok(())
}

/// 写入带完整价格字段（净价/含税价/末次成本）的产品种子数据
#[allow(dead_code)]
pub fn seed_product_priced(
    conn: &Arc<Mutex<Connection>>,
    product_id: &str,
    sku: &str,
    kind: &str,
    net_price: Option<f64>,
    gross_price: Option<f64>,
    last_cost: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let conn = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
    conn.execute(
        r#"INSERT INTO product (product_id, sku, name, kind, unit, net_price, gross_price, last_cost)
           VALUES (?1, ?2, ?3, ?4, 'kg', ?5, ?6, ?7)"#,
        params![
            product_id,
            sku,
            format!("产品 {}", sku),
            kind,
            net_price,
            gross_price,
            last_cost
        ],
    )?;
    Ok(())
}

/// 写入工序目录种子数据
#[allow(dead_code)]
pub fn seed_process(
    conn: &Arc<Mutex<Connection>>,
    process_id: &str,
    code: &str,
    cost: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let conn = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
    conn.execute(
        "INSERT INTO process (process_id, code, name, cost) VALUES (?1, ?2, ?3, ?4)",
        params![process_id, code, format!("工序 {}", code), cost],
    )?;
    Ok(())
}
