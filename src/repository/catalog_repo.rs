// ==========================================
// 配方版本与成本核算系统 - 目录仓储
// ==========================================
// 职责: 产品/工序目录的只读查询（核心不写目录数据）
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

use crate::domain::catalog::{Process, Product};
use crate::domain::types::ProductKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 目录查询接口
// ==========================================
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// 按 SKU 查产品（不限分类）
    async fn find_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>>;

    /// 按 SKU 查成品（kind=PT）
    async fn find_finished_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>>;

    /// 按 product_id 查产品
    async fn find_product_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>>;

    /// 批量按 product_id 查产品（核算引擎用）
    async fn find_products_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Product>>;

    /// 按编码查工序
    async fn find_process_by_code(&self, code: &str) -> RepositoryResult<Option<Process>>;
}

// ==========================================
// SqliteCatalogRepository - SQLite 实现
// ==========================================
pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_product(row: &Row<'_>) -> rusqlite::Result<Product> {
        let kind_str: String = row.get("kind")?;
        Ok(Product {
            product_id: row.get("product_id")?,
            sku: row.get("sku")?,
            name: row.get("name")?,
            // 未知分类按原料处理（目录数据质量问题不应使查询失败）
            kind: ProductKind::from_db_str(&kind_str).unwrap_or(ProductKind::Raw),
            unit: row.get("unit")?,
            net_price: row.get("net_price")?,
            gross_price: row.get("gross_price")?,
            last_cost: row.get("last_cost")?,
        })
    }

    fn query_product(&self, sql: &str, param: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        match conn.query_row(sql, params![param], |row| Self::map_product(row)) {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "product_id, sku, name, kind, unit, net_price, gross_price, last_cost";

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>> {
        self.query_product(
            &format!("SELECT {} FROM product WHERE sku = ?1", PRODUCT_COLUMNS),
            sku,
        )
    }

    async fn find_finished_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>> {
        self.query_product(
            &format!(
                "SELECT {} FROM product WHERE sku = ?1 AND kind = 'PT'",
                PRODUCT_COLUMNS
            ),
            sku,
        )
    }

    async fn find_product_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        self.query_product(
            &format!(
                "SELECT {} FROM product WHERE product_id = ?1",
                PRODUCT_COLUMNS
            ),
            product_id,
        )
    }

    async fn find_products_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM product WHERE product_id IN ({})",
            PRODUCT_COLUMNS, placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                Self::map_product(row)
            })?
            .collect::<Result<Vec<Product>, _>>()?;

        Ok(products)
    }

    async fn find_process_by_code(&self, code: &str) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            "SELECT process_id, code, name, cost FROM process WHERE code = ?1",
            params![code],
            |row| {
                Ok(Process {
                    process_id: row.get("process_id")?,
                    code: row.get("code")?,
                    name: row.get("name")?,
                    cost: row.get("cost")?,
                })
            },
        ) {
            Ok(process) => Ok(Some(process)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
