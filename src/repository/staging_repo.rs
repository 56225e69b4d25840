// ==========================================
// 配方版本与成本核算系统 - 导入暂存仓储
// ==========================================
// 职责: staging_recipe_row 表的批量插入/批次查询/清理
// 约定: 暂存行全部弱类型存储，解析在引擎层完成
// ==========================================

use crate::domain::staging::{StagedRow, StagedRowInput};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// StagingRepository - 暂存行存取接口
// ==========================================
#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// 批量插入暂存行（单事务）
    async fn insert_rows(&self, rows: &[StagedRow]) -> RepositoryResult<usize>;

    /// 读取批次全部行（按插入顺序）
    async fn rows_for_batch(&self, batch_id: &str) -> RepositoryResult<Vec<StagedRow>>;

    /// 批次行数
    async fn count_batch(&self, batch_id: &str) -> RepositoryResult<usize>;

    /// 批次样本行（前 limit 行，状态预览用）
    async fn sample_batch(&self, batch_id: &str, limit: usize) -> RepositoryResult<Vec<StagedRow>>;

    /// 删除整个批次，返回删除行数
    async fn delete_batch(&self, batch_id: &str) -> RepositoryResult<usize>;

    /// 清理早于 cutoff 的暂存行（保留窗口到期）
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize>;
}

// ==========================================
// SqliteStagingRepository - SQLite 实现
// ==========================================
pub struct SqliteStagingRepository {
    conn: Arc<Mutex<Connection>>,
}

const STAGING_COLUMNS: &str = "row_id, batch_id, product_sku, version, state, mark_current, \
     base_qty, unit_pt, component_sku, qty_per_base, unit_mp, waste_pct, \
     process_code, special_process_name, special_process_cost, publish_date, \
     publisher, notes, created_at";

impl SqliteStagingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<StagedRow> {
        Ok(StagedRow {
            row_id: row.get("row_id")?,
            batch_id: row.get("batch_id")?,
            fields: StagedRowInput {
                product_sku: row.get("product_sku")?,
                version: row.get("version")?,
                state: row.get("state")?,
                mark_current: row.get("mark_current")?,
                base_qty: row.get("base_qty")?,
                unit_pt: row.get("unit_pt")?,
                component_sku: row.get("component_sku")?,
                qty_per_base: row.get("qty_per_base")?,
                unit_mp: row.get("unit_mp")?,
                waste_pct: row.get("waste_pct")?,
                process_code: row.get("process_code")?,
                special_process_name: row.get("special_process_name")?,
                special_process_cost: row.get("special_process_cost")?,
                publish_date: row.get("publish_date")?,
                publisher: row.get("publisher")?,
                notes: row.get("notes")?,
            },
            created_at: row.get("created_at")?,
        })
    }

    fn query_rows(
        conn: &Connection,
        batch_id: &str,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<StagedRow>> {
        let sql = match limit {
            Some(n) => format!(
                "SELECT {} FROM staging_recipe_row WHERE batch_id = ?1 ORDER BY rowid LIMIT {}",
                STAGING_COLUMNS, n
            ),
            None => format!(
                "SELECT {} FROM staging_recipe_row WHERE batch_id = ?1 ORDER BY rowid",
                STAGING_COLUMNS
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<StagedRow>, _>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl StagingRepository for SqliteStagingRepository {
    async fn insert_rows(&self, rows: &[StagedRow]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO staging_recipe_row (
                    row_id, batch_id, product_sku, version, state, mark_current,
                    base_qty, unit_pt, component_sku, qty_per_base, unit_mp, waste_pct,
                    process_code, special_process_name, special_process_cost,
                    publish_date, publisher, notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"#,
            )?;

            for row in rows {
                let f = &row.fields;
                stmt.execute(params![
                    row.row_id,
                    row.batch_id,
                    f.product_sku,
                    f.version,
                    f.state,
                    f.mark_current,
                    f.base_qty,
                    f.unit_pt,
                    f.component_sku,
                    f.qty_per_base,
                    f.unit_mp,
                    f.waste_pct,
                    f.process_code,
                    f.special_process_name,
                    f.special_process_cost,
                    f.publish_date,
                    f.publisher,
                    f.notes,
                    row.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    async fn rows_for_batch(&self, batch_id: &str) -> RepositoryResult<Vec<StagedRow>> {
        let conn = self.get_conn()?;
        Self::query_rows(&conn, batch_id, None)
    }

    async fn count_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM staging_recipe_row WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn sample_batch(&self, batch_id: &str, limit: usize) -> RepositoryResult<Vec<StagedRow>> {
        let conn = self.get_conn()?;
        Self::query_rows(&conn, batch_id, Some(limit))
    }

    async fn delete_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM staging_recipe_row WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(deleted)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM staging_recipe_row WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}
