// ==========================================
// 配方版本与成本核算系统 - 配方仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 每次写入 = 对单个配方的一次原子事务（版本+组件同事务落库）
// 说明: 配方"文档"= recipe 行 + recipe_version 行 + recipe_component 行，
//       读出时组装为 Recipe 领域对象
// ==========================================

use crate::domain::recipe::{Component, Recipe, RecipeVersion, VersionFieldSet, VersionProcess};
use crate::domain::types::VersionState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// RecipeRepository - 配方存取接口
// ==========================================
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// 插入整个配方文档（配方 + 首版本 + 组件，单事务）
    async fn insert(&self, recipe: &Recipe) -> RepositoryResult<()>;

    /// 按成品 product_id 读取整个配方文档
    async fn find_by_product_id(&self, product_id: &str) -> RepositoryResult<Option<Recipe>>;

    /// 追加新版本（可选地同时移动 current_version 指针）
    async fn push_version(
        &self,
        recipe_id: &str,
        version: &RecipeVersion,
        mark_current: bool,
    ) -> RepositoryResult<()>;

    /// 原位替换已存在的版本（版本号不变，组件整体替换）
    async fn replace_version(
        &self,
        recipe_id: &str,
        version: &RecipeVersion,
    ) -> RepositoryResult<()>;

    /// 设置 current_version 指针
    async fn set_current_pointer(&self, recipe_id: &str, version: i64) -> RepositoryResult<()>;

    /// 清除 current_version 指针（unset，非置零）
    async fn clear_current_pointer(&self, recipe_id: &str) -> RepositoryResult<()>;

    /// 更新单个版本的生命周期状态
    async fn set_version_state(
        &self,
        recipe_id: &str,
        version: i64,
        state: VersionState,
    ) -> RepositoryResult<()>;

    /// 部分字段更新（仅 fields 中提供的字段被修改）
    async fn update_version_fields(
        &self,
        recipe_id: &str,
        version: i64,
        fields: &VersionFieldSet,
    ) -> RepositoryResult<()>;

    /// 整体替换版本组件列表
    async fn replace_version_components(
        &self,
        recipe_id: &str,
        version: i64,
        components: &[Component],
    ) -> RepositoryResult<()>;

    /// 写入核算总成本（valuation persist）
    async fn set_version_cost(
        &self,
        recipe_id: &str,
        version: i64,
        cost: f64,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SqliteRecipeRepository - SQLite 实现
// ==========================================
pub struct SqliteRecipeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecipeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 工序枚举 → 存储三列
    fn process_columns(
        process: &Option<VersionProcess>,
    ) -> (Option<String>, Option<String>, Option<f64>) {
        match process {
            Some(VersionProcess::Catalog { process_id }) => {
                (Some(process_id.clone()), None, None)
            }
            Some(VersionProcess::Special { name, cost }) => (None, name.clone(), *cost),
            None => (None, None, None),
        }
    }

    /// 存储三列 → 工序枚举
    fn process_from_columns(
        process_id: Option<String>,
        special_name: Option<String>,
        special_cost: Option<f64>,
    ) -> Option<VersionProcess> {
        if let Some(process_id) = process_id {
            Some(VersionProcess::Catalog { process_id })
        } else if special_name.is_some() || special_cost.is_some() {
            Some(VersionProcess::Special {
                name: special_name,
                cost: special_cost,
            })
        } else {
            None
        }
    }

    /// 事务内插入版本行 + 组件行
    fn insert_version_tx(
        tx: &Transaction<'_>,
        recipe_id: &str,
        version: &RecipeVersion,
    ) -> RepositoryResult<()> {
        let (process_id, special_name, special_cost) = Self::process_columns(&version.process);

        tx.execute(
            r#"INSERT INTO recipe_version (
                recipe_id, version, state, publish_date, publisher,
                base_qty, unit_pt, process_id, special_process_name,
                special_process_cost, cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                recipe_id,
                version.version,
                version.state.to_db_str(),
                version.publish_date,
                version.publisher,
                version.base_qty,
                version.unit_pt,
                process_id,
                special_name,
                special_cost,
                version.cost,
            ],
        )?;

        Self::insert_components_tx(tx, recipe_id, version.version, &version.components)?;
        Ok(())
    }

    fn insert_components_tx(
        tx: &Transaction<'_>,
        recipe_id: &str,
        version: i64,
        components: &[Component],
    ) -> RepositoryResult<()> {
        for (seq_no, component) in components.iter().enumerate() {
            tx.execute(
                r#"INSERT INTO recipe_component (
                    recipe_id, version, product_id, qty_per_base, unit, waste_pct, seq_no
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    recipe_id,
                    version,
                    component.product_id,
                    component.qty_per_base,
                    component.unit,
                    component.waste_pct,
                    seq_no as i64,
                ],
            )?;
        }
        Ok(())
    }

    /// 每次写入同步刷新 updated_at（审计字段）
    fn touch_tx(tx: &Transaction<'_>, recipe_id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE recipe SET updated_at = ?1 WHERE recipe_id = ?2",
            params![now, recipe_id],
        )?;
        Ok(())
    }

    /// 读取配方的版本列表（按写入顺序），并挂载各自组件
    fn load_versions(conn: &Connection, recipe_id: &str) -> RepositoryResult<Vec<RecipeVersion>> {
        let mut stmt = conn.prepare(
            r#"SELECT version, state, publish_date, publisher, base_qty, unit_pt,
                      process_id, special_process_name, special_process_cost, cost
               FROM recipe_version
               WHERE recipe_id = ?1
               ORDER BY rowid"#,
        )?;

        let mut versions = stmt
            .query_map(params![recipe_id], |row| {
                let state_str: String = row.get("state")?;
                Ok(RecipeVersion {
                    version: row.get("version")?,
                    state: VersionState::from_db_str(&state_str)
                        .unwrap_or(VersionState::Draft),
                    publish_date: row.get("publish_date")?,
                    publisher: row.get("publisher")?,
                    base_qty: row.get("base_qty")?,
                    unit_pt: row.get("unit_pt")?,
                    process: Self::process_from_columns(
                        row.get("process_id")?,
                        row.get("special_process_name")?,
                        row.get("special_process_cost")?,
                    ),
                    components: Vec::new(),
                    cost: row.get("cost")?,
                })
            })?
            .collect::<Result<Vec<RecipeVersion>, _>>()?;

        for version in &mut versions {
            version.components = Self::load_components(conn, recipe_id, version.version)?;
        }

        Ok(versions)
    }

    fn load_components(
        conn: &Connection,
        recipe_id: &str,
        version: i64,
    ) -> RepositoryResult<Vec<Component>> {
        let mut stmt = conn.prepare(
            r#"SELECT product_id, qty_per_base, unit, waste_pct
               FROM recipe_component
               WHERE recipe_id = ?1 AND version = ?2
               ORDER BY seq_no"#,
        )?;

        let components = stmt
            .query_map(params![recipe_id, version], |row| {
                Ok(Component {
                    product_id: row.get("product_id")?,
                    qty_per_base: row.get("qty_per_base")?,
                    unit: row.get("unit")?,
                    waste_pct: row.get("waste_pct")?,
                })
            })?
            .collect::<Result<Vec<Component>, _>>()?;

        Ok(components)
    }

    /// 版本行必须存在，否则报 NotFound（供 update 路径前置检查）
    fn ensure_version_exists(
        conn: &Connection,
        recipe_id: &str,
        version: i64,
    ) -> RepositoryResult<()> {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM recipe_version WHERE recipe_id = ?1 AND version = ?2",
                params![recipe_id, version],
                |_row| Ok(true),
            )
            .unwrap_or(false);

        if exists {
            Ok(())
        } else {
            Err(RepositoryError::NotFound {
                entity: "RecipeVersion".to_string(),
                id: format!("{}#v{}", recipe_id, version),
            })
        }
    }
}

#[async_trait]
impl RecipeRepository for SqliteRecipeRepository {
    async fn insert(&self, recipe: &Recipe) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO recipe (recipe_id, product_id, current_version, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                recipe.recipe_id,
                recipe.product_id,
                recipe.current_version,
                recipe.created_at,
                recipe.updated_at,
            ],
        )?;

        for version in &recipe.versions {
            Self::insert_version_tx(&tx, &recipe.recipe_id, version)?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn find_by_product_id(&self, product_id: &str) -> RepositoryResult<Option<Recipe>> {
        let conn = self.get_conn()?;

        let head = match conn.query_row(
            r#"SELECT recipe_id, product_id, current_version, created_at, updated_at
               FROM recipe WHERE product_id = ?1"#,
            params![product_id],
            |row| {
                Ok(Recipe {
                    recipe_id: row.get("recipe_id")?,
                    product_id: row.get("product_id")?,
                    current_version: row.get("current_version")?,
                    versions: Vec::new(),
                    created_at: row.get("created_at")?,
                    updated_at: row.get("updated_at")?,
                })
            },
        ) {
            Ok(recipe) => recipe,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut recipe = head;
        recipe.versions = Self::load_versions(&conn, &recipe.recipe_id)?;
        Ok(Some(recipe))
    }

    async fn push_version(
        &self,
        recipe_id: &str,
        version: &RecipeVersion,
        mark_current: bool,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::insert_version_tx(&tx, recipe_id, version)?;
        if mark_current {
            tx.execute(
                "UPDATE recipe SET current_version = ?1 WHERE recipe_id = ?2",
                params![version.version, recipe_id],
            )?;
        }
        Self::touch_tx(&tx, recipe_id, Utc::now())?;

        tx.commit()?;
        Ok(())
    }

    async fn replace_version(
        &self,
        recipe_id: &str,
        version: &RecipeVersion,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let (process_id, special_name, special_cost) = Self::process_columns(&version.process);

        let affected = tx.execute(
            r#"UPDATE recipe_version
               SET state = ?1, publish_date = ?2, publisher = ?3, base_qty = ?4,
                   unit_pt = ?5, process_id = ?6, special_process_name = ?7,
                   special_process_cost = ?8, cost = ?9
               WHERE recipe_id = ?10 AND version = ?11"#,
            params![
                version.state.to_db_str(),
                version.publish_date,
                version.publisher,
                version.base_qty,
                version.unit_pt,
                process_id,
                special_name,
                special_cost,
                version.cost,
                recipe_id,
                version.version,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RecipeVersion".to_string(),
                id: format!("{}#v{}", recipe_id, version.version),
            });
        }

        tx.execute(
            "DELETE FROM recipe_component WHERE recipe_id = ?1 AND version = ?2",
            params![recipe_id, version.version],
        )?;
        Self::insert_components_tx(&tx, recipe_id, version.version, &version.components)?;
        Self::touch_tx(&tx, recipe_id, Utc::now())?;

        tx.commit()?;
        Ok(())
    }

    async fn set_current_pointer(&self, recipe_id: &str, version: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE recipe SET current_version = ?1, updated_at = ?2 WHERE recipe_id = ?3",
            params![version, Utc::now(), recipe_id],
        )?;
        Ok(())
    }

    async fn clear_current_pointer(&self, recipe_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE recipe SET current_version = NULL, updated_at = ?1 WHERE recipe_id = ?2",
            params![Utc::now(), recipe_id],
        )?;
        Ok(())
    }

    async fn set_version_state(
        &self,
        recipe_id: &str,
        version: i64,
        state: VersionState,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            "UPDATE recipe_version SET state = ?1 WHERE recipe_id = ?2 AND version = ?3",
            params![state.to_db_str(), recipe_id, version],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RecipeVersion".to_string(),
                id: format!("{}#v{}", recipe_id, version),
            });
        }
        Self::touch_tx(&tx, recipe_id, Utc::now())?;

        tx.commit()?;
        Ok(())
    }

    async fn update_version_fields(
        &self,
        recipe_id: &str,
        version: i64,
        fields: &VersionFieldSet,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::ensure_version_exists(&tx, recipe_id, version)?;

        if let Some(state) = fields.state {
            tx.execute(
                "UPDATE recipe_version SET state = ?1 WHERE recipe_id = ?2 AND version = ?3",
                params![state.to_db_str(), recipe_id, version],
            )?;
        }
        if let Some(publish_date) = fields.publish_date {
            tx.execute(
                "UPDATE recipe_version SET publish_date = ?1 WHERE recipe_id = ?2 AND version = ?3",
                params![publish_date, recipe_id, version],
            )?;
        }
        if let Some(publisher) = &fields.publisher {
            tx.execute(
                "UPDATE recipe_version SET publisher = ?1 WHERE recipe_id = ?2 AND version = ?3",
                params![publisher, recipe_id, version],
            )?;
        }
        if let Some(base_qty) = fields.base_qty {
            tx.execute(
                "UPDATE recipe_version SET base_qty = ?1 WHERE recipe_id = ?2 AND version = ?3",
                params![base_qty, recipe_id, version],
            )?;
        }
        if let Some(unit_pt) = &fields.unit_pt {
            tx.execute(
                "UPDATE recipe_version SET unit_pt = ?1 WHERE recipe_id = ?2 AND version = ?3",
                params![unit_pt, recipe_id, version],
            )?;
        }
        if let Some(process) = &fields.process {
            // 设目录工序会清除内联字段，反之亦然（三列整体重写）
            let (process_id, special_name, special_cost) = Self::process_columns(process);
            tx.execute(
                r#"UPDATE recipe_version
                   SET process_id = ?1, special_process_name = ?2, special_process_cost = ?3
                   WHERE recipe_id = ?4 AND version = ?5"#,
                params![process_id, special_name, special_cost, recipe_id, version],
            )?;
        }
        if let Some(components) = &fields.components {
            tx.execute(
                "DELETE FROM recipe_component WHERE recipe_id = ?1 AND version = ?2",
                params![recipe_id, version],
            )?;
            Self::insert_components_tx(&tx, recipe_id, version, components)?;
        }

        Self::touch_tx(&tx, recipe_id, Utc::now())?;
        tx.commit()?;
        Ok(())
    }

    async fn replace_version_components(
        &self,
        recipe_id: &str,
        version: i64,
        components: &[Component],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::ensure_version_exists(&tx, recipe_id, version)?;

        tx.execute(
            "DELETE FROM recipe_component WHERE recipe_id = ?1 AND version = ?2",
            params![recipe_id, version],
        )?;
        Self::insert_components_tx(&tx, recipe_id, version, components)?;
        Self::touch_tx(&tx, recipe_id, Utc::now())?;

        tx.commit()?;
        Ok(())
    }

    async fn set_version_cost(
        &self,
        recipe_id: &str,
        version: i64,
        cost: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            "UPDATE recipe_version SET cost = ?1 WHERE recipe_id = ?2 AND version = ?3",
            params![cost, recipe_id, version],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RecipeVersion".to_string(),
                id: format!("{}#v{}", recipe_id, version),
            });
        }
        Self::touch_tx(&tx, recipe_id, Utc::now())?;

        tx.commit()?;
        Ok(())
    }
}
