// ==========================================
// 配方版本与成本核算系统 - 批量促升引擎
// ==========================================
// 职责: CSV 暂存行入库、批次状态、分组促升、批次清理
// 红线: 促升按 (成品SKU, 版本号) 分组，组间隔离——单组失败不中断整批
// 红线: dry_run 只统计不落库，计数器口径与真实促升一致
// ==========================================

use crate::config::staging_config_trait::StagingConfigReader;
use crate::domain::recipe::{Component, Recipe, RecipeVersion, VersionProcess};
use crate::domain::staging::{
    BatchStatus, PromoteSummary, StageResult, StagedRow, StagedRowInput,
};
use crate::domain::types::VersionState;
use crate::engine::common::{normalize_publish_date, parse_bool_flag, parse_num};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::recipe_repo::RecipeRepository;
use crate::repository::staging_repo::StagingRepository;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// BatchPromotionEngine - 批量促升引擎
// ==========================================
pub struct BatchPromotionEngine {
    catalog: Arc<dyn CatalogRepository>,
    recipes: Arc<dyn RecipeRepository>,
    staging: Arc<dyn StagingRepository>,
    config: Arc<dyn StagingConfigReader>,
}

/// CSV 级组件聚合行（目录解析前，按 SKU 合并）
struct CsvComponent {
    sku: String,
    qty: f64,
    unit: Option<String>,
    waste_pct: f64,
}

impl BatchPromotionEngine {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        recipes: Arc<dyn RecipeRepository>,
        staging: Arc<dyn StagingRepository>,
        config: Arc<dyn StagingConfigReader>,
    ) -> Self {
        Self {
            catalog,
            recipes,
            staging,
            config,
        }
    }

    // ==========================================
    // 暂存
    // ==========================================

    /// 上传行入暂存区，返回批次标识
    ///
    /// 缺少成品 SKU 或版本号的行直接丢弃（记警告）；顺便清理过期暂存行
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn stage_rows(&self, rows: Vec<StagedRowInput>) -> EngineResult<StageResult> {
        let batch_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut warnings = Vec::new();
        let mut staged = Vec::new();

        for (idx, input) in rows.into_iter().enumerate() {
            let has_sku = input
                .product_sku
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            let has_version = input
                .version
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);

            if !has_sku || !has_version {
                warnings.push(format!("第 {} 行缺少成品 SKU 或版本号，已丢弃", idx + 1));
                continue;
            }
            staged.push(StagedRow::from_input(input, &batch_id, now));
        }

        let inserted = self.staging.insert_rows(&staged).await?;
        info!(batch_id = %batch_id, inserted = inserted, "暂存批次已写入");

        // 顺路清理过期暂存行（失败不影响本次暂存）
        if let Err(e) = self.purge_expired().await {
            warn!("过期暂存行清理失败: {}", e);
        }

        Ok(StageResult {
            batch_id,
            inserted,
            warnings,
        })
    }

    /// 批次状态: 总行数 + 前若干样本行
    pub async fn batch_status(&self, batch_id: &str) -> EngineResult<BatchStatus> {
        let total = self.staging.count_batch(batch_id).await?;
        let sample_rows = self
            .config
            .get_staging_sample_rows()
            .await
            .unwrap_or(5);
        let first_rows = self.staging.sample_batch(batch_id, sample_rows).await?;

        Ok(BatchStatus {
            batch_id: batch_id.to_string(),
            total,
            first_rows,
        })
    }

    /// 删除整个批次，返回删除行数
    pub async fn clear_batch(&self, batch_id: &str) -> EngineResult<usize> {
        let deleted = self.staging.delete_batch(batch_id).await?;
        info!(batch_id = %batch_id, deleted = deleted, "暂存批次已清理");
        Ok(deleted)
    }

    /// 清理超过保留窗口的暂存行
    pub async fn purge_expired(&self) -> EngineResult<usize> {
        let retention_days = self
            .config
            .get_staging_retention_days()
            .await
            .unwrap_or(7);
        let cutoff = Utc::now() - Duration::days(retention_days);
        let purged = self.staging.purge_older_than(cutoff).await?;
        if purged > 0 {
            info!(purged = purged, retention_days = retention_days, "过期暂存行已清理");
        }
        Ok(purged)
    }

    // ==========================================
    // 促升
    // ==========================================

    /// 促升批次: 按 (成品SKU, 版本号) 分组逐组落库
    ///
    /// - overwrite_version: 版本已存在时原位替换（否则拒绝计数）
    /// - dry_run: 完整走解析与计数，不做任何写入
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn promote(
        &self,
        batch_id: &str,
        overwrite_version: bool,
        dry_run: bool,
    ) -> EngineResult<PromoteSummary> {
        let rows = self.staging.rows_for_batch(batch_id).await?;
        if rows.is_empty() {
            return Err(EngineError::NotFound(format!(
                "暂存批次不存在或已清空: {}",
                batch_id
            )));
        }

        let mut summary = PromoteSummary::default();
        let mut groups: BTreeMap<(String, i64), Vec<&StagedRow>> = BTreeMap::new();

        for row in &rows {
            let sku = match row.fields.product_sku.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => {
                    summary
                        .warnings
                        .push(format!("暂存行 {} 缺少成品 SKU，已跳过", row.row_id));
                    continue;
                }
            };
            let version_no = match Self::parse_version_no(row.fields.version.as_deref()) {
                Some(v) => v,
                None => {
                    summary.warnings.push(format!(
                        "暂存行 {} 版本号无法解析: {}",
                        row.row_id,
                        row.fields.version.as_deref().unwrap_or("")
                    ));
                    continue;
                }
            };
            // 非正版本号在分组阶段排除，不形成组
            if version_no < 1 {
                summary.warnings.push(format!(
                    "暂存行 {} 版本号必须为正整数: {}",
                    row.row_id, version_no
                ));
                continue;
            }
            groups.entry((sku, version_no)).or_default().push(row);
        }

        for ((sku, version_no), group_rows) in &groups {
            summary.groups_processed += 1;
            if let Err(e) = self
                .promote_group(
                    sku,
                    *version_no,
                    group_rows,
                    overwrite_version,
                    dry_run,
                    &mut summary,
                )
                .await
            {
                summary
                    .errors
                    .push(format!("{} v{}: {}", sku, version_no, e));
            }
        }

        info!(
            batch_id = %batch_id,
            dry_run = dry_run,
            groups = summary.groups_processed,
            created = summary.recipes_created,
            added = summary.versions_added,
            rejected = summary.versions_rejected,
            errors = summary.errors.len(),
            "批次促升完成"
        );
        Ok(summary)
    }

    /// 促升单组（组内任何失败仅影响本组）
    async fn promote_group(
        &self,
        sku: &str,
        version_no: i64,
        group_rows: &[&StagedRow],
        overwrite_version: bool,
        dry_run: bool,
        summary: &mut PromoteSummary,
    ) -> EngineResult<()> {
        let product = self
            .catalog
            .find_finished_by_sku(sku)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("成品不存在: {}", sku)))?;

        let version = self
            .build_group_version(sku, version_no, group_rows, summary)
            .await?;

        // 组内没有任何可解析组件时整组跳过，不落库不计数
        if version.components.is_empty() {
            summary.warnings.push(format!(
                "{} v{}: 无可解析组件，跳过该组",
                sku, version_no
            ));
            return Ok(());
        }

        let mark_current = parse_bool_flag(Self::header(group_rows, |f| f.mark_current.as_ref()));

        let existing = self.recipes.find_by_product_id(&product.product_id).await?;

        match existing {
            None => {
                // 新建配方（首版本）
                let now = Utc::now();
                let recipe = Recipe {
                    recipe_id: Uuid::new_v4().to_string(),
                    product_id: product.product_id.clone(),
                    current_version: mark_current.then_some(version_no),
                    versions: vec![version],
                    created_at: now,
                    updated_at: now,
                };
                if !dry_run {
                    self.recipes.insert(&recipe).await?;
                }
                summary.recipes_created += 1;
                if mark_current {
                    summary.currents_set += 1;
                }
            }
            Some(recipe) if recipe.has_version(version_no) => {
                if overwrite_version {
                    // 原位替换: 不移动当前版本指针
                    if !dry_run {
                        self.recipes.replace_version(&recipe.recipe_id, &version).await?;
                    }
                    summary.recipes_updated += 1;
                } else {
                    summary.versions_rejected += 1;
                    summary.warnings.push(format!(
                        "{} v{}: 版本已存在，未覆盖（overwrite_version=false）",
                        sku, version_no
                    ));
                }
            }
            Some(recipe) => {
                // 追加新版本
                if !dry_run {
                    self.recipes
                        .push_version(&recipe.recipe_id, &version, mark_current)
                        .await?;
                }
                summary.versions_added += 1;
                if mark_current {
                    summary.currents_set += 1;
                }
            }
        }

        Ok(())
    }

    /// 从组内行构造版本实体
    ///
    /// 头字段取组内首个非空值；组件行按 SKU 合并后做目录解析（解析失败降级为警告）
    async fn build_group_version(
        &self,
        sku: &str,
        version_no: i64,
        group_rows: &[&StagedRow],
        summary: &mut PromoteSummary,
    ) -> EngineResult<RecipeVersion> {
        let state = Self::header(group_rows, |f| f.state.as_ref())
            .map(VersionState::parse_loose)
            .unwrap_or(VersionState::Draft);

        let mut base_qty = parse_num(Self::header(group_rows, |f| f.base_qty.as_ref()), 1.0);
        if base_qty <= 0.0 {
            summary.warnings.push(format!(
                "{} v{}: 基准批量非正数，按 1 处理",
                sku, version_no
            ));
            base_qty = 1.0;
        }

        // 发布日期无法解析会中止整组
        let publish_date =
            normalize_publish_date(Self::header(group_rows, |f| f.publish_date.as_ref()))?;

        let process = self
            .resolve_group_process(sku, version_no, group_rows, summary)
            .await?;
        let components = self
            .resolve_group_components(sku, version_no, group_rows, summary)
            .await?;

        Ok(RecipeVersion {
            version: version_no,
            state,
            publish_date,
            publisher: Self::header(group_rows, |f| f.publisher.as_ref()).map(str::to_string),
            base_qty,
            unit_pt: Self::header(group_rows, |f| f.unit_pt.as_ref()).map(str::to_string),
            process,
            components,
            cost: None,
        })
    }

    /// 组工序解析: 编码优先；编码解析失败时记警告且不挂工序（不回退内联）
    async fn resolve_group_process(
        &self,
        sku: &str,
        version_no: i64,
        group_rows: &[&StagedRow],
        summary: &mut PromoteSummary,
    ) -> EngineResult<Option<VersionProcess>> {
        if let Some(code) = Self::header(group_rows, |f| f.process_code.as_ref()) {
            return match self.catalog.find_process_by_code(code).await? {
                Some(process) => Ok(Some(VersionProcess::Catalog {
                    process_id: process.process_id,
                })),
                None => {
                    summary.warnings.push(format!(
                        "{} v{}: 工序编码无法解析: {}，版本不挂工序",
                        sku, version_no, code
                    ));
                    Ok(None)
                }
            };
        }

        let name =
            Self::header(group_rows, |f| f.special_process_name.as_ref()).map(str::to_string);
        let cost = Self::header(group_rows, |f| f.special_process_cost.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|c| c.is_finite());

        if name.is_some() || cost.is_some() {
            Ok(Some(VersionProcess::Special { name, cost }))
        } else {
            Ok(None)
        }
    }

    /// 组组件解析: 先按 SKU 合并再做目录解析
    ///
    /// 解析不到的组件记入错误列表（该组件丢弃，组不中断）；缺组件 SKU 的行记警告
    async fn resolve_group_components(
        &self,
        sku: &str,
        version_no: i64,
        group_rows: &[&StagedRow],
        summary: &mut PromoteSummary,
    ) -> EngineResult<Vec<Component>> {
        let mut csv_components: Vec<CsvComponent> = Vec::new();
        let mut index_by_sku: HashMap<String, usize> = HashMap::new();

        for row in group_rows {
            let component_sku = match row.fields.component_sku.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => {
                    // 纯头部行合法，但留痕便于排查漏填
                    summary.warnings.push(format!(
                        "{} v{}: 行缺少组件 SKU",
                        sku, version_no
                    ));
                    continue;
                }
            };

            let qty = parse_num(row.fields.qty_per_base.as_deref(), 0.0).max(0.0);
            let mut waste = parse_num(row.fields.waste_pct.as_deref(), 0.0);
            if !(0.0..=100.0).contains(&waste) {
                summary.warnings.push(format!(
                    "{} v{}: 组件 {} 损耗超出 0–100（{}），按边界截断",
                    sku, version_no, component_sku, waste
                ));
                waste = waste.clamp(0.0, 100.0);
            }
            let unit = row
                .fields
                .unit_mp
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            match index_by_sku.get(&component_sku) {
                Some(&idx) => {
                    let existing = &mut csv_components[idx];
                    existing.qty += qty;
                    if existing.unit.is_some() && unit.is_some() && existing.unit != unit {
                        summary.warnings.push(format!(
                            "{} v{}: 组件 {} 重复行单位不一致，保留首见单位",
                            sku, version_no, component_sku
                        ));
                    }
                }
                None => {
                    index_by_sku.insert(component_sku.clone(), csv_components.len());
                    csv_components.push(CsvComponent {
                        sku: component_sku,
                        qty,
                        unit,
                        waste_pct: waste,
                    });
                }
            }
        }

        let mut components = Vec::with_capacity(csv_components.len());
        for csv in &csv_components {
            match self.catalog.find_product_by_sku(&csv.sku).await? {
                Some(product) => components.push(Component {
                    product_id: product.product_id,
                    qty_per_base: csv.qty,
                    unit: csv.unit.clone(),
                    waste_pct: csv.waste_pct,
                }),
                None => summary.errors.push(format!(
                    "{} v{}: 组件产品不存在: {}，已跳过",
                    sku, version_no, csv.sku
                )),
            }
        }

        Ok(components)
    }

    // ==========================================
    // 辅助
    // ==========================================

    /// 组内首个非空头字段值
    fn header<'a>(
        rows: &[&'a StagedRow],
        pick: impl Fn(&'a StagedRowInput) -> Option<&'a String>,
    ) -> Option<&'a str> {
        rows.iter()
            .filter_map(|row| pick(&row.fields))
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    /// 版本号解析: 整数优先，兼容 "2.0" 类写法
    fn parse_version_no(raw: Option<&str>) -> Option<i64> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Some(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }
}
