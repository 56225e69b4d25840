// ==========================================
// 配方版本与成本核算系统 - 配方 CSV 读取器
// ==========================================
// 职责: 导入模板 CSV → 暂存行输入（弱类型，不做业务解析）
// 红线: 按表头名定位列（不按列序），表头匹配大小写不敏感
// ==========================================

use crate::domain::staging::StagedRowInput;
use crate::importer::error::{ImportError, ImportResult};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// 导入模板表头（16 列线上契约）
pub const TEMPLATE_HEADERS: [&str; 16] = [
    "product_sku",
    "version",
    "state",
    "mark_current",
    "base_qty",
    "unit_pt",
    "component_sku",
    "qty_per_base",
    "unit_mp",
    "waste_pct",
    "process_code",
    "special_process_name",
    "special_process_cost",
    "publish_date",
    "publisher",
    "notes",
];

// ==========================================
// RecipeCsvReader - CSV 读取器
// ==========================================
pub struct RecipeCsvReader;

impl RecipeCsvReader {
    /// 读取导入模板 CSV 文件
    pub fn read_staged_rows(path: &str) -> ImportResult<Vec<StagedRowInput>> {
        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(path.to_string()));
        }

        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if extension != "csv" {
            return Err(ImportError::UnsupportedFormat(path.to_string()));
        }

        let content = std::fs::read_to_string(file_path)
            .map_err(|e| ImportError::CsvParseError(format!("{}: {}", path, e)))?;

        let rows = Self::read_staged_rows_from_str(&content)
            .map_err(|e| match e {
                ImportError::EmptyFile(_) => ImportError::EmptyFile(path.to_string()),
                other => other,
            })?;

        info!(path = %path, rows = rows.len(), "导入模板 CSV 已读取");
        Ok(rows)
    }

    /// 从字符串内容解析导入模板 CSV（上传接口用）
    pub fn read_staged_rows_from_str(content: &str) -> ImportResult<Vec<StagedRowInput>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        // 表头 → 列序号（大小写不敏感）
        let headers = reader
            .headers()
            .map_err(ImportError::from)?
            .clone();
        let mut column_index: HashMap<String, usize> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            column_index.insert(header.trim().to_lowercase(), idx);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(ImportError::from)?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue; // 空白行跳过
            }
            rows.push(Self::map_record(&record, &column_index));
        }

        if rows.is_empty() {
            return Err(ImportError::EmptyFile("内容为空".to_string()));
        }
        Ok(rows)
    }

    fn map_record(record: &StringRecord, column_index: &HashMap<String, usize>) -> StagedRowInput {
        let cell = |name: &str| -> Option<String> {
            column_index
                .get(name)
                .and_then(|&idx| record.get(idx))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        StagedRowInput {
            product_sku: cell("product_sku"),
            version: cell("version"),
            state: cell("state"),
            mark_current: cell("mark_current"),
            base_qty: cell("base_qty"),
            unit_pt: cell("unit_pt"),
            component_sku: cell("component_sku"),
            qty_per_base: cell("qty_per_base"),
            unit_mp: cell("unit_mp"),
            waste_pct: cell("waste_pct"),
            process_code: cell("process_code"),
            special_process_name: cell("special_process_name"),
            special_process_cost: cell("special_process_cost"),
            publish_date: cell("publish_date"),
            publisher: cell("publisher"),
            notes: cell("notes"),
        }
    }

    /// 生成导入模板 CSV（表头 + 示例行）
    pub fn template_csv() -> String {
        let mut out = String::new();
        out.push_str(&TEMPLATE_HEADERS.join(","));
        out.push('\n');
        out.push_str("301002,1,vigente,si,10,un,801007,5,kg,2,,,,2025-01-15,ops,\n");
        out.push_str("301002,1,,,,,801008,3,kg,0,,,,,,\n");
        out
    }
}
