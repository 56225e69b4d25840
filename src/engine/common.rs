// ==========================================
// 配方版本与成本核算系统 - 引擎公共工具
// ==========================================
// 用途: 日期归一、弱类型字段解析、金额舍入
// 红线: round6 是全系统唯一的金额/数量舍入口径
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// 发布日期支持的无时区格式（按尝试顺序）
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// 发布日期归一化
///
/// 接受 ISO 日期、ISO 日期时间（含尾部 Z）、dd-mm-YYYY、dd/mm/YYYY、YYYY/mm/dd；
/// 缺省（None 或空白）取今日 UTC 零点；无法解析报 Validation 错误。
pub fn normalize_publish_date(input: Option<&str>) -> EngineResult<DateTime<Utc>> {
    let raw = match input {
        Some(s) if !s.trim().is_empty() => s.trim(),
        _ => {
            let today = Utc::now().date_naive();
            return Ok(Utc.from_utc_datetime(&today.and_hms_opt(0, 0, 0).unwrap()));
        }
    };

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
        }
    }

    // 带时区的 ISO 日期时间（含尾部 Z）
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    Err(EngineError::Validation(format!(
        "发布日期格式无法识别: {}",
        raw
    )))
}

/// 弱类型布尔解析（导入模板用，大小写不敏感）
///
/// 真值集合: true / 1 / si / sí / y / yes，其余一律 false
pub fn parse_bool_flag(input: Option<&str>) -> bool {
    match input {
        Some(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "si" | "sí" | "y" | "yes"
        ),
        None => false,
    }
}

/// 弱类型数值解析：解析失败或非有限值取默认值
pub fn parse_num(input: Option<&str>, default: f64) -> f64 {
    match input {
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => default,
        },
        None => default,
    }
}

/// 统一舍入口径：6 位小数，四舍五入
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
