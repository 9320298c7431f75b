// ==========================================
// 解冻库存滚动系统 - 销量历史导入器
// ==========================================
// 流程: 解析 → 字段映射 → 数值/日期归一 → 校验 → 去重 → 落库
// 红线: 只写 sales_history, 不触碰库存链与报表
// ==========================================

use crate::domain::SalesObservation;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::repository::SalesHistoryRepository;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

// 源文件列名别名表(葡语原始列名在前)
const DATE_ALIASES: &[&str] = &["data_dia", "sales_date"];
const SALES_KG_ALIASES: &[&str] = &["total_venda_dia_kg", "sales_kg"];

const FIELD_SALES_DATE: &str = "sales_date";
const FIELD_SALES_KG: &str = "sales_kg";

// ==========================================
// 导入结果
// ==========================================

/// 单行失败明细(行号按源文件计, 表头为第 1 行)
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// 一次导入的汇总
#[derive(Debug, Clone, Serialize)]
pub struct SalesImportSummary {
    pub batch_id: String,
    pub file_name: String,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub failures: Vec<RowFailure>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub elapsed_ms: u64,
}

// ==========================================
// SalesHistoryImporter - 销量历史导入器
// ==========================================
pub struct SalesHistoryImporter {
    sales_repo: Arc<SalesHistoryRepository>,
    file_parser: UniversalFileParser,
}

impl SalesHistoryImporter {
    pub fn new(sales_repo: Arc<SalesHistoryRepository>) -> Self {
        Self {
            sales_repo,
            file_parser: UniversalFileParser,
        }
    }

    /// 从 CSV/Excel 文件导入销量历史
    ///
    /// 同一日期在文件内出现多次时保留最后一行, 被覆盖的行计入 failures;
    /// 与库内已有日期重合时按日期 UPSERT 覆盖。
    pub fn import_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<SalesImportSummary> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        info!(batch_id = %batch_id, file = %path.display(), "开始导入销量历史");

        // === 步骤 1: 解析文件 ===
        let raw_rows = self.file_parser.parse(path)?;
        let total_rows = raw_rows.len();
        info!(total_rows, "文件解析完成");

        // === 步骤 2: 字段映射与校验 ===
        let mut by_date: BTreeMap<NaiveDate, (usize, SalesObservation)> = BTreeMap::new();
        let mut failures: Vec<RowFailure> = Vec::new();

        for (idx, row) in raw_rows.iter().enumerate() {
            let row_number = idx + 2; // 第 1 行是表头
            match self.map_row(row, row_number, &batch_id) {
                Ok(obs) => {
                    let date = obs.sales_date;
                    if let Some((prev_row, _)) = by_date.insert(date, (row_number, obs)) {
                        warn!(row_number = prev_row, date = %date, "重复日期, 保留后出现的行");
                        failures.push(RowFailure {
                            row: prev_row,
                            message: format!("日期 {} 重复, 被第 {} 行覆盖", date, row_number),
                        });
                    }
                }
                Err(e) => {
                    warn!(row_number, error = %e, "行映射失败, 跳过");
                    failures.push(RowFailure {
                        row: row_number,
                        message: e.to_string(),
                    });
                }
            }
        }

        if by_date.is_empty() {
            return Err(ImportError::NoValidRows(path.display().to_string()));
        }

        let first_date = by_date.keys().next().copied();
        let last_date = by_date.keys().next_back().copied();
        let observations: Vec<SalesObservation> =
            by_date.into_values().map(|(_, obs)| obs).collect();

        // === 步骤 3: 批量落库(按日期 UPSERT) ===
        let imported_rows = self.sales_repo.batch_upsert(&observations)?;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            imported = imported_rows,
            skipped = failures.len(),
            elapsed_ms,
            "销量历史导入完成"
        );

        Ok(SalesImportSummary {
            batch_id,
            file_name,
            total_rows,
            imported_rows,
            skipped_rows: failures.len(),
            failures,
            first_date,
            last_date,
            elapsed_ms,
        })
    }

    /// 单行映射: 别名取值 → 日期/数值解析 → 范围校验
    fn map_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
        batch_id: &str,
    ) -> ImportResult<SalesObservation> {
        let date_raw = get_field(row, DATE_ALIASES).ok_or_else(|| ImportError::FieldMappingError {
            row: row_number,
            message: format!("缺少日期列(候选: {})", DATE_ALIASES.join("/")),
        })?;
        let sales_date =
            parse_flexible_date(&date_raw).ok_or_else(|| ImportError::DateFormatError {
                row: row_number,
                field: FIELD_SALES_DATE.to_string(),
                value: date_raw.clone(),
            })?;

        let kg_raw = get_field(row, SALES_KG_ALIASES).ok_or_else(|| {
            ImportError::FieldMappingError {
                row: row_number,
                message: format!("缺少销量列(候选: {})", SALES_KG_ALIASES.join("/")),
            }
        })?;
        let sales_kg =
            parse_decimal_flexible(&kg_raw).ok_or_else(|| ImportError::TypeConversionError {
                row: row_number,
                field: FIELD_SALES_KG.to_string(),
                message: format!("无法解析为数值: {}", kg_raw),
            })?;

        if !sales_kg.is_finite() || sales_kg < 0.0 {
            return Err(ImportError::ValueRangeError {
                row: row_number,
                field: FIELD_SALES_KG.to_string(),
                message: format!("销量必须为非负有限值, 实际 {}", kg_raw),
            });
        }

        let mut obs = SalesObservation::new(sales_date, sales_kg);
        obs.import_batch_id = Some(batch_id.to_string());
        Ok(obs)
    }
}

// 按别名表取字段值, 空白视为缺失
fn get_field(row: &HashMap<String, String>, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(value) = row.get(*alias) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// 解析日期: 先 ISO (YYYY-MM-DD), 再巴西记法 (DD/MM/YYYY)
fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// 解析数值: 含逗号按巴西记法(千分位 '.', 小数 ','), 否则按英文小数点
fn parse_decimal_flexible(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_decimal_english_notation() {
        assert_eq!(parse_decimal_flexible("52.4"), Some(52.4));
        assert_eq!(parse_decimal_flexible("120"), Some(120.0));
        assert_eq!(parse_decimal_flexible(" 61.0 "), Some(61.0));
    }

    #[test]
    fn test_parse_decimal_brazilian_notation() {
        assert_eq!(parse_decimal_flexible("12,5"), Some(12.5));
        assert_eq!(parse_decimal_flexible("1.023,5"), Some(1023.5));
        assert_eq!(parse_decimal_flexible("1.234.567,89"), Some(1234567.89));
    }

    #[test]
    fn test_parse_decimal_invalid() {
        assert_eq!(parse_decimal_flexible(""), None);
        assert_eq!(parse_decimal_flexible("abc"), None);
        assert_eq!(parse_decimal_flexible("1,2,3"), None);
    }

    #[test]
    fn test_parse_date_iso_and_brazilian() {
        assert_eq!(parse_flexible_date("2024-03-15"), Some(d("2024-03-15")));
        assert_eq!(parse_flexible_date("15/03/2024"), Some(d("2024-03-15")));
        // 月在前的美式写法不接受
        assert_eq!(parse_flexible_date("03/15/2024"), None);
        assert_eq!(parse_flexible_date("2024/03/15"), None);
    }

    #[test]
    fn test_get_field_uses_alias_order() {
        let mut row = HashMap::new();
        row.insert("data_dia".to_string(), "2024-01-01".to_string());
        row.insert("sales_date".to_string(), "2024-12-31".to_string());
        assert_eq!(
            get_field(&row, DATE_ALIASES),
            Some("2024-01-01".to_string())
        );

        let mut row2 = HashMap::new();
        row2.insert("sales_date".to_string(), "2024-12-31".to_string());
        assert_eq!(
            get_field(&row2, DATE_ALIASES),
            Some("2024-12-31".to_string())
        );
    }

    #[test]
    fn test_get_field_blank_is_missing() {
        let mut row = HashMap::new();
        row.insert("data_dia".to_string(), "  ".to_string());
        assert_eq!(get_field(&row, DATE_ALIASES), None);
    }
}
