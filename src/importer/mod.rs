// ==========================================
// 解冻库存滚动系统 - 导入层
// ==========================================
// 职责: 外部销量数据导入, 生成内部销量历史
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod sales_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, UniversalFileParser};
pub use sales_importer::{RowFailure, SalesHistoryImporter, SalesImportSummary};
