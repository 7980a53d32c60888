// ==========================================
// 销售管道 CRM - 导入层
// ==========================================
// 职责: 外部文件导入线索
// 流程: 解析 → 列映射 → 行校验 → 预览 → 追加入库
// 支持: CSV, Excel, JSON
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod error;
pub mod file_parser;
pub mod import_session;
pub mod importer_trait;
pub mod row_validator;

// 重导出核心类型
pub use column_mapper::{apply_mapping, auto_map_columns, coerce_value, detect_field, normalize_header};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, JsonParser, UniversalFileParser};
pub use import_session::{ImportSession, ImportStep};
pub use row_validator::{is_valid_email, LeadRowValidator};

// 重导出 Trait 接口
pub use importer_trait::{FileParser, RowValidator};
