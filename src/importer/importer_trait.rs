// ==========================================
// 销售管道 CRM - 导入管道 Trait
// ==========================================
// 职责: 定义解析、校验接口（不包含实现）
// ==========================================

use crate::domain::import::{FileType, ImportRow, MappedLead, ParseResult};
use crate::importer::error::ImportResult;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件内容 → 表头 + 原始行
// 实现者: CsvParser, ExcelParser, JsonParser
pub trait FileParser: Send + Sync {
    /// 解析器对应的文件类型
    fn file_type(&self) -> FileType;

    /// 解析文件内容
    ///
    /// # 返回
    /// - Ok(ParseResult): 行号从 1 开始，所有行暂定有效
    /// - Err(EmptyFile): 无数据行
    /// - Err(*ParseError): 内容格式错误
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParseResult>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行字段校验（不短路，收集全部错误）
// 实现者: LeadRowValidator
pub trait RowValidator: Send + Sync {
    /// 校验映射后的行，返回 "<field>: <reason>" 列表
    fn validate(&self, mapped: &MappedLead) -> Vec<String>;

    /// 校验并回写 ImportRow 的 is_valid / errors
    fn validate_row(&self, row: &mut ImportRow) {
        let errors = match &row.mapped {
            Some(mapped) => self.validate(mapped),
            None => self.validate(&MappedLead::default()),
        };
        row.is_valid = errors.is_empty();
        row.errors = errors;
    }
}
