// ==========================================
// 销售管道 CRM - 导入领域模型
// ==========================================
// 用途: 导入管道中间产物（文件解析 → 列映射 → 校验 → 预览）
// 生命周期: 仅在导入会话内，不落库
// ==========================================

use crate::domain::lead::{Lead, NewLead};
use crate::domain::types::PaymentTerms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// FileType - 支持的文件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
    Json,
}

impl FileType {
    /// 按扩展名识别（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "xlsx" => Some(FileType::Xlsx),
            "xls" => Some(FileType::Xls),
            "json" => Some(FileType::Json),
            _ => None,
        }
    }

    /// 按文件名识别（取最后一个 '.' 之后的部分）
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Xlsx => "xlsx",
            FileType::Xls => "xls",
            FileType::Json => "json",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

// ==========================================
// RawValue - 源文件单元格原始值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Null,
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// 文本形式（Null → None）
    ///
    /// 整数值的浮点数输出为不带小数点的形式（Excel 单元格常见）
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            RawValue::Null => None,
        }
    }
}

// ==========================================
// LeadField - 导入目标字段
// ==========================================
// 枚举顺序即自动映射的优先级顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    ContactName,
    CompanyName,
    Email,
    Phone,
    Value,
    PaymentTerms,
    Notes,
}

impl LeadField {
    /// 固定枚举顺序
    pub const ALL: [LeadField; 7] = [
        LeadField::ContactName,
        LeadField::CompanyName,
        LeadField::Email,
        LeadField::Phone,
        LeadField::Value,
        LeadField::PaymentTerms,
        LeadField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadField::ContactName => "contact_name",
            LeadField::CompanyName => "company_name",
            LeadField::Email => "email",
            LeadField::Phone => "phone",
            LeadField::Value => "value",
            LeadField::PaymentTerms => "payment_terms",
            LeadField::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == s.trim())
    }

    /// 列名别名（已规范化：小写 + 下划线）
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LeadField::ContactName => &[
                "name",
                "contact",
                "contact_name",
                "full_name",
                "fullname",
                "person",
                "contactname",
            ],
            LeadField::CompanyName => &[
                "company",
                "company_name",
                "organization",
                "org",
                "business",
                "companyname",
            ],
            LeadField::Email => &["email", "email_address", "mail", "e-mail", "emailaddress"],
            LeadField::Phone => &[
                "phone",
                "phone_number",
                "tel",
                "telephone",
                "mobile",
                "number",
                "phonenumber",
                "cell",
            ],
            LeadField::Value => &["value", "deal_value", "amount", "worth", "price", "dealvalue"],
            LeadField::PaymentTerms => &[
                "payment_terms",
                "payment",
                "terms",
                "billing",
                "paymentterms",
            ],
            LeadField::Notes => &["notes", "note", "description", "comments", "comment", "remarks"],
        }
    }

    /// 字段的语义类型
    pub fn kind(&self) -> FieldKind {
        match self {
            LeadField::ContactName => FieldKind::RequiredText,
            LeadField::CompanyName | LeadField::Email | LeadField::Phone | LeadField::Notes => {
                FieldKind::OptionalText
            }
            LeadField::Value => FieldKind::OptionalNumber,
            LeadField::PaymentTerms => FieldKind::OptionalEnum,
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FieldKind / FieldValue - 字段类型与强制转换结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    RequiredText,   // 必填文本（原样保留，由校验器判空）
    OptionalText,   // 可空文本（空串 → Null）
    OptionalNumber, // 可空数值（解析失败 → Null）
    OptionalEnum,   // 可空枚举（未识别 → Null）
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Terms(PaymentTerms),
    Null,
}

// ==========================================
// ColumnMapping - 源列 → 目标字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_field: Option<LeadField>, // None = 跳过
}

impl ColumnMapping {
    pub fn new(source_column: impl Into<String>, target_field: Option<LeadField>) -> Self {
        Self {
            source_column: source_column.into(),
            target_field,
        }
    }
}

// ==========================================
// MappedLead - 映射后的行数据（强类型）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedLead {
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub value: Option<f64>,
    pub payment_terms: Option<PaymentTerms>,
    pub notes: Option<String>,
}

impl MappedLead {
    /// 写入单个字段（值类型与字段不匹配时按 Null 处理）
    pub fn set(&mut self, field: LeadField, value: FieldValue) {
        match field {
            LeadField::ContactName => self.contact_name = value.into_text(),
            LeadField::CompanyName => self.company_name = value.into_text(),
            LeadField::Email => self.email = value.into_text(),
            LeadField::Phone => self.phone = value.into_text(),
            LeadField::Notes => self.notes = value.into_text(),
            LeadField::Value => {
                self.value = match value {
                    FieldValue::Number(n) => Some(n),
                    _ => None,
                }
            }
            LeadField::PaymentTerms => {
                self.payment_terms = match value {
                    FieldValue::Terms(t) => Some(t),
                    _ => None,
                }
            }
        }
    }

    /// 转换为新建请求（文本去首尾空白，空字符串统一为 None）
    pub fn to_new_lead(&self) -> Option<NewLead> {
        let contact_name = self.contact_name.as_ref()?.trim().to_string();
        if contact_name.is_empty() {
            return None;
        }
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(NewLead {
            contact_name,
            company_name: non_empty(&self.company_name),
            email: non_empty(&self.email),
            phone: non_empty(&self.phone),
            value: self.value,
            payment_terms: self.payment_terms,
            notes: non_empty(&self.notes),
        })
    }
}

impl From<&NewLead> for MappedLead {
    fn from(lead: &NewLead) -> Self {
        Self {
            contact_name: Some(lead.contact_name.clone()),
            company_name: lead.company_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            value: lead.value,
            payment_terms: lead.payment_terms,
            notes: lead.notes.clone(),
        }
    }
}

impl From<&Lead> for MappedLead {
    fn from(lead: &Lead) -> Self {
        Self {
            contact_name: Some(lead.contact_name.clone()),
            company_name: lead.company_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            value: lead.value,
            payment_terms: lead.payment_terms,
            notes: lead.notes.clone(),
        }
    }
}

impl FieldValue {
    fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ==========================================
// ImportRow - 导入行（瞬态）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_index: usize,                 // 1-based，用于错误提示
    pub data: HashMap<String, RawValue>,  // 源列名 → 原始值
    pub mapped: Option<MappedLead>,       // 映射后数据（确认映射后填充）
    pub is_valid: bool,
    pub errors: Vec<String>,              // "<field>: <reason>"
}

impl ImportRow {
    /// 解析阶段创建：暂定有效
    pub fn new(row_index: usize, data: HashMap<String, RawValue>) -> Self {
        Self {
            row_index,
            data,
            mapped: None,
            is_valid: true,
            errors: Vec::new(),
        }
    }
}

// ==========================================
// ParseResult - 文件解析结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_type: FileType,
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
}

impl ParseResult {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// ImportSummary - 预览统计
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
}

impl ImportSummary {
    pub fn from_rows(rows: &[ImportRow]) -> Self {
        let valid_rows = rows.iter().filter(|r| r.is_valid).count();
        Self {
            total_rows: rows.len(),
            valid_rows,
            invalid_rows: rows.len() - valid_rows,
        }
    }
}

// ==========================================
// ImportCommitResult - 提交结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCommitResult {
    pub stage_id: String,
    pub inserted: Vec<Lead>,
    pub skipped_invalid: usize,
    pub elapsed_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_file_name("leads.CSV"), Some(FileType::Csv));
        assert_eq!(FileType::from_file_name("a.b.xlsx"), Some(FileType::Xlsx));
        assert_eq!(FileType::from_file_name("old.xls"), Some(FileType::Xls));
        assert_eq!(FileType::from_file_name("dump.json"), Some(FileType::Json));
        assert_eq!(FileType::from_file_name("brochure.pdf"), None);
        assert_eq!(FileType::from_file_name("noext"), None);
    }

    #[test]
    fn test_raw_value_as_text() {
        assert_eq!(RawValue::Number(42.0).as_text(), Some("42".to_string()));
        assert_eq!(RawValue::Number(1.5).as_text(), Some("1.5".to_string()));
        assert_eq!(RawValue::Text("x".into()).as_text(), Some("x".to_string()));
        assert_eq!(RawValue::Null.as_text(), None);
    }

    #[test]
    fn test_mapped_lead_to_new_lead() {
        let mapped = MappedLead {
            contact_name: Some("  Ada ".to_string()),
            email: Some("".to_string()),
            value: Some(10.0),
            ..Default::default()
        };
        let lead = mapped.to_new_lead().unwrap();
        assert_eq!(lead.contact_name, "Ada");
        assert_eq!(lead.email, None);
        assert_eq!(lead.value, Some(10.0));

        let padded = MappedLead {
            contact_name: Some("Grace".to_string()),
            company_name: Some("  Navy ".to_string()),
            notes: Some("   ".to_string()),
            ..Default::default()
        };
        let lead = padded.to_new_lead().unwrap();
        assert_eq!(lead.company_name.as_deref(), Some("Navy"));
        assert_eq!(lead.notes, None);

        assert!(MappedLead::default().to_new_lead().is_none());
    }

    #[test]
    fn test_lead_field_parse() {
        assert_eq!(LeadField::parse("payment_terms"), Some(LeadField::PaymentTerms));
        assert_eq!(LeadField::parse("nope"), None);
    }
}
