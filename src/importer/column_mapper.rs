// ==========================================
// 销售管道 CRM - 列映射器
// ==========================================
// 职责: 表头 → 线索字段自动识别 + 按字段类型强制转换
// 规则: 规范化表头与别名做双向子串匹配，按字段枚举顺序取第一个命中
// ==========================================

use crate::domain::import::{
    ColumnMapping, FieldKind, FieldValue, LeadField, MappedLead, RawValue,
};
use crate::domain::types::PaymentTerms;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_-]+").expect("separator regex should compile"))
}

/// 表头规范化：小写 + 去首尾空白 + 空白/连字符/下划线折叠为单个 '_'
pub fn normalize_header(header: &str) -> String {
    let lowered = header.trim().to_lowercase();
    separator_regex().replace_all(&lowered, "_").into_owned()
}

/// 识别单个表头对应的字段（未命中返回 None）
pub fn detect_field(header: &str) -> Option<LeadField> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }

    LeadField::ALL.iter().copied().find(|field| {
        field
            .aliases()
            .iter()
            .any(|alias| normalized.contains(alias) || alias.contains(normalized.as_str()))
    })
}

/// 自动映射全部表头（保持表头顺序）
pub fn auto_map_columns(headers: &[String]) -> Vec<ColumnMapping> {
    headers
        .iter()
        .map(|h| ColumnMapping::new(h.clone(), detect_field(h)))
        .collect()
}

// ==========================================
// 按字段类型的强制转换
// ==========================================

/// 必填文本：原样取字符串形式（判空交给校验器）
fn coerce_required_text(raw: &RawValue) -> FieldValue {
    match raw.as_text() {
        Some(s) => FieldValue::Text(s),
        None => FieldValue::Null,
    }
}

/// 可空文本：空串 → Null
fn coerce_optional_text(raw: &RawValue) -> FieldValue {
    match raw.as_text() {
        Some(s) if !s.is_empty() => FieldValue::Text(s),
        _ => FieldValue::Null,
    }
}

/// 可空数值：解析失败 / NaN / 无穷 → Null，从不报错
fn coerce_optional_number(raw: &RawValue) -> FieldValue {
    let parsed = match raw {
        RawValue::Number(n) => Some(*n),
        RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        RawValue::Null => None,
    };
    match parsed {
        Some(n) if n.is_finite() => FieldValue::Number(n),
        _ => FieldValue::Null,
    }
}

/// 可空枚举：同义词识别，未识别 → Null
fn coerce_optional_enum(raw: &RawValue) -> FieldValue {
    match raw.as_text().as_deref().and_then(PaymentTerms::from_synonym) {
        Some(terms) => FieldValue::Terms(terms),
        None => FieldValue::Null,
    }
}

pub fn coerce_value(kind: FieldKind, raw: &RawValue) -> FieldValue {
    match kind {
        FieldKind::RequiredText => coerce_required_text(raw),
        FieldKind::OptionalText => coerce_optional_text(raw),
        FieldKind::OptionalNumber => coerce_optional_number(raw),
        FieldKind::OptionalEnum => coerce_optional_enum(raw),
    }
}

/// 按映射把一行原始数据转换为强类型字段
///
/// 跳过的列与 Null 原始值不写入；同一字段被多列映射时后者覆盖前者
pub fn apply_mapping(data: &HashMap<String, RawValue>, mappings: &[ColumnMapping]) -> MappedLead {
    let mut mapped = MappedLead::default();

    for mapping in mappings {
        let Some(field) = mapping.target_field else {
            continue;
        };
        match data.get(&mapping.source_column) {
            Some(raw) if !raw.is_null() => mapped.set(field, coerce_value(field.kind(), raw)),
            _ => {}
        }
    }

    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Deal  Value "), "deal_value");
        assert_eq!(normalize_header("E-Mail__Address"), "e_mail_address");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn test_auto_map_common_headers() {
        let mappings = auto_map_columns(&headers(&[
            "Full Name",
            "Company",
            "Email Address",
            "Mobile",
            "Deal Value",
            "Billing",
            "Remarks",
            "Favourite colour",
        ]));
        let targets: Vec<Option<LeadField>> = mappings.iter().map(|m| m.target_field).collect();

        assert_eq!(
            targets,
            vec![
                Some(LeadField::ContactName),
                Some(LeadField::CompanyName),
                Some(LeadField::Email),
                Some(LeadField::Phone),
                Some(LeadField::Value),
                Some(LeadField::PaymentTerms),
                Some(LeadField::Notes),
                None,
            ]
        );
        assert_eq!(mappings[0].source_column, "Full Name");
    }

    #[test]
    fn test_enumeration_order_breaks_ties() {
        // "company_name" 同时包含 "name"（contact_name 别名），按枚举顺序取 contact_name
        assert_eq!(detect_field("Company Name"), Some(LeadField::ContactName));
        // 别名包含表头（反向子串）
        assert_eq!(detect_field("org"), Some(LeadField::CompanyName));
        assert_eq!(detect_field(""), None);
    }

    #[test]
    fn test_apply_mapping_coercions() {
        let mut data = HashMap::new();
        data.insert("Name".to_string(), RawValue::Text("Ada".into()));
        data.insert("Email".to_string(), RawValue::Text("".into()));
        data.insert("Value".to_string(), RawValue::Text(" 1200.50 ".into()));
        data.insert("Terms".to_string(), RawValue::Text("Per Month".into()));
        data.insert("Phone".to_string(), RawValue::Number(5551234.0));
        data.insert("Ignored".to_string(), RawValue::Text("x".into()));

        let mappings = vec![
            ColumnMapping::new("Name", Some(LeadField::ContactName)),
            ColumnMapping::new("Email", Some(LeadField::Email)),
            ColumnMapping::new("Value", Some(LeadField::Value)),
            ColumnMapping::new("Terms", Some(LeadField::PaymentTerms)),
            ColumnMapping::new("Phone", Some(LeadField::Phone)),
            ColumnMapping::new("Ignored", None),
        ];

        let mapped = apply_mapping(&data, &mappings);
        assert_eq!(mapped.contact_name.as_deref(), Some("Ada"));
        assert_eq!(mapped.email, None);
        assert_eq!(mapped.value, Some(1200.5));
        assert_eq!(mapped.payment_terms, Some(PaymentTerms::Monthly));
        assert_eq!(mapped.phone.as_deref(), Some("5551234"));
        assert_eq!(mapped.notes, None);
    }

    #[test]
    fn test_unparseable_number_becomes_null() {
        assert_eq!(
            coerce_value(FieldKind::OptionalNumber, &RawValue::Text("abc".into())),
            FieldValue::Null
        );
        assert_eq!(
            coerce_value(FieldKind::OptionalNumber, &RawValue::Text("NaN".into())),
            FieldValue::Null
        );
        assert_eq!(
            coerce_value(FieldKind::OptionalNumber, &RawValue::Number(-5.0)),
            FieldValue::Number(-5.0)
        );
    }

    #[test]
    fn test_number_text_must_parse_whole() {
        for text in ["1,200", "1200 USD", "$500"] {
            assert_eq!(
                coerce_value(FieldKind::OptionalNumber, &RawValue::Text(text.into())),
                FieldValue::Null,
                "{} should not parse",
                text
            );
        }
        assert_eq!(
            coerce_value(FieldKind::OptionalNumber, &RawValue::Text(" 1200.5 ".into())),
            FieldValue::Number(1200.5)
        );
    }

    #[test]
    fn test_unknown_terms_become_null() {
        assert_eq!(
            coerce_value(FieldKind::OptionalEnum, &RawValue::Text("quarterly".into())),
            FieldValue::Null
        );
        assert_eq!(
            coerce_value(FieldKind::OptionalEnum, &RawValue::Text("ONE-TIME".into())),
            FieldValue::Terms(PaymentTerms::OneTime)
        );
    }
}
