// ==========================================
// 销售管道 CRM - 导入行校验器
// ==========================================
// 职责: 映射后行数据的字段校验
// 规则: 不短路，全部错误以 "<field>: <reason>" 收集
// ==========================================

use crate::domain::import::MappedLead;
use crate::importer::importer_trait::RowValidator;
use regex::Regex;
use std::sync::OnceLock;

pub const CONTACT_NAME_REQUIRED: &str = "contact_name: Contact name is required";
pub const INVALID_EMAIL: &str = "email: Invalid email";
pub const NEGATIVE_VALUE: &str = "value: Number must be greater than or equal to 0";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$",
        )
        .expect("email regex should compile")
    })
}

/// 邮箱格式检查（不允许以 '.' 开头或包含连续 '..'）
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && email_regex().is_match(email)
}

// ==========================================
// LeadRowValidator
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct LeadRowValidator;

impl RowValidator for LeadRowValidator {
    fn validate(&self, mapped: &MappedLead) -> Vec<String> {
        let mut errors = Vec::new();

        // 联系人：必填且去空白后非空
        let contact_ok = mapped
            .contact_name
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !contact_ok {
            errors.push(CONTACT_NAME_REQUIRED.to_string());
        }

        // 邮箱：空或合法格式（按原值校验，首尾空白视为格式错误）
        if let Some(email) = mapped.email.as_deref() {
            if !email.is_empty() && !is_valid_email(email) {
                errors.push(INVALID_EMAIL.to_string());
            }
        }

        // 金额：有限且 >= 0
        if let Some(value) = mapped.value {
            if !value.is_finite() || value < 0.0 {
                errors.push(NEGATIVE_VALUE.to_string());
            }
        }

        // payment_terms 由类型保证为规范值或空

        errors
    }
}
