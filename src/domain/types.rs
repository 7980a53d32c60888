// ==========================================
// 销售管道 CRM - 领域类型定义
// ==========================================
// 职责: 枚举类型 + 与数据库文本值的双向转换
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 付款方式 (Payment Terms)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    OneTime, // 一次性
    Monthly, // 按月
    Hourly,  // 按小时
}

impl PaymentTerms {
    /// 数据库文本值
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::OneTime => "one_time",
            PaymentTerms::Monthly => "monthly",
            PaymentTerms::Hourly => "hourly",
        }
    }

    /// 严格解析（仅接受规范值）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(PaymentTerms::OneTime),
            "monthly" => Some(PaymentTerms::Monthly),
            "hourly" => Some(PaymentTerms::Hourly),
            _ => None,
        }
    }

    /// 宽松解析（导入场景，支持同义词）
    ///
    /// - "one time" / "onetime" / "one_time" / "one-time" → OneTime
    /// - "monthly" / "month" / "per month" → Monthly
    /// - "hourly" / "hour" / "per hour" → Hourly
    /// - 其他 → None
    pub fn from_synonym(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "one time" | "onetime" | "one_time" | "one-time" => Some(PaymentTerms::OneTime),
            "monthly" | "month" | "per month" => Some(PaymentTerms::Monthly),
            "hourly" | "hour" | "per hour" => Some(PaymentTerms::Hourly),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 跟进活动类型 (Activity Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Note,    // 备注
    Call,    // 电话
    Email,   // 邮件
    Meeting, // 会议
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Note => "note",
            ActivityType::Call => "call",
            ActivityType::Email => "email",
            ActivityType::Meeting => "meeting",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "note" => Some(ActivityType::Note),
            "call" => Some(ActivityType::Call),
            "email" => Some(ActivityType::Email),
            "meeting" => Some(ActivityType::Meeting),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 任务状态 (Task Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,   // 待办
    Completed, // 已完成
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
