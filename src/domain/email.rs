// ==========================================
// 销售管道 CRM - 邮件账户模型
// ==========================================
// 说明: 令牌刷新/OAuth 握手由外部发送方负责，此处不建模
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAccount {
    pub id: String,
    pub provider: String, // 目前仅 "outlook"
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// 待发送邮件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}
