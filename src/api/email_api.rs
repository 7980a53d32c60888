// ==========================================
// 销售管道 CRM - 邮件API
// ==========================================
// 职责: 邮件账户登记、向线索发送邮件并记录时间线
// 红线: 发送失败不写入任何跟进记录
// 说明: 实际投递（含令牌刷新）由 EmailSender 实现方负责
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::activity::{Activity, NewActivity};
use crate::domain::email::{EmailAccount, OutgoingEmail};
use crate::domain::types::ActivityType;
use crate::importer::is_valid_email;
use crate::repository::activity_repo::ActivityRepository;
use crate::repository::email_account_repo::EmailAccountRepository;
use crate::repository::error::RepositoryError;
use crate::repository::lead_repo::LeadRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 支持的邮件服务商
pub const SUPPORTED_PROVIDERS: &[&str] = &["outlook"];

// ==========================================
// EmailSender Trait - 外部投递协作方
// ==========================================
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// 以指定账户发送一封邮件
    async fn send(&self, account: &EmailAccount, email: &OutgoingEmail) -> anyhow::Result<()>;
}

/// 邮件API
pub struct EmailApi<E: ?Sized + EmailSender> {
    sender: Arc<E>,
    accounts: Arc<EmailAccountRepository>,
    leads: Arc<LeadRepository>,
    activities: Arc<ActivityRepository>,
}

impl<E: ?Sized + EmailSender> EmailApi<E> {
    pub fn new(
        sender: Arc<E>,
        accounts: Arc<EmailAccountRepository>,
        leads: Arc<LeadRepository>,
        activities: Arc<ActivityRepository>,
    ) -> Self {
        Self {
            sender,
            accounts,
            leads,
            activities,
        }
    }

    /// 登记邮件账户
    pub fn connect_account(&self, provider: &str, email: &str) -> ApiResult<EmailAccount> {
        let provider = provider.trim().to_lowercase();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(ApiError::InvalidInput(format!("不支持的邮件服务商: {}", provider)));
        }
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ApiError::ValidationError(format!("邮箱格式无效: {}", email)));
        }

        let account = self.accounts.insert(&provider, email)?;
        info!(account_id = %account.id, provider = %account.provider, "邮件账户已登记");
        Ok(account)
    }

    pub fn list_accounts(&self) -> ApiResult<Vec<EmailAccount>> {
        Ok(self.accounts.list_all()?)
    }

    /// 向线索发送邮件
    ///
    /// 成功后在线索时间线追加一条 email 记录（标题=主题，描述=正文）
    #[instrument(skip(self, subject, body))]
    pub async fn send_to_lead(
        &self,
        account_id: &str,
        lead_id: &str,
        subject: &str,
        body: &str,
    ) -> ApiResult<Activity> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(ApiError::InvalidInput("邮件主题不能为空".to_string()));
        }

        let account = self
            .accounts
            .find_by_id(account_id)?
            .ok_or_else(|| RepositoryError::not_found("EmailAccount", account_id))?;
        let lead = self
            .leads
            .find_by_id(lead_id)?
            .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))?;

        let to = match lead.email.as_deref().map(str::trim) {
            Some(addr) if is_valid_email(addr) => addr.to_string(),
            Some(addr) => {
                return Err(ApiError::ValidationError(format!("线索邮箱格式无效: {}", addr)))
            }
            None => return Err(ApiError::BusinessRuleViolation("线索未填写邮箱".to_string())),
        };

        let outgoing = OutgoingEmail {
            to,
            subject: subject.to_string(),
            body: body.to_string(),
        };
        if let Err(e) = self.sender.send(&account, &outgoing).await {
            warn!(error = %e, "邮件发送失败");
            return Err(ApiError::ExternalServiceError(e.to_string()));
        }

        let activity = self.activities.insert(&NewActivity {
            lead_id: lead.id.clone(),
            activity_type: ActivityType::Email,
            title: outgoing.subject,
            description: Some(outgoing.body).filter(|b| !b.trim().is_empty()),
        })?;
        info!(activity_id = %activity.id, to = %outgoing.to, "邮件已发送");
        Ok(activity)
    }
}
