// ==========================================
// 销售管道 CRM - 线索领域模型
// ==========================================
// 红线: position_index 在阶段内必须连续 (0..n-1)
// 红线: position_index 只能由 PositionIndexManager 写入
// ==========================================

use crate::domain::types::PaymentTerms;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Lead - 销售线索
// ==========================================
// 对齐: leads 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    // ===== 主键与关联 =====
    pub id: String,       // UUID v4
    pub stage_id: String, // 所属阶段（FK → stages）

    // ===== 联系信息 =====
    pub contact_name: String,         // 联系人（必填，非空）
    pub company_name: Option<String>, // 公司
    pub email: Option<String>,        // 邮箱（合法格式或空）
    pub phone: Option<String>,        // 电话（自由文本）

    // ===== 商机信息 =====
    pub value: Option<f64>,                   // 金额（>= 0）
    pub payment_terms: Option<PaymentTerms>,  // 付款方式
    pub notes: Option<String>,                // 备注

    // ===== 看板排序 =====
    pub position_index: i64, // 阶段内排序号（从 0 开始，连续）

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// NewLead - 新建线索请求
// ==========================================
// 说明: 不含 id / position_index / 时间戳，由仓储层分配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub contact_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub payment_terms: Option<PaymentTerms>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewLead {
    /// 仅联系人的最小线索
    pub fn with_contact(contact_name: impl Into<String>) -> Self {
        Self {
            contact_name: contact_name.into(),
            ..Default::default()
        }
    }
}

// ==========================================
// LeadUpdate - 字段编辑（不涉及排序）
// ==========================================
// 语义:
// - 外层 None: 不修改该字段
// - Some(None): 清空该字段
// - Some(Some(v)): 设置新值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadUpdate {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<Option<String>>,
    #[serde(default)]
    pub email: Option<Option<String>>,
    #[serde(default)]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub value: Option<Option<f64>>,
    #[serde(default)]
    pub payment_terms: Option<Option<PaymentTerms>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
}

impl LeadUpdate {
    pub fn is_empty(&self) -> bool {
        self.contact_name.is_none()
            && self.company_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.value.is_none()
            && self.payment_terms.is_none()
            && self.notes.is_none()
    }

    /// 文本去首尾空白；可空文本的空串视为清空
    pub fn normalized(&self) -> LeadUpdate {
        let clean = |v: &Option<Option<String>>| {
            v.as_ref().map(|inner| {
                inner
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        };
        LeadUpdate {
            contact_name: self.contact_name.as_ref().map(|s| s.trim().to_string()),
            company_name: clean(&self.company_name),
            email: clean(&self.email),
            phone: clean(&self.phone),
            value: self.value,
            payment_terms: self.payment_terms,
            notes: clean(&self.notes),
        }
    }

    /// 将编辑应用到线索上（不修改 position_index / stage_id）
    pub fn apply_to(&self, lead: &mut Lead) {
        if let Some(name) = &self.contact_name {
            lead.contact_name = name.clone();
        }
        if let Some(v) = &self.company_name {
            lead.company_name = v.clone();
        }
        if let Some(v) = &self.email {
            lead.email = v.clone();
        }
        if let Some(v) = &self.phone {
            lead.phone = v.clone();
        }
        if let Some(v) = self.value {
            lead.value = v;
        }
        if let Some(v) = self.payment_terms {
            lead.payment_terms = v;
        }
        if let Some(v) = &self.notes {
            lead.notes = v.clone();
        }
    }
}

// ==========================================
// LeadFilter - 线索列表筛选
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilter {
    /// 关键字（联系人/公司/邮箱/电话，不区分大小写的子串匹配）
    #[serde(default)]
    pub search: Option<String>,
    /// 限定阶段（空 = 全部阶段）
    #[serde(default)]
    pub stage_ids: Vec<String>,
}

impl LeadFilter {
    /// 规范化后的关键字（小写，空白视为未设置）
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn includes_stage(&self, stage_id: &str) -> bool {
        self.stage_ids.is_empty() || self.stage_ids.iter().any(|id| id == stage_id)
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        if !self.includes_stage(&lead.stage_id) {
            return false;
        }
        let Some(needle) = self.needle() else {
            return true;
        };

        [
            Some(lead.contact_name.as_str()),
            lead.company_name.as_deref(),
            lead.email.as_deref(),
            lead.phone.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&needle))
    }
}

// ==========================================
// MoveLeadRequest - 拖拽移动请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLeadRequest {
    pub lead_id: String,
    pub target_stage_id: String,
    pub target_position: i64, // 插入位置（从 0 开始，越界时截断）
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        let now = Utc::now();
        Lead {
            id: "lead-1".to_string(),
            stage_id: "stage-1".to_string(),
            contact_name: "Ada".to_string(),
            company_name: Some("Acme".to_string()),
            email: None,
            phone: None,
            value: Some(100.0),
            payment_terms: None,
            notes: None,
            position_index: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_update_apply_keeps_position() {
        let mut lead = sample_lead();
        let update = LeadUpdate {
            contact_name: Some("Grace".to_string()),
            company_name: Some(None),
            value: Some(Some(250.0)),
            payment_terms: Some(Some(PaymentTerms::Monthly)),
            ..Default::default()
        };

        update.apply_to(&mut lead);

        assert_eq!(lead.contact_name, "Grace");
        assert_eq!(lead.company_name, None);
        assert_eq!(lead.value, Some(250.0));
        assert_eq!(lead.payment_terms, Some(PaymentTerms::Monthly));
        assert_eq!(lead.position_index, 3);
        assert_eq!(lead.stage_id, "stage-1");
    }

    #[test]
    fn test_update_is_empty() {
        assert!(LeadUpdate::default().is_empty());
        let update = LeadUpdate {
            notes: Some(Some("x".to_string())),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_filter_matches_text_fields_and_stages() {
        let mut lead = sample_lead();
        lead.company_name = Some("Analytical Engines".to_string());
        lead.phone = Some("+44 555 0100".to_string());

        assert!(LeadFilter::default().matches(&lead));

        let by_company = LeadFilter {
            search: Some("  ENGINES ".to_string()),
            ..Default::default()
        };
        assert!(by_company.matches(&lead));

        let by_phone = LeadFilter {
            search: Some("555".to_string()),
            ..Default::default()
        };
        assert!(by_phone.matches(&lead));

        let miss = LeadFilter {
            search: Some("hopper".to_string()),
            ..Default::default()
        };
        assert!(!miss.matches(&lead));

        let other_stage = LeadFilter {
            stage_ids: vec!["other".to_string()],
            ..Default::default()
        };
        assert!(!other_stage.matches(&lead));
        assert!(!other_stage.includes_stage(&lead.stage_id));
    }

    #[test]
    fn test_update_normalized_trims_and_clears() {
        let update = LeadUpdate {
            contact_name: Some("  Ada  ".to_string()),
            company_name: Some(Some(" Acme ".to_string())),
            email: Some(Some(String::new())),
            notes: Some(None),
            ..Default::default()
        }
        .normalized();

        assert_eq!(update.contact_name.as_deref(), Some("Ada"));
        assert_eq!(update.company_name, Some(Some("Acme".to_string())));
        assert_eq!(update.email, Some(None));
        assert_eq!(update.notes, Some(None));
        assert_eq!(update.phone, None);
    }
}
