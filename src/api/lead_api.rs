// ==========================================
// 销售管道 CRM - 线索API
// ==========================================
// 职责: 看板查询、线索增删改、拖拽移动
// 红线: 所有排序写入经由 PositionIndexManager
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::MappedLead;
use crate::domain::lead::{Lead, LeadFilter, LeadUpdate, MoveLeadRequest, NewLead};
use crate::domain::pipeline::Stage;
use crate::engine::{ContiguityReport, PositionIndexManager};
use crate::importer::row_validator::CONTACT_NAME_REQUIRED;
use crate::importer::{LeadRowValidator, RowValidator};
use crate::repository::error::RepositoryError;
use crate::repository::lead_store::LeadStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// 看板列（阶段 + 按排序号排列的线索）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageColumn {
    pub stage: Stage,
    pub leads: Vec<Lead>,
    /// 阶段内金额合计（未填金额按 0 计）
    pub total_value: f64,
}

/// 线索API
pub struct LeadApi<S: ?Sized + LeadStore> {
    manager: Arc<PositionIndexManager<S>>,
    validator: LeadRowValidator,
}

impl<S: ?Sized + LeadStore> LeadApi<S> {
    pub fn new(manager: Arc<PositionIndexManager<S>>) -> Self {
        Self {
            manager,
            validator: LeadRowValidator,
        }
    }

    fn store(&self) -> &Arc<S> {
        self.manager.store()
    }

    fn validate_fields(&self, fields: &MappedLead) -> ApiResult<()> {
        let errors = self.validator.validate(fields);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError(errors.join("; ")))
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 看板视图（阶段按 order_index，线索按 position_index）
    pub async fn get_board(&self, pipeline_id: Option<&str>) -> ApiResult<Vec<StageColumn>> {
        let stages = self.store().list_stages(pipeline_id).await?;
        let mut columns = Vec::with_capacity(stages.len());
        for stage in stages {
            let leads = self.store().get_leads_by_stage(&stage.id).await?;
            let total_value = leads.iter().filter_map(|l| l.value).sum();
            columns.push(StageColumn {
                stage,
                leads,
                total_value,
            });
        }
        Ok(columns)
    }

    /// 线索列表（阶段按 order_index，阶段内按 position_index）
    ///
    /// 指定的阶段必须存在；关键字为空白时不过滤
    pub async fn list_leads(&self, filter: &LeadFilter) -> ApiResult<Vec<Lead>> {
        for stage_id in &filter.stage_ids {
            self.require_stage(stage_id).await?;
        }

        let mut leads = Vec::new();
        for stage in self.store().list_stages(None).await? {
            if !filter.includes_stage(&stage.id) {
                continue;
            }
            let stage_leads = self.store().get_leads_by_stage(&stage.id).await?;
            leads.extend(stage_leads.into_iter().filter(|lead| filter.matches(lead)));
        }
        Ok(leads)
    }

    pub async fn get_lead(&self, lead_id: &str) -> ApiResult<Lead> {
        if lead_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("lead_id不能为空".to_string()));
        }
        let lead = self
            .store()
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))?;
        Ok(lead)
    }

    async fn require_stage(&self, stage_id: &str) -> ApiResult<Stage> {
        if stage_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("stage_id不能为空".to_string()));
        }
        let stage = self
            .store()
            .get_stage(stage_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Stage", stage_id))?;
        Ok(stage)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新建线索（追加到阶段末尾）
    ///
    /// 文本字段去首尾空白，空串视为未填
    pub async fn create_lead(&self, stage_id: &str, new_lead: NewLead) -> ApiResult<Lead> {
        let fields = MappedLead::from(&new_lead);
        self.validate_fields(&fields)?;
        let normalized = fields
            .to_new_lead()
            .ok_or_else(|| ApiError::ValidationError(CONTACT_NAME_REQUIRED.to_string()))?;

        self.require_stage(stage_id).await?;
        let lead = self.manager.create_lead(stage_id, normalized).await?;
        info!(lead_id = %lead.id, stage_id = %stage_id, "线索已新建");
        Ok(lead)
    }

    /// 编辑线索字段（不改变阶段与排序号）
    ///
    /// 与新建一致：按原值校验，文本去首尾空白后写入，空串视为清空
    pub async fn update_lead(&self, lead_id: &str, update: LeadUpdate) -> ApiResult<Lead> {
        let current = self.get_lead(lead_id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let mut preview = current.clone();
        update.apply_to(&mut preview);
        self.validate_fields(&MappedLead::from(&preview))?;

        let updated = self.store().update_lead(lead_id, update.normalized()).await?;
        info!(lead_id = %lead_id, "线索已更新");
        Ok(updated)
    }

    /// 拖拽移动
    pub async fn move_lead(&self, request: MoveLeadRequest) -> ApiResult<Lead> {
        if request.lead_id.trim().is_empty() || request.target_stage_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "lead_id与target_stage_id不能为空".to_string(),
            ));
        }
        if request.target_position < 0 {
            warn!(target_position = request.target_position, "目标位置为负数，按 0 处理");
        }
        Ok(self.manager.move_lead(&request).await?)
    }

    /// 删除线索（级联删除跟进记录与任务，原阶段重排）
    pub async fn delete_lead(&self, lead_id: &str) -> ApiResult<Lead> {
        if lead_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("lead_id不能为空".to_string()));
        }
        Ok(self.manager.delete_lead(lead_id).await?)
    }

    /// 排序号连续性检查（全部阶段）
    pub async fn check_positions(&self) -> ApiResult<Vec<ContiguityReport>> {
        let reports = self.manager.verify_all_stages().await?;
        let broken = reports.iter().filter(|r| !r.is_contiguous).count();
        if broken > 0 {
            warn!(broken_stages = broken, "发现排序号不连续的阶段");
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema, seed_default_pipeline};
    use crate::repository::SqliteLeadStore;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> (LeadApi<SqliteLeadStore>, String) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        seed_default_pipeline(&conn).unwrap();
        let stage_id: String = conn
            .query_row("SELECT id FROM stages WHERE name = 'New'", [], |row| row.get(0))
            .unwrap();

        let store = Arc::new(SqliteLeadStore::new(Arc::new(Mutex::new(conn))));
        let manager = Arc::new(PositionIndexManager::new(store));
        (LeadApi::new(manager), stage_id)
    }

    #[tokio::test]
    async fn test_create_normalizes_and_appends() {
        let (api, stage_id) = setup();

        let first = api
            .create_lead(
                &stage_id,
                NewLead {
                    contact_name: "  Ada  ".to_string(),
                    email: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = api
            .create_lead(&stage_id, NewLead::with_contact("Grace"))
            .await
            .unwrap();

        assert_eq!(first.contact_name, "Ada");
        assert_eq!(first.email, None);
        assert_eq!(first.position_index, 0);
        assert_eq!(second.position_index, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_fields() {
        let (api, stage_id) = setup();

        let err = api
            .create_lead(
                &stage_id,
                NewLead {
                    contact_name: " ".to_string(),
                    email: Some("nope".to_string()),
                    value: Some(-3.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        match err {
            ApiError::ValidationError(msg) => {
                assert!(msg.contains("contact_name"));
                assert!(msg.contains("email"));
                assert!(msg.contains("value"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
        let in_stage = LeadFilter {
            stage_ids: vec![stage_id.clone()],
            ..Default::default()
        };
        assert!(api.list_leads(&in_stage).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_validates_merged_fields() {
        let (api, stage_id) = setup();
        let lead = api
            .create_lead(&stage_id, NewLead::with_contact("Ada"))
            .await
            .unwrap();

        let bad = LeadUpdate {
            email: Some(Some("broken@".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            api.update_lead(&lead.id, bad).await,
            Err(ApiError::ValidationError(_))
        ));

        let good = LeadUpdate {
            value: Some(Some(500.0)),
            ..Default::default()
        };
        let updated = api.update_lead(&lead.id, good).await.unwrap();
        assert_eq!(updated.value, Some(500.0));
        assert_eq!(updated.position_index, lead.position_index);
    }

    #[tokio::test]
    async fn test_update_trims_text_and_clears_blanks() {
        let (api, stage_id) = setup();
        let lead = api
            .create_lead(
                &stage_id,
                NewLead {
                    company_name: Some("Acme".to_string()),
                    ..NewLead::with_contact("Ada")
                },
            )
            .await
            .unwrap();

        let update = LeadUpdate {
            contact_name: Some("  Ada Lovelace ".to_string()),
            company_name: Some(Some("   ".to_string())),
            phone: Some(Some(" 555-0100 ".to_string())),
            ..Default::default()
        };
        let updated = api.update_lead(&lead.id, update).await.unwrap();
        assert_eq!(updated.contact_name, "Ada Lovelace");
        assert_eq!(updated.company_name, None);
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));

        let blank_name = LeadUpdate {
            contact_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            api.update_lead(&lead.id, blank_name).await,
            Err(ApiError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_leads_filters_by_search_and_stage() {
        let (api, new_stage) = setup();
        let stages = api.store().list_stages(None).await.unwrap();
        let later_stage = stages
            .iter()
            .find(|s| s.id != new_stage && s.order_index > 0)
            .map(|s| s.id.clone())
            .unwrap();

        let grace = api
            .create_lead(
                &later_stage,
                NewLead {
                    company_name: Some("US Navy".to_string()),
                    ..NewLead::with_contact("Grace")
                },
            )
            .await
            .unwrap();
        let ada = api
            .create_lead(
                &new_stage,
                NewLead {
                    email: Some("ada@engines.example".to_string()),
                    ..NewLead::with_contact("Ada")
                },
            )
            .await
            .unwrap();
        let alan = api
            .create_lead(
                &new_stage,
                NewLead {
                    phone: Some("+44 555 0199".to_string()),
                    ..NewLead::with_contact("Alan")
                },
            )
            .await
            .unwrap();

        // 无条件：阶段顺序优先，其次阶段内排序号
        let ids = |leads: Vec<Lead>| leads.into_iter().map(|l| l.id).collect::<Vec<_>>();
        let all = api.list_leads(&LeadFilter::default()).await.unwrap();
        assert_eq!(ids(all), vec![ada.id.clone(), alan.id.clone(), grace.id.clone()]);

        let by_company = LeadFilter {
            search: Some("NAVY".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(api.list_leads(&by_company).await.unwrap()), vec![grace.id.clone()]);

        let by_email = LeadFilter {
            search: Some("Engines".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(api.list_leads(&by_email).await.unwrap()), vec![ada.id.clone()]);

        let by_phone_in_stage = LeadFilter {
            search: Some("555".to_string()),
            stage_ids: vec![new_stage.clone()],
        };
        assert_eq!(
            ids(api.list_leads(&by_phone_in_stage).await.unwrap()),
            vec![alan.id.clone()]
        );

        let blank_search = LeadFilter {
            search: Some("   ".to_string()),
            stage_ids: vec![later_stage.clone(), new_stage.clone()],
        };
        assert_eq!(api.list_leads(&blank_search).await.unwrap().len(), 3);

        let unknown_stage = LeadFilter {
            stage_ids: vec!["no-such-stage".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            api.list_leads(&unknown_stage).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_board_groups_by_stage() {
        let (api, stage_id) = setup();
        api.create_lead(
            &stage_id,
            NewLead {
                contact_name: "Ada".to_string(),
                value: Some(100.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        api.create_lead(&stage_id, NewLead::with_contact("Grace"))
            .await
            .unwrap();

        let board = api.get_board(None).await.unwrap();
        assert_eq!(board.len(), 6);
        let column = board.iter().find(|c| c.stage.id == stage_id).unwrap();
        assert_eq!(column.leads.len(), 2);
        assert_eq!(column.total_value, 100.0);
    }

    #[tokio::test]
    async fn test_missing_lead_is_not_found() {
        let (api, _) = setup();
        assert!(matches!(api.get_lead("missing").await, Err(ApiError::NotFound(_))));
        assert!(matches!(api.delete_lead("missing").await, Err(ApiError::NotFound(_))));
        assert!(matches!(api.get_lead("").await, Err(ApiError::InvalidInput(_))));
    }
}
