// ==========================================
// 销售管道 CRM - 线索存储实现 (SQLite)
// ==========================================
// 职责: 组合 LeadRepository / StageRepository 实现 LeadStore
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::lead::{Lead, LeadUpdate, NewLead};
use crate::domain::pipeline::Stage;
use crate::repository::error::RepositoryResult;
use crate::repository::lead_repo::LeadRepository;
use crate::repository::lead_store::LeadStore;
use crate::repository::stage_repo::StageRepository;
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

// ==========================================
// SqliteLeadStore
// ==========================================
pub struct SqliteLeadStore {
    leads: LeadRepository,
    stages: StageRepository,
}

impl SqliteLeadStore {
    /// 从共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            leads: LeadRepository::new(conn.clone()),
            stages: StageRepository::new(conn),
        }
    }

    /// 打开数据库文件创建（独立连接）
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }
}

#[async_trait]
impl LeadStore for SqliteLeadStore {
    async fn get_leads(&self) -> RepositoryResult<Vec<Lead>> {
        self.leads.list_all()
    }

    async fn get_leads_by_stage(&self, stage_id: &str) -> RepositoryResult<Vec<Lead>> {
        self.leads.list_by_stage(stage_id)
    }

    async fn get_lead(&self, lead_id: &str) -> RepositoryResult<Option<Lead>> {
        self.leads.find_by_id(lead_id)
    }

    async fn get_stage(&self, stage_id: &str) -> RepositoryResult<Option<Stage>> {
        self.stages.find_by_id(stage_id)
    }

    async fn list_stages(&self, pipeline_id: Option<&str>) -> RepositoryResult<Vec<Stage>> {
        self.stages.list(pipeline_id)
    }

    async fn stage_positions(&self, stage_id: &str) -> RepositoryResult<Vec<i64>> {
        self.leads.positions_by_stage(stage_id)
    }

    async fn create_lead(&self, stage_id: &str, new_lead: NewLead) -> RepositoryResult<Lead> {
        self.leads.append(stage_id, &new_lead)
    }

    async fn update_lead(&self, lead_id: &str, update: LeadUpdate) -> RepositoryResult<Lead> {
        self.leads.update_fields(lead_id, &update)
    }

    async fn delete_lead(&self, lead_id: &str) -> RepositoryResult<Lead> {
        self.leads.delete_with_reindex(lead_id)
    }

    async fn move_lead(
        &self,
        lead_id: &str,
        target_stage_id: &str,
        target_position: i64,
    ) -> RepositoryResult<Lead> {
        self.leads.move_lead(lead_id, target_stage_id, target_position)
    }

    async fn bulk_insert_leads(
        &self,
        stage_id: &str,
        leads: Vec<NewLead>,
    ) -> RepositoryResult<Vec<Lead>> {
        self.leads.bulk_append(stage_id, &leads)
    }
}
