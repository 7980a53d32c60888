// ==========================================
// 销售管道 CRM - 线索存储 Trait
// ==========================================
// 职责: 定义引擎/导入模块依赖的后端接口（不包含实现）
// 红线: 引擎与导入模块只依赖此 Trait，不直接依赖 rusqlite
// ==========================================

use crate::domain::lead::{Lead, LeadUpdate, NewLead};
use crate::domain::pipeline::Stage;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// LeadStore Trait
// ==========================================
// 实现者: SqliteLeadStore
#[async_trait]
pub trait LeadStore: Send + Sync {
    // ===== 查询 =====

    /// 全部线索（按阶段、排序号）
    async fn get_leads(&self) -> RepositoryResult<Vec<Lead>>;

    /// 阶段内线索（按排序号升序）
    async fn get_leads_by_stage(&self, stage_id: &str) -> RepositoryResult<Vec<Lead>>;

    async fn get_lead(&self, lead_id: &str) -> RepositoryResult<Option<Lead>>;

    async fn get_stage(&self, stage_id: &str) -> RepositoryResult<Option<Stage>>;

    /// 阶段列表（按 order_index），可按管道过滤
    async fn list_stages(&self, pipeline_id: Option<&str>) -> RepositoryResult<Vec<Stage>>;

    /// 阶段内排序号（升序）
    async fn stage_positions(&self, stage_id: &str) -> RepositoryResult<Vec<i64>>;

    // ===== 写入 =====

    /// 单条创建，追加到阶段末尾
    async fn create_lead(&self, stage_id: &str, new_lead: NewLead) -> RepositoryResult<Lead>;

    /// 字段编辑（不影响排序）
    async fn update_lead(&self, lead_id: &str, update: LeadUpdate) -> RepositoryResult<Lead>;

    /// 删除并关闭原阶段空位
    async fn delete_lead(&self, lead_id: &str) -> RepositoryResult<Lead>;

    /// 原子移动（截断目标位置，位置不变时不写库）
    ///
    /// # 错误
    /// - NotFound: 线索或目标阶段不存在（无任何修改）
    async fn move_lead(
        &self,
        lead_id: &str,
        target_stage_id: &str,
        target_position: i64,
    ) -> RepositoryResult<Lead>;

    /// 批量追加（原子），返回按输入顺序排列的新线索
    async fn bulk_insert_leads(
        &self,
        stage_id: &str,
        leads: Vec<NewLead>,
    ) -> RepositoryResult<Vec<Lead>>;
}
