// ==========================================
// 销售管道 CRM - 排序号管理器
// ==========================================
// 职责: 阶段内 position_index 的唯一写入口（新建/批量追加/移动/删除）
// 红线: 每次操作完成后阶段内排序号必须为 0..n-1
// 红线: 所有排序写操作经全局锁串行化，杜绝并发读到同一快照
// ==========================================

use crate::domain::lead::{Lead, MoveLeadRequest, NewLead};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::lead_store::LeadStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// 排序号是否恰为 0..n-1（输入须已升序）
pub fn is_contiguous(sorted_positions: &[i64]) -> bool {
    sorted_positions
        .iter()
        .enumerate()
        .all(|(expected, &actual)| actual == expected as i64)
}

// ==========================================
// ContiguityReport - 阶段连续性诊断结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContiguityReport {
    pub stage_id: String,
    pub stage_name: String,
    pub lead_count: usize,
    pub is_contiguous: bool,
    pub positions: Vec<i64>,
}

// ==========================================
// PositionIndexManager
// ==========================================
pub struct PositionIndexManager<S: ?Sized>
where
    S: LeadStore,
{
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: ?Sized> PositionIndexManager<S>
where
    S: LeadStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 移动线索（拖拽落点）
    ///
    /// # 错误
    /// - NotFound: 线索或目标阶段不存在，不做任何修改
    #[instrument(skip(self, request), fields(
        lead_id = %request.lead_id,
        target_stage_id = %request.target_stage_id,
        target_position = request.target_position
    ))]
    pub async fn move_lead(&self, request: &MoveLeadRequest) -> RepositoryResult<Lead> {
        let _guard = self.write_lock.lock().await;

        let before = self
            .store
            .get_lead(&request.lead_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Lead", &request.lead_id))?;

        let moved = self
            .store
            .move_lead(
                &request.lead_id,
                &request.target_stage_id,
                request.target_position.max(0),
            )
            .await?;

        if before.stage_id == moved.stage_id && before.position_index == moved.position_index {
            debug!("位置未变化，跳过写入");
        } else {
            info!(
                from_stage = %before.stage_id,
                from_position = before.position_index,
                to_position = moved.position_index,
                "线索已移动"
            );
        }

        Ok(moved)
    }

    /// 批量追加到阶段末尾（导入提交路径）
    #[instrument(skip(self, leads), fields(stage_id = %stage_id, count = leads.len()))]
    pub async fn append_leads(
        &self,
        stage_id: &str,
        leads: Vec<NewLead>,
    ) -> RepositoryResult<Vec<Lead>> {
        let _guard = self.write_lock.lock().await;

        let inserted = self.store.bulk_insert_leads(stage_id, leads).await?;
        info!(inserted = inserted.len(), "批量追加完成");
        Ok(inserted)
    }

    /// 单条新建（追加到阶段末尾）
    pub async fn create_lead(&self, stage_id: &str, new_lead: NewLead) -> RepositoryResult<Lead> {
        let _guard = self.write_lock.lock().await;

        let lead = self.store.create_lead(stage_id, new_lead).await?;
        debug!(lead_id = %lead.id, position = lead.position_index, "线索已创建");
        Ok(lead)
    }

    /// 删除线索并关闭原阶段空位
    #[instrument(skip(self))]
    pub async fn delete_lead(&self, lead_id: &str) -> RepositoryResult<Lead> {
        let _guard = self.write_lock.lock().await;

        let deleted = self.store.delete_lead(lead_id).await?;
        info!(stage_id = %deleted.stage_id, position = deleted.position_index, "线索已删除");
        Ok(deleted)
    }

    /// 检查阶段排序号是否连续
    pub async fn verify_stage_contiguity(&self, stage_id: &str) -> RepositoryResult<ContiguityReport> {
        let stage = self
            .store
            .get_stage(stage_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Stage", stage_id))?;

        let positions = self.store.stage_positions(stage_id).await?;
        Ok(ContiguityReport {
            stage_id: stage.id,
            stage_name: stage.name,
            lead_count: positions.len(),
            is_contiguous: is_contiguous(&positions),
            positions,
        })
    }

    /// 检查所有阶段
    pub async fn verify_all_stages(&self) -> RepositoryResult<Vec<ContiguityReport>> {
        let stages = self.store.list_stages(None).await?;
        let mut reports = Vec::with_capacity(stages.len());
        for stage in stages {
            reports.push(self.verify_stage_contiguity(&stage.id).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_contiguous() {
        assert!(is_contiguous(&[]));
        assert!(is_contiguous(&[0, 1, 2]));
        assert!(!is_contiguous(&[0, 2]));
        assert!(!is_contiguous(&[1, 2]));
        assert!(!is_contiguous(&[0, 0, 1]));
    }
}
