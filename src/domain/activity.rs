// ==========================================
// 销售管道 CRM - 跟进活动与任务模型
// ==========================================
// 对齐: activities / tasks 表
// 说明: 删除线索时级联删除
// ==========================================

use crate::domain::types::{ActivityType, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Activity - 跟进记录（时间线）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub lead_id: String,
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub lead_id: String,
    pub activity_type: ActivityType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ==========================================
// Task - 跟进任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub lead_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// 是否逾期（待办且截止日早于 today）
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == TaskStatus::Pending && self.due_date < today
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub lead_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
}
