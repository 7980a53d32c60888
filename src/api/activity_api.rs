// ==========================================
// 销售管道 CRM - 跟进活动与任务API
// ==========================================
// 职责: 线索时间线记录、跟进任务的新建/完成/重开/逾期查询
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::activity::{Activity, NewActivity, NewTask, Task};
use crate::domain::types::TaskStatus;
use crate::repository::activity_repo::{ActivityRepository, TaskRepository};
use crate::repository::error::RepositoryError;
use crate::repository::lead_repo::LeadRepository;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

/// 跟进API
pub struct ActivityApi {
    leads: Arc<LeadRepository>,
    activities: Arc<ActivityRepository>,
    tasks: Arc<TaskRepository>,
}

impl ActivityApi {
    pub fn new(
        leads: Arc<LeadRepository>,
        activities: Arc<ActivityRepository>,
        tasks: Arc<TaskRepository>,
    ) -> Self {
        Self {
            leads,
            activities,
            tasks,
        }
    }

    fn require_lead(&self, lead_id: &str) -> ApiResult<()> {
        if lead_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("lead_id不能为空".to_string()));
        }
        self.leads
            .find_by_id(lead_id)?
            .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))?;
        Ok(())
    }

    // ==========================================
    // 时间线
    // ==========================================

    pub fn add_activity(&self, new_activity: NewActivity) -> ApiResult<Activity> {
        let title = new_activity.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::InvalidInput("标题不能为空".to_string()));
        }
        self.require_lead(&new_activity.lead_id)?;

        let activity = self.activities.insert(&NewActivity {
            title,
            description: new_activity.description.filter(|d| !d.trim().is_empty()),
            ..new_activity
        })?;
        debug!(
            activity_id = %activity.id,
            lead_id = %activity.lead_id,
            activity_type = %activity.activity_type,
            "跟进记录已添加"
        );
        Ok(activity)
    }

    /// 线索时间线（最新在前）
    pub fn list_activities(&self, lead_id: &str) -> ApiResult<Vec<Activity>> {
        self.require_lead(lead_id)?;
        Ok(self.activities.list_by_lead(lead_id)?)
    }

    // ==========================================
    // 任务
    // ==========================================

    pub fn add_task(&self, new_task: NewTask) -> ApiResult<Task> {
        let title = new_task.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::InvalidInput("标题不能为空".to_string()));
        }
        self.require_lead(&new_task.lead_id)?;

        let task = self.tasks.insert(&NewTask {
            title,
            description: new_task.description.filter(|d| !d.trim().is_empty()),
            ..new_task
        })?;
        info!(task_id = %task.id, lead_id = %task.lead_id, due_date = %task.due_date, "任务已创建");
        Ok(task)
    }

    pub fn list_tasks(&self, lead_id: &str) -> ApiResult<Vec<Task>> {
        self.require_lead(lead_id)?;
        Ok(self.tasks.list_by_lead(lead_id)?)
    }

    /// 完成任务（记录完成时间）
    pub fn complete_task(&self, task_id: &str) -> ApiResult<Task> {
        self.set_task_status(task_id, TaskStatus::Completed)
    }

    /// 重开任务（清除完成时间）
    pub fn reopen_task(&self, task_id: &str) -> ApiResult<Task> {
        self.set_task_status(task_id, TaskStatus::Pending)
    }

    fn set_task_status(&self, task_id: &str, status: TaskStatus) -> ApiResult<Task> {
        if task_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("task_id不能为空".to_string()));
        }
        let task = self.tasks.set_status(task_id, status)?;
        info!(task_id = %task_id, status = %task.status, "任务状态已更新");
        Ok(task)
    }

    /// 逾期任务（待办且截止日早于 today）
    pub fn overdue_tasks(&self, today: NaiveDate) -> ApiResult<Vec<Task>> {
        Ok(self.tasks.list_overdue(today)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema, seed_default_pipeline};
    use crate::domain::lead::NewLead;
    use crate::domain::types::ActivityType;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> (ActivityApi, String) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        seed_default_pipeline(&conn).unwrap();
        let stage_id: String = conn
            .query_row("SELECT id FROM stages WHERE name = 'New'", [], |row| row.get(0))
            .unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let leads = Arc::new(LeadRepository::new(conn.clone()));
        let lead = leads.append(&stage_id, &NewLead::with_contact("Ada")).unwrap();
        let api = ActivityApi::new(
            leads,
            Arc::new(ActivityRepository::new(conn.clone())),
            Arc::new(TaskRepository::new(conn)),
        );
        (api, lead.id)
    }

    #[test]
    fn test_activity_requires_title_and_lead() {
        let (api, lead_id) = setup();

        let blank = NewActivity {
            lead_id: lead_id.clone(),
            activity_type: ActivityType::Note,
            title: "  ".to_string(),
            description: None,
        };
        assert!(matches!(api.add_activity(blank), Err(ApiError::InvalidInput(_))));

        let orphan = NewActivity {
            lead_id: "missing".to_string(),
            activity_type: ActivityType::Call,
            title: "Intro call".to_string(),
            description: None,
        };
        assert!(matches!(api.add_activity(orphan), Err(ApiError::NotFound(_))));

        let ok = api
            .add_activity(NewActivity {
                lead_id: lead_id.clone(),
                activity_type: ActivityType::Call,
                title: "Intro call".to_string(),
                description: Some(String::new()),
            })
            .unwrap();
        assert_eq!(ok.description, None);
        assert_eq!(api.list_activities(&lead_id).unwrap().len(), 1);
    }

    #[test]
    fn test_complete_and_reopen_task() {
        let (api, lead_id) = setup();
        let due = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let task = api
            .add_task(NewTask {
                lead_id,
                title: "Send proposal".to_string(),
                description: None,
                due_date: due,
            })
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(api.overdue_tasks(today).unwrap().len(), 1);

        let done = api.complete_task(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(api.overdue_tasks(today).unwrap().is_empty());

        let reopened = api.reopen_task(&task.id).unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert_eq!(reopened.completed_at, None);

        assert!(matches!(api.complete_task("missing"), Err(ApiError::NotFound(_))));
    }
}
