// ==========================================
// 销售管道 CRM - 跟进活动与任务仓储
// ==========================================
// 职责: activities / tasks 表 CRUD
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::activity::{Activity, NewActivity, NewTask, Task};
use crate::domain::types::{ActivityType, TaskStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

fn conversion_error(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("未知枚举值: {}", raw).into(),
    )
}

fn map_activity_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let raw_type: String = row.get(2)?;
    Ok(Activity {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        activity_type: ActivityType::from_db_str(&raw_type)
            .ok_or_else(|| conversion_error(2, &raw_type))?,
        title: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let raw_status: String = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        status: TaskStatus::from_db_str(&raw_status)
            .ok_or_else(|| conversion_error(5, &raw_status))?,
        completed_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const TASK_COLUMNS: &str =
    "id, lead_id, title, description, due_date, status, completed_at, created_at";

// ==========================================
// ActivityRepository - 跟进记录仓储
// ==========================================
pub struct ActivityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActivityRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, new_activity: &NewActivity) -> RepositoryResult<Activity> {
        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            lead_id: new_activity.lead_id.clone(),
            activity_type: new_activity.activity_type,
            title: new_activity.title.clone(),
            description: new_activity.description.clone(),
            created_at: Utc::now(),
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO activities (id, lead_id, type, title, description, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                activity.id,
                activity.lead_id,
                activity.activity_type.as_str(),
                activity.title,
                activity.description,
                activity.created_at.to_rfc3339(),
            ],
        )?;

        Ok(activity)
    }

    /// 线索时间线（最新在前）
    pub fn list_by_lead(&self, lead_id: &str) -> RepositoryResult<Vec<Activity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, lead_id, type, title, description, created_at
               FROM activities WHERE lead_id = ?1
               ORDER BY created_at DESC, rowid DESC"#,
        )?;
        let activities = stmt
            .query_map(params![lead_id], map_activity_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }
}

// ==========================================
// TaskRepository - 跟进任务仓储
// ==========================================
pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, new_task: &NewTask) -> RepositoryResult<Task> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            lead_id: new_task.lead_id.clone(),
            title: new_task.title.clone(),
            description: new_task.description.clone(),
            due_date: new_task.due_date,
            status: TaskStatus::Pending,
            completed_at: None,
            created_at: Utc::now(),
        };

        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                TASK_COLUMNS
            ),
            params![
                task.id,
                task.lead_id,
                task.title,
                task.description,
                task.due_date.format("%Y-%m-%d").to_string(),
                task.status.as_str(),
                Option::<String>::None,
                task.created_at.to_rfc3339(),
            ],
        )?;

        Ok(task)
    }

    pub fn find_by_id(&self, task_id: &str) -> RepositoryResult<Option<Task>> {
        let conn = self.get_conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                map_task_row,
            )
            .optional()?;
        Ok(task)
    }

    /// 线索任务（按截止日升序）
    pub fn list_by_lead(&self, lead_id: &str) -> RepositoryResult<Vec<Task>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE lead_id = ?1 ORDER BY due_date, created_at",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![lead_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// 所有截止日早于 today 的待办任务
    pub fn list_overdue(&self, today: NaiveDate) -> RepositoryResult<Vec<Task>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE status = 'pending' AND due_date < ?1 ORDER BY due_date",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![today.format("%Y-%m-%d").to_string()], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// 设置任务状态
    ///
    /// completed → 写入 completed_at；pending → 清空 completed_at
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> RepositoryResult<Task> {
        let completed_at = match status {
            TaskStatus::Completed => Some(Utc::now().to_rfc3339()),
            TaskStatus::Pending => None,
        };

        {
            let conn = self.get_conn()?;
            let affected = conn.execute(
                "UPDATE tasks SET status = ?2, completed_at = ?3 WHERE id = ?1",
                params![task_id, status.as_str(), completed_at],
            )?;
            if affected == 0 {
                return Err(RepositoryError::not_found("Task", task_id));
            }
        }

        self.find_by_id(task_id)?
            .ok_or_else(|| RepositoryError::not_found("Task", task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema, seed_default_pipeline};
    use crate::domain::lead::NewLead;
    use crate::repository::lead_repo::LeadRepository;

    fn setup() -> (Arc<Mutex<Connection>>, String) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        seed_default_pipeline(&conn).unwrap();
        let stage_id: String = conn
            .query_row("SELECT id FROM stages ORDER BY order_index LIMIT 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let lead = LeadRepository::new(conn.clone())
            .append(&stage_id, &NewLead::with_contact("Ada"))
            .unwrap();
        (conn, lead.id)
    }

    #[test]
    fn test_activity_timeline_newest_first() {
        let (conn, lead_id) = setup();
        let repo = ActivityRepository::new(conn);

        for title in ["first", "second"] {
            repo.insert(&NewActivity {
                lead_id: lead_id.clone(),
                activity_type: ActivityType::Note,
                title: title.to_string(),
                description: None,
            })
            .unwrap();
        }

        let titles: Vec<String> = repo
            .list_by_lead(&lead_id)
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn test_task_complete_and_reopen() {
        let (conn, lead_id) = setup();
        let repo = TaskRepository::new(conn);
        let due = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();

        let task = repo
            .insert(&NewTask {
                lead_id,
                title: "Call back".to_string(),
                description: None,
                due_date: due,
            })
            .unwrap();

        let done = repo.set_status(&task.id, TaskStatus::Completed).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.due_date, due);

        let reopened = repo.set_status(&task.id, TaskStatus::Pending).unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.completed_at.is_none());

        let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(repo.list_overdue(today).unwrap().len(), 1);
    }

    #[test]
    fn test_set_status_missing_task() {
        let (conn, _) = setup();
        let repo = TaskRepository::new(conn);
        let err = repo.set_status("missing", TaskStatus::Completed).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_lead_delete_cascades() {
        let (conn, lead_id) = setup();
        let activities = ActivityRepository::new(conn.clone());
        activities
            .insert(&NewActivity {
                lead_id: lead_id.clone(),
                activity_type: ActivityType::Call,
                title: "Intro call".to_string(),
                description: None,
            })
            .unwrap();

        LeadRepository::new(conn).delete_with_reindex(&lead_id).unwrap();

        assert!(activities.list_by_lead(&lead_id).unwrap().is_empty());
    }
}
