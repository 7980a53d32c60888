// ==========================================
// 销售管道 CRM - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{
    ActivityApi, ConfigApi, EmailApi, EmailSender, ImportApi, LeadApi, PipelineApi,
};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, seed_default_pipeline};
use crate::engine::PositionIndexManager;
use crate::repository::{
    ActivityRepository, EmailAccountRepository, LeadRepository, PipelineRepository,
    SqliteLeadStore, StageRepository, TaskRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排序号管理器（所有排序写入的唯一入口）
    pub position_manager: Arc<PositionIndexManager<SqliteLeadStore>>,

    /// 管道/阶段API
    pub pipeline_api: Arc<PipelineApi>,

    /// 线索API
    pub lead_api: Arc<LeadApi<SqliteLeadStore>>,

    /// 线索导入API
    pub import_api: Arc<ImportApi<SqliteLeadStore, ConfigManager>>,

    /// 跟进活动与任务API
    pub activity_api: Arc<ActivityApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,

    // 邮件API按发送方按需组装
    lead_repo: Arc<LeadRepository>,
    activity_repo: Arc<ActivityRepository>,
    email_account_repo: Arc<EmailAccountRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表（幂等）
    /// 2. 空库时写入默认管道与阶段
    /// 3. 初始化所有Repository与API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        if let Some(pipeline_id) =
            seed_default_pipeline(&conn).map_err(|e| format!("默认管道写入失败: {}", e))?
        {
            tracing::info!(pipeline_id = %pipeline_id, "已写入默认管道");
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 仓储层
        // ==========================================
        let pipeline_repo = Arc::new(PipelineRepository::new(conn.clone()));
        let stage_repo = Arc::new(StageRepository::new(conn.clone()));
        let lead_repo = Arc::new(LeadRepository::new(conn.clone()));
        let activity_repo = Arc::new(ActivityRepository::new(conn.clone()));
        let task_repo = Arc::new(TaskRepository::new(conn.clone()));
        let email_account_repo = Arc::new(EmailAccountRepository::new(conn.clone()));
        let lead_store = Arc::new(SqliteLeadStore::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 引擎层
        // ==========================================
        let position_manager = Arc::new(PositionIndexManager::new(lead_store));

        // ==========================================
        // API层
        // ==========================================
        let pipeline_api = Arc::new(PipelineApi::new(pipeline_repo, stage_repo));
        let lead_api = Arc::new(LeadApi::new(position_manager.clone()));
        let import_api = Arc::new(ImportApi::new(
            position_manager.clone(),
            config_manager.clone(),
        ));
        let activity_api = Arc::new(ActivityApi::new(
            lead_repo.clone(),
            activity_repo.clone(),
            task_repo,
        ));
        let config_api = Arc::new(ConfigApi::new(config_manager));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            position_manager,
            pipeline_api,
            lead_api,
            import_api,
            activity_api,
            config_api,
            lead_repo,
            activity_repo,
            email_account_repo,
        })
    }

    /// 用指定发送方组装邮件API
    pub fn email_api<E: ?Sized + EmailSender>(&self, sender: Arc<E>) -> EmailApi<E> {
        EmailApi::new(
            sender,
            self.email_account_repo.clone(),
            self.lead_repo.clone(),
            self.activity_repo.clone(),
        )
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 PIPELINE_CRM_DB_PATH（若设置）
/// - 开发环境: 用户数据目录/pipeline-crm-dev/pipeline_crm.db
/// - 生产环境: 用户数据目录/pipeline-crm/pipeline_crm.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PIPELINE_CRM_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 拿不到用户数据目录时落在当前目录
    let mut path = PathBuf::from("./pipeline_crm.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("pipeline-crm-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("pipeline-crm");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("pipeline_crm.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_seeds_once() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.pipeline_api.list_pipelines().unwrap().len(), 1);
        assert_eq!(state.get_db_path(), db_path);
        drop(state);

        let reopened = AppState::new(db_path).unwrap();
        assert_eq!(reopened.pipeline_api.list_pipelines().unwrap().len(), 1);
        assert_eq!(reopened.pipeline_api.list_stages(None).unwrap().len(), 6);
    }
}
