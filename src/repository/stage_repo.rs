// ==========================================
// 销售管道 CRM - 管道与阶段仓储
// ==========================================
// 职责: pipelines / stages 表 CRUD
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::pipeline::{NewStage, Pipeline, Stage, DEFAULT_STAGE_COLOR};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const STAGE_COLUMNS: &str = "id, pipeline_id, name, color, order_index, created_at";

fn map_stage_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: row.get(0)?,
        pipeline_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        order_index: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_pipeline_row(row: &Row<'_>) -> rusqlite::Result<Pipeline> {
    Ok(Pipeline {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

// ==========================================
// PipelineRepository - 管道仓储
// ==========================================
pub struct PipelineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PipelineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建管道
    pub fn create(&self, name: &str) -> RepositoryResult<Pipeline> {
        let pipeline = Pipeline {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO pipelines (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![pipeline.id, pipeline.name, pipeline.created_at.to_rfc3339()],
        )?;

        Ok(pipeline)
    }

    /// 查询所有管道（按创建时间）
    pub fn list_all(&self) -> RepositoryResult<Vec<Pipeline>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM pipelines ORDER BY created_at, id")?;
        let pipelines = stmt
            .query_map([], map_pipeline_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pipelines)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Pipeline>> {
        let conn = self.get_conn()?;
        let pipeline = conn
            .query_row(
                "SELECT id, name, created_at FROM pipelines WHERE id = ?1",
                params![id],
                map_pipeline_row,
            )
            .optional()?;
        Ok(pipeline)
    }
}

// ==========================================
// StageRepository - 阶段仓储
// ==========================================
pub struct StageRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StageRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建阶段
    ///
    /// order_index 未指定时追加到管道末尾
    pub fn create(&self, new_stage: &NewStage) -> RepositoryResult<Stage> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let order_index = match new_stage.order_index {
            Some(idx) => idx,
            None => tx.query_row(
                "SELECT COALESCE(MAX(order_index) + 1, 0) FROM stages WHERE pipeline_id = ?1",
                params![new_stage.pipeline_id],
                |row| row.get::<_, i64>(0),
            )?,
        };

        let stage = Stage {
            id: Uuid::new_v4().to_string(),
            pipeline_id: new_stage.pipeline_id.clone(),
            name: new_stage.name.clone(),
            color: new_stage
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_STAGE_COLOR.to_string()),
            order_index,
            created_at: Utc::now(),
        };

        tx.execute(
            r#"INSERT INTO stages (id, pipeline_id, name, color, order_index, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                stage.id,
                stage.pipeline_id,
                stage.name,
                stage.color,
                stage.order_index,
                stage.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(stage)
    }

    /// 查询阶段（按 order_index 排序，可按管道过滤）
    pub fn list(&self, pipeline_id: Option<&str>) -> RepositoryResult<Vec<Stage>> {
        let conn = self.get_conn()?;
        let stages = match pipeline_id {
            Some(pid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM stages WHERE pipeline_id = ?1 ORDER BY order_index, name",
                    STAGE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![pid], map_stage_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM stages ORDER BY order_index, name",
                    STAGE_COLUMNS
                ))?;
                let rows = stmt.query_map([], map_stage_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(stages)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Stage>> {
        let conn = self.get_conn()?;
        let stage = conn
            .query_row(
                &format!("SELECT {} FROM stages WHERE id = ?1", STAGE_COLUMNS),
                params![id],
                map_stage_row,
            )
            .optional()?;
        Ok(stage)
    }

    /// 按名称查找阶段（大小写不敏感，CLI 便捷入口）
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Stage>> {
        let conn = self.get_conn()?;
        let stage = conn
            .query_row(
                &format!(
                    "SELECT {} FROM stages WHERE lower(name) = lower(?1) ORDER BY order_index LIMIT 1",
                    STAGE_COLUMNS
                ),
                params![name.trim()],
                map_stage_row,
            )
            .optional()?;
        Ok(stage)
    }
}
