// ==========================================
// 销售管道 CRM - 管道与阶段API
// ==========================================
// 职责: 管道/阶段查询与新建，阶段 ID/名称解析
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::pipeline::{NewStage, Pipeline, Stage};
use crate::repository::error::RepositoryError;
use crate::repository::stage_repo::{PipelineRepository, StageRepository};
use std::sync::Arc;
use tracing::info;

/// 管道API
pub struct PipelineApi {
    pipelines: Arc<PipelineRepository>,
    stages: Arc<StageRepository>,
}

impl PipelineApi {
    pub fn new(pipelines: Arc<PipelineRepository>, stages: Arc<StageRepository>) -> Self {
        Self { pipelines, stages }
    }

    pub fn list_pipelines(&self) -> ApiResult<Vec<Pipeline>> {
        Ok(self.pipelines.list_all()?)
    }

    pub fn create_pipeline(&self, name: &str) -> ApiResult<Pipeline> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("管道名称不能为空".to_string()));
        }
        let pipeline = self.pipelines.create(name)?;
        info!(pipeline_id = %pipeline.id, name = %pipeline.name, "管道已新建");
        Ok(pipeline)
    }

    pub fn list_stages(&self, pipeline_id: Option<&str>) -> ApiResult<Vec<Stage>> {
        Ok(self.stages.list(pipeline_id)?)
    }

    /// 新建阶段（未指定顺序时追加到管道末尾）
    pub fn create_stage(&self, new_stage: NewStage) -> ApiResult<Stage> {
        let name = new_stage.name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("阶段名称不能为空".to_string()));
        }
        if let Some(color) = new_stage.color.as_deref() {
            if !is_hex_color(color) {
                return Err(ApiError::InvalidInput(format!("颜色格式无效: {}", color)));
            }
        }
        if matches!(new_stage.order_index, Some(idx) if idx < 0) {
            return Err(ApiError::InvalidInput("order_index不能为负数".to_string()));
        }
        self.pipelines
            .find_by_id(&new_stage.pipeline_id)?
            .ok_or_else(|| RepositoryError::not_found("Pipeline", &new_stage.pipeline_id))?;

        let stage = self.stages.create(&NewStage {
            name: name.to_string(),
            ..new_stage
        })?;
        info!(stage_id = %stage.id, name = %stage.name, order_index = stage.order_index, "阶段已新建");
        Ok(stage)
    }

    /// 按 ID 或名称（大小写不敏感）解析阶段
    pub fn resolve_stage(&self, id_or_name: &str) -> ApiResult<Stage> {
        let key = id_or_name.trim();
        if key.is_empty() {
            return Err(ApiError::InvalidInput("阶段不能为空".to_string()));
        }
        if let Some(stage) = self.stages.find_by_id(key)? {
            return Ok(stage);
        }
        let stage = self
            .stages
            .find_by_name(key)?
            .ok_or_else(|| RepositoryError::not_found("Stage", key))?;
        Ok(stage)
    }
}

/// "#rgb" 或 "#rrggbb"
fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema, seed_default_pipeline};
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> PipelineApi {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        seed_default_pipeline(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        PipelineApi::new(
            Arc::new(PipelineRepository::new(conn.clone())),
            Arc::new(StageRepository::new(conn)),
        )
    }

    #[test]
    fn test_resolve_stage_by_id_or_name() {
        let api = setup();
        let by_name = api.resolve_stage("qualified").unwrap();
        assert_eq!(by_name.name, "Qualified");

        let by_id = api.resolve_stage(&by_name.id).unwrap();
        assert_eq!(by_id.id, by_name.id);

        assert!(matches!(api.resolve_stage("Nowhere"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_create_stage_validation() {
        let api = setup();
        let pipeline_id = api.list_pipelines().unwrap()[0].id.clone();

        let bad_color = NewStage {
            pipeline_id: pipeline_id.clone(),
            name: "Negotiation".to_string(),
            color: Some("blue".to_string()),
            order_index: None,
        };
        assert!(matches!(api.create_stage(bad_color), Err(ApiError::InvalidInput(_))));

        let missing_pipeline = NewStage {
            pipeline_id: "nope".to_string(),
            name: "Negotiation".to_string(),
            color: None,
            order_index: None,
        };
        assert!(matches!(api.create_stage(missing_pipeline), Err(ApiError::NotFound(_))));

        let stage = api
            .create_stage(NewStage {
                pipeline_id,
                name: " Negotiation ".to_string(),
                color: Some("#0ea5e9".to_string()),
                order_index: None,
            })
            .unwrap();
        assert_eq!(stage.name, "Negotiation");
        assert_eq!(stage.order_index, 6);
    }

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#6b7280"));
        assert!(!is_hex_color("6b7280"));
        assert!(!is_hex_color("#6b72zz"));
    }
}
