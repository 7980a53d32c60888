// ==========================================
// 销售管道 CRM - 线索导入API
// ==========================================
// 职责: 创建导入会话；一次性导入（解析 → 映射 → 预览 → 提交）
// ==========================================

use crate::api::error::ApiResult;
use crate::config::ImportConfigReader;
use crate::domain::import::{ColumnMapping, ImportSummary, LeadField};
use crate::engine::PositionIndexManager;
use crate::importer::import_session::ImportSession;
use crate::repository::lead_store::LeadStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 无效行明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidRowReport {
    /// 行号（从 1 开始）
    pub row_index: usize,
    /// "<field>: <reason>"
    pub errors: Vec<String>,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 源文件名
    pub file_name: String,
    /// 最终使用的列映射
    pub mappings: Vec<ColumnMapping>,
    /// 预览统计
    pub summary: ImportSummary,
    /// 无效行明细（不会写入）
    pub invalid_rows: Vec<InvalidRowReport>,
    /// 实际写入的线索数量（试运行为 0）
    pub inserted: usize,
    /// 写入的目标阶段（试运行为 None）
    pub stage_id: Option<String>,
    /// 是否试运行
    pub dry_run: bool,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi<S: ?Sized + LeadStore, C: ?Sized + ImportConfigReader> {
    manager: Arc<PositionIndexManager<S>>,
    config: Arc<C>,
}

impl<S: ?Sized + LeadStore, C: ?Sized + ImportConfigReader> ImportApi<S, C> {
    pub fn new(manager: Arc<PositionIndexManager<S>>, config: Arc<C>) -> Self {
        Self { manager, config }
    }

    /// 新建交互式导入会话（Upload 步骤）
    pub fn new_session(&self) -> ImportSession<S, C> {
        ImportSession::new(self.manager.clone(), self.config.clone())
    }

    /// 一次性导入文件
    ///
    /// # 参数
    /// - file_path: 文件路径
    /// - stage_id: 目标阶段（None 时使用配置的默认阶段）
    /// - overrides: 覆盖自动映射的列（None = 跳过该列）
    /// - dry_run: 只做解析与校验，不写入
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 导入结果
    /// - Err(ApiError): 文件/映射/阶段错误，或没有有效行
    pub async fn import_file(
        &self,
        file_path: &Path,
        stage_id: Option<&str>,
        overrides: &[(String, Option<LeadField>)],
        dry_run: bool,
    ) -> ApiResult<ImportApiResponse> {
        let started = Instant::now();
        let mut session = self.new_session();

        session.load_file(file_path).await?;
        for (column, target) in overrides {
            session.set_mapping(column, *target)?;
        }
        let summary = session.confirm_mapping()?;

        let file_name = session.file_name().unwrap_or_default().to_string();
        let mappings = session.mappings().to_vec();
        let invalid_rows: Vec<InvalidRowReport> = session
            .preview_rows()
            .iter()
            .filter(|r| !r.is_valid)
            .map(|r| InvalidRowReport {
                row_index: r.row_index,
                errors: r.errors.clone(),
            })
            .collect();

        if dry_run {
            session.cancel();
            info!(file_name = %file_name, valid = summary.valid_rows, "试运行完成，未写入");
            return Ok(ImportApiResponse {
                file_name,
                mappings,
                summary,
                invalid_rows,
                inserted: 0,
                stage_id: None,
                dry_run,
                elapsed_ms: started.elapsed().as_millis() as i64,
            });
        }

        if let Some(stage_id) = stage_id {
            session.select_stage(stage_id).await?;
        }
        let committed = session.commit().await?;

        Ok(ImportApiResponse {
            file_name,
            mappings,
            summary,
            invalid_rows,
            inserted: committed.inserted.len(),
            stage_id: Some(committed.stage_id),
            dry_run,
            elapsed_ms: started.elapsed().as_millis() as i64,
        })
    }
}
