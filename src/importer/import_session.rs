// ==========================================
// 销售管道 CRM - 导入会话（状态机）
// ==========================================
// 状态: Upload → Map → Preview
// 职责: 文件解析 → 列映射 → 校验预览 → 追加入库
// 红线: 会话状态只在内存中，取消即丢弃，不落库
// 红线: 提交失败时停留在 Preview，不丢失用户的映射与阶段选择
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ColumnMapping, ImportCommitResult, ImportRow, ImportSummary, LeadField, ParseResult,
};
use crate::domain::lead::NewLead;
use crate::engine::PositionIndexManager;
use crate::importer::column_mapper::{apply_mapping, auto_map_columns};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::RowValidator;
use crate::importer::row_validator::LeadRowValidator;
use crate::repository::error::RepositoryError;
use crate::repository::lead_store::LeadStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

// ==========================================
// ImportStep - 会话步骤
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Upload,
    Map,
    Preview,
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStep::Upload => "upload",
            ImportStep::Map => "map",
            ImportStep::Preview => "preview",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// ImportSession
// ==========================================
pub struct ImportSession<S: ?Sized, C: ?Sized>
where
    S: LeadStore,
    C: ImportConfigReader,
{
    manager: Arc<PositionIndexManager<S>>,
    config: Arc<C>,
    validator: LeadRowValidator,

    step: ImportStep,
    file_name: Option<String>,
    parsed: Option<ParseResult>,
    mappings: Vec<ColumnMapping>,
    preview_rows: Vec<ImportRow>,
    selected_stage_id: Option<String>,
}

impl<S: ?Sized, C: ?Sized> ImportSession<S, C>
where
    S: LeadStore,
    C: ImportConfigReader,
{
    pub fn new(manager: Arc<PositionIndexManager<S>>, config: Arc<C>) -> Self {
        Self {
            manager,
            config,
            validator: LeadRowValidator,
            step: ImportStep::Upload,
            file_name: None,
            parsed: None,
            mappings: Vec::new(),
            preview_rows: Vec::new(),
            selected_stage_id: None,
        }
    }

    // ===== 只读访问 =====

    pub fn step(&self) -> ImportStep {
        self.step
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn parse_result(&self) -> Option<&ParseResult> {
        self.parsed.as_ref()
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn preview_rows(&self) -> &[ImportRow] {
        &self.preview_rows
    }

    pub fn selected_stage_id(&self) -> Option<&str> {
        self.selected_stage_id.as_deref()
    }

    /// 预览统计（仅 Preview 步骤有值）
    pub fn summary(&self) -> Option<ImportSummary> {
        match self.step {
            ImportStep::Preview => Some(ImportSummary::from_rows(&self.preview_rows)),
            _ => None,
        }
    }

    fn require_step(&self, expected: ImportStep, action: &str) -> ImportResult<()> {
        if self.step != expected {
            return Err(ImportError::InvalidState {
                action: action.to_string(),
                state: self.step.to_string(),
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.step = ImportStep::Upload;
        self.file_name = None;
        self.parsed = None;
        self.mappings.clear();
        self.preview_rows.clear();
        self.selected_stage_id = None;
    }

    async fn build_parser(&self) -> ImportResult<UniversalFileParser> {
        let max_bytes = self
            .config
            .get_max_file_bytes()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_max_file_bytes".to_string(),
                message: e.to_string(),
            })?;
        let allowed = self
            .config
            .get_allowed_extensions()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_allowed_extensions".to_string(),
                message: e.to_string(),
            })?;
        Ok(UniversalFileParser::new(max_bytes).with_allowed_extensions(allowed))
    }

    async fn on_parsed(&mut self, file_name: String, parsed: ParseResult) {
        self.mappings = auto_map_columns(&parsed.headers);
        info!(
            file_name = %file_name,
            rows = parsed.total_rows(),
            mapped_columns = self.mappings.iter().filter(|m| m.target_field.is_some()).count(),
            "文件已解析，自动映射完成"
        );

        // 配置了默认阶段时预选（读取失败不影响上传）
        match self.config.get_default_stage_id().await {
            Ok(stage_id) => self.selected_stage_id = stage_id,
            Err(e) => warn!(error = %e, "默认导入阶段读取失败，忽略"),
        }

        self.file_name = Some(file_name);
        self.parsed = Some(parsed);
        self.step = ImportStep::Map;
    }

    // ===== 状态迁移 =====

    /// 上传内存中的文件（Upload → Map）
    ///
    /// 失败时停留在 Upload，不保留任何状态
    pub async fn load_bytes(&mut self, file_name: &str, bytes: &[u8]) -> ImportResult<&[ColumnMapping]> {
        self.require_step(ImportStep::Upload, "load_file")?;

        let parser = self.build_parser().await?;
        let parsed = parser.parse_bytes(file_name, bytes)?;
        self.on_parsed(file_name.to_string(), parsed).await;
        Ok(&self.mappings)
    }

    /// 上传磁盘文件（Upload → Map）
    pub async fn load_file<P: AsRef<Path>>(&mut self, path: P) -> ImportResult<&[ColumnMapping]> {
        self.require_step(ImportStep::Upload, "load_file")?;

        let path = path.as_ref();
        let parser = self.build_parser().await?;
        let parsed = parser.parse_file(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.on_parsed(file_name, parsed).await;
        Ok(&self.mappings)
    }

    /// 修改单列映射（None = 跳过该列）
    pub fn set_mapping(&mut self, source_column: &str, target: Option<LeadField>) -> ImportResult<()> {
        self.require_step(ImportStep::Map, "set_mapping")?;

        let mapping = self
            .mappings
            .iter_mut()
            .find(|m| m.source_column == source_column)
            .ok_or_else(|| ImportError::MappingError(format!("未知列: {}", source_column)))?;
        mapping.target_field = target;
        Ok(())
    }

    /// 确认映射并生成预览（Map → Preview）
    ///
    /// # 错误
    /// - MappingError: 没有任何列映射到 contact_name（状态不变）
    pub fn confirm_mapping(&mut self) -> ImportResult<ImportSummary> {
        self.require_step(ImportStep::Map, "confirm_mapping")?;

        let has_contact = self
            .mappings
            .iter()
            .any(|m| m.target_field == Some(LeadField::ContactName));
        if !has_contact {
            return Err(ImportError::MappingError(
                "必须至少将一列映射到 contact_name".to_string(),
            ));
        }

        let parsed = self
            .parsed
            .as_ref()
            .ok_or_else(|| ImportError::InternalError("Map 步骤缺少解析结果".to_string()))?;

        let rows: Vec<ImportRow> = parsed
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.mapped = Some(apply_mapping(&row.data, &self.mappings));
                self.validator.validate_row(&mut row);
                row
            })
            .collect();

        let summary = ImportSummary::from_rows(&rows);
        info!(
            total = summary.total_rows,
            valid = summary.valid_rows,
            invalid = summary.invalid_rows,
            "映射已确认"
        );

        self.preview_rows = rows;
        self.step = ImportStep::Preview;
        Ok(summary)
    }

    /// 选择目标阶段（Preview）
    pub async fn select_stage(&mut self, stage_id: &str) -> ImportResult<()> {
        self.require_step(ImportStep::Preview, "select_stage")?;

        let stage = self
            .manager
            .store()
            .get_stage(stage_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Stage", stage_id))?;
        self.selected_stage_id = Some(stage.id);
        Ok(())
    }

    /// 提交导入（Preview → Upload）
    ///
    /// 只写入有效行；失败时停留在 Preview
    #[instrument(skip_all)]
    pub async fn commit(&mut self) -> ImportResult<ImportCommitResult> {
        self.require_step(ImportStep::Preview, "commit")?;
        let started = Instant::now();

        let stage_id = self
            .selected_stage_id
            .clone()
            .ok_or(ImportError::StageNotSelected)?;

        let leads: Vec<NewLead> = self
            .preview_rows
            .iter()
            .filter(|r| r.is_valid)
            .filter_map(|r| r.mapped.as_ref().and_then(|m| m.to_new_lead()))
            .collect();
        if leads.is_empty() {
            return Err(ImportError::NoValidRows);
        }
        let skipped_invalid = self.preview_rows.len() - leads.len();

        let inserted = match self.manager.append_leads(&stage_id, leads).await {
            Ok(inserted) => inserted,
            Err(e) => {
                warn!(error = %e, "导入提交失败，保留预览状态");
                return Err(e.into());
            }
        };

        let result = ImportCommitResult {
            stage_id,
            inserted,
            skipped_invalid,
            elapsed_ms: started.elapsed().as_millis() as i64,
        };
        info!(
            stage_id = %result.stage_id,
            inserted = result.inserted.len(),
            skipped_invalid = result.skipped_invalid,
            elapsed_ms = result.elapsed_ms,
            "导入完成"
        );

        self.reset();
        Ok(result)
    }

    /// 返回上一步
    ///
    /// - Preview → Map: 保留解析结果与映射
    /// - Map → Upload: 丢弃解析结果与映射
    /// - Upload: 无操作
    pub fn back(&mut self) {
        match self.step {
            ImportStep::Preview => {
                self.preview_rows.clear();
                self.step = ImportStep::Map;
            }
            ImportStep::Map => self.reset(),
            ImportStep::Upload => {}
        }
    }

    /// 取消导入，丢弃全部状态
    pub fn cancel(&mut self) {
        self.reset();
    }
}
