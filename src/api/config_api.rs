// ==========================================
// 销售管道 CRM - 配置管理 API
// ==========================================
// 职责: 导入配置查询、更新、快照导出/恢复
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, ImportConfigReader};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 导入相关的生效配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub max_file_bytes: u64,
    pub default_stage_id: Option<String>,
    pub allowed_extensions: Vec<String>,
}

/// 配置管理API
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询导入配置（未设置的键取默认值）
    pub async fn get_import_settings(&self) -> ApiResult<ImportSettings> {
        let max_file_bytes = self
            .config_manager
            .get_max_file_bytes()
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let default_stage_id = self
            .config_manager
            .get_default_stage_id()
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let allowed_extensions = self
            .config_manager
            .get_allowed_extensions()
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        Ok(ImportSettings {
            max_file_bytes,
            default_stage_id,
            allowed_extensions,
        })
    }

    /// 更新单个配置（仅接受已知键，值按键校验）
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        let value = value.trim();
        match key {
            config_keys::IMPORT_MAX_FILE_BYTES => match value.parse::<u64>() {
                Ok(n) if n > 0 => {}
                _ => {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 必须为正整数: {}",
                        key, value
                    )))
                }
            },
            config_keys::IMPORT_ALLOWED_EXTENSIONS => {
                let has_any = value.split(',').any(|ext| !ext.trim().is_empty());
                if !has_any {
                    return Err(ApiError::InvalidInput(format!("{} 不能为空", key)));
                }
            }
            config_keys::IMPORT_DEFAULT_STAGE_ID => {}
            _ => return Err(ApiError::InvalidInput(format!("未知配置键: {}", key))),
        }

        self.config_manager
            .set_global_config_value(key, value)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        info!(key = %key, value = %value, "配置已更新");
        Ok(())
    }

    /// 导出配置快照（JSON）
    pub fn export_snapshot(&self) -> ApiResult<String> {
        self.config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 从快照恢复配置
    pub fn restore_snapshot(&self, snapshot_json: &str) -> ApiResult<usize> {
        let count = self
            .config_manager
            .restore_config_from_snapshot(snapshot_json)
            .map_err(|e| ApiError::InvalidInput(format!("配置快照无效: {}", e)))?;
        info!(count = count, "配置快照已恢复");
        Ok(count)
    }
}
