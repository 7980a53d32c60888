// ==========================================
// 销售管道 CRM - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取导入文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10485760 (10 MB)
    async fn get_max_file_bytes(&self) -> Result<u64, Box<dyn Error>>;

    /// 获取默认导入阶段
    ///
    /// # 返回
    /// - Some(stage_id): 预选阶段（用户仍可在预览时修改）
    /// - None: 未配置，必须手动选择
    async fn get_default_stage_id(&self) -> Result<Option<String>, Box<dyn Error>>;

    /// 获取允许的文件扩展名（小写，不含 '.'）
    ///
    /// # 默认值
    /// - ["csv", "xlsx", "xls", "json"]
    async fn get_allowed_extensions(&self) -> Result<Vec<String>, Box<dyn Error>>;
}
