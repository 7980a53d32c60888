// ==========================================
// 销售管道 CRM - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 核心: 阶段内排序号管理 + 线索文件导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排序号管理
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ActivityType, PaymentTerms, TaskStatus};

// 领域实体
pub use domain::{
    Activity, EmailAccount, Lead, LeadField, LeadFilter, LeadUpdate, MoveLeadRequest, NewLead,
    Pipeline, Stage, Task,
};

// 引擎
pub use engine::PositionIndexManager;

// 导入
pub use importer::{ImportSession, ImportStep};

// API
pub use api::{ActivityApi, EmailApi, ImportApi, LeadApi, PipelineApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "销售管道 CRM";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
