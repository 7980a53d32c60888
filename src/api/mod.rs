// ==========================================
// 销售管道 CRM - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI 与上层界面调用
// ==========================================

pub mod activity_api;
pub mod config_api;
pub mod email_api;
pub mod error;
pub mod import_api;
pub mod lead_api;
pub mod pipeline_api;

// 重导出核心类型
pub use activity_api::ActivityApi;
pub use config_api::{ConfigApi, ImportSettings};
pub use email_api::{EmailApi, EmailSender, SUPPORTED_PROVIDERS};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, InvalidRowReport};
pub use lead_api::{LeadApi, StageColumn};
pub use pipeline_api::PipelineApi;
