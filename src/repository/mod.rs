// ==========================================
// 销售管道 CRM - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod activity_repo;
pub mod email_account_repo;
pub mod error;
pub mod lead_repo;
pub mod lead_store;
pub mod lead_store_impl;
pub mod stage_repo;

// 重导出核心仓储
pub use activity_repo::{ActivityRepository, TaskRepository};
pub use email_account_repo::EmailAccountRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lead_repo::LeadRepository;
pub use lead_store::LeadStore;
pub use lead_store_impl::SqliteLeadStore;
pub use stage_repo::{PipelineRepository, StageRepository};
