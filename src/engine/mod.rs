// ==========================================
// 销售管道 CRM - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 只依赖 LeadStore Trait
// ==========================================

pub mod position_index;

// 重导出核心引擎
pub use position_index::{is_contiguous, ContiguityReport, PositionIndexManager};
