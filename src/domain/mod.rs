// ==========================================
// 销售管道 CRM - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod activity;
pub mod email;
pub mod import;
pub mod lead;
pub mod pipeline;
pub mod types;

// 重导出核心类型
pub use activity::{Activity, NewActivity, NewTask, Task};
pub use email::{EmailAccount, OutgoingEmail};
pub use import::{
    ColumnMapping, FieldKind, FieldValue, FileType, ImportCommitResult, ImportRow,
    ImportSummary, LeadField, MappedLead, ParseResult, RawValue,
};
pub use lead::{Lead, LeadFilter, LeadUpdate, MoveLeadRequest, NewLead};
pub use pipeline::{NewStage, Pipeline, Stage, DEFAULT_STAGE_COLOR};
pub use types::{ActivityType, PaymentTerms, TaskStatus};
