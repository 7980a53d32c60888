// ==========================================
// 销售管道 CRM - 命令行参数定义
// ==========================================

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use pipeline_crm::domain::import::LeadField;
use pipeline_crm::domain::types::{ActivityType, PaymentTerms};

#[derive(Parser)]
#[command(
    name = "pipeline-crm",
    version,
    about = "销售管道 CRM - 线索看板排序与批量导入"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 数据库文件路径（默认: 用户数据目录，或 PIPELINE_CRM_DB_PATH）
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// 以 JSON 格式输出日志
    #[arg(long = "json-logs", global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// 初始化数据库（建表 + 默认管道）
    Init,

    /// 列出管道
    Pipelines,

    /// 列出阶段
    Stages {
        /// 仅列出指定管道的阶段
        #[arg(long)]
        pipeline: Option<String>,
    },

    /// 新建阶段（追加到管道末尾）
    AddStage {
        /// 所属管道 ID
        #[arg(long)]
        pipeline: String,
        /// 阶段名称
        name: String,
        /// 颜色（#rrggbb）
        #[arg(long)]
        color: Option<String>,
    },

    /// 看板视图（按阶段分组）
    Board,

    /// 列出线索
    Leads {
        /// 阶段 ID 或名称（可重复，缺省为全部阶段）
        #[arg(long = "stage", value_name = "STAGE")]
        stages: Vec<String>,
        /// 关键字（匹配联系人、公司、邮箱、电话，不区分大小写）
        #[arg(long)]
        search: Option<String>,
    },

    /// 新建线索（追加到阶段末尾）
    AddLead(LeadArgs),

    /// 移动线索（拖拽落点）
    Move {
        lead_id: String,
        /// 目标阶段 ID 或名称
        #[arg(long)]
        stage: String,
        /// 插入位置（从 0 开始，越界截断）
        #[arg(long, default_value_t = 0)]
        position: i64,
    },

    /// 删除线索（原阶段重排）
    Delete { lead_id: String },

    /// 从文件导入线索
    Import(ImportArgs),

    /// 检查各阶段排序号是否连续
    Check,

    /// 为线索添加跟进记录
    Note {
        lead_id: String,
        #[arg(long)]
        title: String,
        #[arg(long = "type", value_enum, default_value = "note")]
        activity_type: ActivityTypeArg,
        #[arg(long)]
        description: Option<String>,
    },

    /// 线索时间线
    Timeline { lead_id: String },

    /// 跟进任务
    #[command(subcommand)]
    Task(TaskCommand),

    /// 导入配置
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Parser)]
pub struct LeadArgs {
    /// 阶段 ID 或名称
    #[arg(long)]
    pub stage: String,
    /// 联系人
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// 金额（>= 0）
    #[arg(long)]
    pub value: Option<f64>,
    /// 付款方式（one_time / monthly / hourly 及同义词）
    #[arg(long, value_parser = parse_payment_terms)]
    pub terms: Option<PaymentTerms>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Parser)]
pub struct ImportArgs {
    /// 待导入文件（.csv/.xlsx/.xls/.json）
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// 目标阶段 ID 或名称（缺省时使用配置的默认阶段）
    #[arg(long)]
    pub stage: Option<String>,

    /// 覆盖自动映射: 列名=字段（字段为 skip 时跳过该列）
    #[arg(long = "map", value_name = "COLUMN=FIELD", value_parser = parse_mapping)]
    pub mappings: Vec<(String, Option<LeadField>)>,

    /// 只解析与校验，不写入
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// 新建任务
    Add {
        lead_id: String,
        #[arg(long)]
        title: String,
        /// 截止日期（YYYY-MM-DD）
        #[arg(long)]
        due: NaiveDate,
        #[arg(long)]
        description: Option<String>,
    },
    /// 列出线索的任务
    List { lead_id: String },
    /// 完成任务
    Complete { task_id: String },
    /// 重开任务
    Reopen { task_id: String },
    /// 列出逾期任务
    Overdue {
        /// 基准日期（默认今天）
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// 显示生效的导入配置
    Show,
    /// 设置配置项
    Set { key: String, value: String },
    /// 导出配置快照（JSON）
    Export,
    /// 从快照文件恢复配置
    Restore { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ActivityTypeArg {
    Note,
    Call,
    Email,
    Meeting,
}

impl From<ActivityTypeArg> for ActivityType {
    fn from(arg: ActivityTypeArg) -> Self {
        match arg {
            ActivityTypeArg::Note => ActivityType::Note,
            ActivityTypeArg::Call => ActivityType::Call,
            ActivityTypeArg::Email => ActivityType::Email,
            ActivityTypeArg::Meeting => ActivityType::Meeting,
        }
    }
}

fn parse_payment_terms(raw: &str) -> Result<PaymentTerms, String> {
    PaymentTerms::from_synonym(raw).ok_or_else(|| format!("无法识别的付款方式: {}", raw))
}

fn parse_mapping(raw: &str) -> Result<(String, Option<LeadField>), String> {
    let (column, field) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("映射格式应为 COLUMN=FIELD: {}", raw))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("列名不能为空: {}", raw));
    }

    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("skip") {
        return Ok((column.to_string(), None));
    }
    let target = LeadField::parse(field).ok_or_else(|| {
        let known: Vec<&str> = LeadField::ALL.iter().map(|f| f.as_str()).collect();
        format!("未知字段: {}（可选: {}, skip）", field, known.join(", "))
    })?;
    Ok((column.to_string(), Some(target)))
}
