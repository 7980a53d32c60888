// ==========================================
// 销售管道 CRM - 命令行主入口
// ==========================================
// 技术栈: Rust + SQLite + clap
// ==========================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use cli::{Cli, Command, ConfigCommand, ImportArgs, LeadArgs, TaskCommand};
use pipeline_crm::app::{get_default_db_path, AppState};
use pipeline_crm::domain::{
    LeadFilter, MoveLeadRequest, NewActivity, NewLead, NewStage, NewTask,
};
use pipeline_crm::logging;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let db_path = match cli.db_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => get_default_db_path(),
    };
    tracing::debug!(db_path = %db_path, version = pipeline_crm::VERSION, "启动");

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    run(&state, cli.command).await
}

async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            let stages = state.pipeline_api.list_stages(None)?;
            println!("数据库已就绪: {}（{} 个阶段）", state.get_db_path(), stages.len());
        }
        Command::Pipelines => print_json(&state.pipeline_api.list_pipelines()?)?,
        Command::Stages { pipeline } => {
            print_json(&state.pipeline_api.list_stages(pipeline.as_deref())?)?
        }
        Command::AddStage {
            pipeline,
            name,
            color,
        } => {
            let stage = state.pipeline_api.create_stage(NewStage {
                pipeline_id: pipeline,
                name,
                color,
                order_index: None,
            })?;
            print_json(&stage)?;
        }
        Command::Board => print_json(&state.lead_api.get_board(None).await?)?,
        Command::Leads { stages, search } => {
            let stage_ids = stages
                .iter()
                .map(|key| state.pipeline_api.resolve_stage(key).map(|stage| stage.id))
                .collect::<Result<Vec<_>, _>>()?;
            let filter = LeadFilter { search, stage_ids };
            print_json(&state.lead_api.list_leads(&filter).await?)?;
        }
        Command::AddLead(args) => add_lead(state, args).await?,
        Command::Move {
            lead_id,
            stage,
            position,
        } => {
            let target = state.pipeline_api.resolve_stage(&stage)?;
            let lead = state
                .lead_api
                .move_lead(MoveLeadRequest {
                    lead_id,
                    target_stage_id: target.id,
                    target_position: position,
                })
                .await?;
            print_json(&lead)?;
        }
        Command::Delete { lead_id } => {
            let lead = state.lead_api.delete_lead(&lead_id).await?;
            println!("已删除: {} ({})", lead.contact_name, lead.id);
        }
        Command::Import(args) => import(state, args).await?,
        Command::Check => {
            let reports = state.lead_api.check_positions().await?;
            print_json(&reports)?;
            if reports.iter().any(|r| !r.is_contiguous) {
                anyhow::bail!("存在排序号不连续的阶段");
            }
        }
        Command::Note {
            lead_id,
            title,
            activity_type,
            description,
        } => {
            let activity = state.activity_api.add_activity(NewActivity {
                lead_id,
                activity_type: activity_type.into(),
                title,
                description,
            })?;
            print_json(&activity)?;
        }
        Command::Timeline { lead_id } => {
            print_json(&state.activity_api.list_activities(&lead_id)?)?
        }
        Command::Task(cmd) => task(state, cmd)?,
        Command::Config(cmd) => config(state, cmd).await?,
    }
    Ok(())
}

async fn add_lead(state: &AppState, args: LeadArgs) -> Result<()> {
    let stage = state.pipeline_api.resolve_stage(&args.stage)?;
    let lead = state
        .lead_api
        .create_lead(
            &stage.id,
            NewLead {
                contact_name: args.name,
                company_name: args.company,
                email: args.email,
                phone: args.phone,
                value: args.value,
                payment_terms: args.terms,
                notes: args.notes,
            },
        )
        .await?;
    print_json(&lead)
}

async fn import(state: &AppState, args: ImportArgs) -> Result<()> {
    let stage_id = match args.stage.as_deref() {
        Some(key) => Some(state.pipeline_api.resolve_stage(key)?.id),
        None => None,
    };

    let response = state
        .import_api
        .import_file(&args.file, stage_id.as_deref(), &args.mappings, args.dry_run)
        .await
        .with_context(|| format!("导入失败: {}", args.file.display()))?;
    print_json(&response)
}

fn task(state: &AppState, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            lead_id,
            title,
            due,
            description,
        } => print_json(&state.activity_api.add_task(NewTask {
            lead_id,
            title,
            description,
            due_date: due,
        })?),
        TaskCommand::List { lead_id } => print_json(&state.activity_api.list_tasks(&lead_id)?),
        TaskCommand::Complete { task_id } => {
            print_json(&state.activity_api.complete_task(&task_id)?)
        }
        TaskCommand::Reopen { task_id } => print_json(&state.activity_api.reopen_task(&task_id)?),
        TaskCommand::Overdue { today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            print_json(&state.activity_api.overdue_tasks(today)?)
        }
    }
}

async fn config(state: &AppState, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => print_json(&state.config_api.get_import_settings().await?),
        ConfigCommand::Set { key, value } => {
            state.config_api.update_config(&key, &value)?;
            println!("{} = {}", key, value.trim());
            Ok(())
        }
        ConfigCommand::Export => {
            println!("{}", state.config_api.export_snapshot()?);
            Ok(())
        }
        ConfigCommand::Restore { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("无法读取快照文件: {}", file.display()))?;
            let count = state.config_api.restore_snapshot(&json)?;
            println!("已恢复 {} 项配置", count);
            Ok(())
        }
    }
}
