// ==========================================
// 销售管道 CRM - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/ busy_timeout）
// - 幂等建表 + 默认管道种子数据
// ==========================================

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;
use uuid::Uuid;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 默认管道名称
pub const DEFAULT_PIPELINE_NAME: &str = "Sales Pipeline";

/// 默认阶段（名称, 颜色）
pub const DEFAULT_STAGES: [(&str, &str); 6] = [
    ("New", "#3b82f6"),
    ("Contacted", "#8b5cf6"),
    ("Qualified", "#f59e0b"),
    ("Proposal", "#06b6d4"),
    ("Won", "#10b981"),
    ("Lost", "#ef4444"),
];

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（活动/任务依赖级联删除）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS pipelines (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stages (
            id TEXT PRIMARY KEY,
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '#6b7280',
            order_index INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stages_pipeline
            ON stages(pipeline_id, order_index);

        -- position_index 不建唯一索引：批量平移时 SQLite 逐行校验唯一约束会误报
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            stage_id TEXT NOT NULL REFERENCES stages(id),
            contact_name TEXT NOT NULL CHECK (length(trim(contact_name)) > 0),
            company_name TEXT,
            email TEXT,
            phone TEXT,
            value REAL CHECK (value IS NULL OR value >= 0),
            payment_terms TEXT CHECK (
                payment_terms IS NULL OR payment_terms IN ('one_time', 'monthly', 'hourly')
            ),
            notes TEXT,
            position_index INTEGER NOT NULL CHECK (position_index >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_leads_stage_position
            ON leads(stage_id, position_index);

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            type TEXT NOT NULL CHECK (type IN ('note', 'call', 'email', 'meeting')),
            title TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_activities_lead
            ON activities(lead_id, created_at);

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed')),
            completed_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_lead
            ON tasks(lead_id, due_date);

        CREATE TABLE IF NOT EXISTS email_accounts (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 写入默认管道与阶段（已有管道时跳过）
///
/// # 返回
/// - Some(pipeline_id): 本次新建的管道
/// - None: 已存在管道，未写入
pub fn seed_default_pipeline(conn: &Connection) -> rusqlite::Result<Option<String>> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM pipelines LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        return Ok(None);
    }

    let now = Utc::now().to_rfc3339();
    let pipeline_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO pipelines (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![pipeline_id, DEFAULT_PIPELINE_NAME, now],
    )?;

    for (idx, (name, color)) in DEFAULT_STAGES.iter().enumerate() {
        conn.execute(
            r#"INSERT INTO stages (id, pipeline_id, name, color, order_index, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                Uuid::new_v4().to_string(),
                pipeline_id,
                name,
                color,
                idx as i64,
                now
            ],
        )?;
    }

    Ok(Some(pipeline_id))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
