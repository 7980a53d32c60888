// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、阶段查询、导入文件生成等功能
// ==========================================
#![allow(dead_code)]

use pipeline_crm::db::{init_schema, open_sqlite_connection, seed_default_pipeline};
use pipeline_crm::domain::lead::NewLead;
use pipeline_crm::engine::PositionIndexManager;
use pipeline_crm::repository::SqliteLeadStore;
use rusqlite::{params, Connection};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// 创建临时测试数据库并初始化 schema 与默认管道
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    seed_default_pipeline(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接
pub fn open_shared_conn(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = open_sqlite_connection(db_path).expect("Failed to open db");
    Arc::new(Mutex::new(conn))
}

/// 基于测试库构建排序号管理器
pub fn build_manager(db_path: &str) -> Arc<PositionIndexManager<SqliteLeadStore>> {
    let store = Arc::new(SqliteLeadStore::new(open_shared_conn(db_path)));
    Arc::new(PositionIndexManager::new(store))
}

/// 按名称查询默认管道中的阶段 ID
pub fn stage_id(db_path: &str, name: &str) -> String {
    let conn = Connection::open(db_path).expect("Failed to open db");
    conn.query_row(
        "SELECT id FROM stages WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .expect("stage should exist")
}

/// 阶段内 (lead_id, position_index)，按排序号排列
pub fn stage_layout(db_path: &str, stage_id: &str) -> Vec<(String, i64)> {
    let conn = Connection::open(db_path).expect("Failed to open db");
    let mut stmt = conn
        .prepare("SELECT id, position_index FROM leads WHERE stage_id = ?1 ORDER BY position_index")
        .expect("prepare");
    let rows = stmt
        .query_map(params![stage_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query");
    rows.collect::<Result<Vec<_>, _>>().expect("rows")
}

/// 阶段内排序号（升序）
pub fn stage_positions(db_path: &str, stage_id: &str) -> Vec<i64> {
    stage_layout(db_path, stage_id)
        .into_iter()
        .map(|(_, pos)| pos)
        .collect()
}

/// 断言阶段内排序号恰为 0..n-1
pub fn assert_contiguous(db_path: &str, stage_id: &str) {
    let positions = stage_positions(db_path, stage_id);
    let expected: Vec<i64> = (0..positions.len() as i64).collect();
    assert_eq!(positions, expected, "stage {} positions not contiguous", stage_id);
}

/// 向阶段追加若干仅含联系人的线索，返回线索 ID（按排序号）
pub async fn seed_leads(
    manager: &PositionIndexManager<SqliteLeadStore>,
    stage_id: &str,
    names: &[&str],
) -> Vec<String> {
    let leads: Vec<NewLead> = names.iter().map(|n| NewLead::with_contact(*n)).collect();
    manager
        .append_leads(stage_id, leads)
        .await
        .expect("Failed to seed leads")
        .into_iter()
        .map(|l| l.id)
        .collect()
}

/// 在临时目录中写入导入文件
pub fn write_import_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write import file");
    path
}
