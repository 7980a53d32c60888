// ==========================================
// 销售管道 CRM - 线索仓储
// ==========================================
// 职责: leads 表 CRUD + 阶段内排序号维护
// 红线: 所有改动 position_index 的写操作必须在单个事务内完成
// 红线: 事务结束后每个阶段的 position_index 必须为 0..n-1
// ==========================================

use crate::domain::lead::{Lead, LeadUpdate, NewLead};
use crate::domain::types::PaymentTerms;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const LEAD_COLUMNS: &str = "id, stage_id, contact_name, company_name, email, phone, value, \
                            payment_terms, notes, position_index, created_at, updated_at";

fn map_lead_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let payment_terms: Option<String> = row.get(7)?;
    Ok(Lead {
        id: row.get(0)?,
        stage_id: row.get(1)?,
        contact_name: row.get(2)?,
        company_name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        value: row.get(6)?,
        payment_terms: payment_terms.as_deref().and_then(PaymentTerms::from_db_str),
        notes: row.get(8)?,
        position_index: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

// ==========================================
// 事务内辅助函数
// ==========================================

fn find_lead_tx(tx: &Transaction, lead_id: &str) -> RepositoryResult<Lead> {
    tx.query_row(
        &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
        params![lead_id],
        map_lead_row,
    )
    .optional()?
    .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))
}

fn ensure_stage_exists_tx(tx: &Transaction, stage_id: &str) -> RepositoryResult<()> {
    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM stages WHERE id = ?1",
            params![stage_id],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(RepositoryError::not_found("Stage", stage_id)),
    }
}

/// 阶段内下一个可用排序号（max + 1，空阶段为 0）
fn next_position_tx(tx: &Transaction, stage_id: &str) -> RepositoryResult<i64> {
    let next: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position_index) + 1, 0) FROM leads WHERE stage_id = ?1",
        params![stage_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn insert_lead_tx(tx: &Transaction, lead: &Lead) -> RepositoryResult<()> {
    tx.execute(
        &format!(
            "INSERT INTO leads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            LEAD_COLUMNS
        ),
        params![
            lead.id,
            lead.stage_id,
            lead.contact_name,
            lead.company_name,
            lead.email,
            lead.phone,
            lead.value,
            lead.payment_terms.map(|t| t.as_str()),
            lead.notes,
            lead.position_index,
            lead.created_at.to_rfc3339(),
            lead.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn build_lead(stage_id: &str, new_lead: &NewLead, position_index: i64) -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4().to_string(),
        stage_id: stage_id.to_string(),
        contact_name: new_lead.contact_name.clone(),
        company_name: new_lead.company_name.clone(),
        email: new_lead.email.clone(),
        phone: new_lead.phone.clone(),
        value: new_lead.value,
        payment_terms: new_lead.payment_terms,
        notes: new_lead.notes.clone(),
        position_index,
        created_at: now,
        updated_at: now,
    }
}

// ==========================================
// LeadRepository - 线索仓储
// ==========================================
pub struct LeadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LeadRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 查询 =====

    /// 查询全部线索（按阶段、排序号）
    pub fn list_all(&self) -> RepositoryResult<Vec<Lead>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM leads ORDER BY stage_id, position_index",
            LEAD_COLUMNS
        ))?;
        let leads = stmt
            .query_map([], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    /// 查询阶段内线索（按排序号升序）
    pub fn list_by_stage(&self, stage_id: &str) -> RepositoryResult<Vec<Lead>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM leads WHERE stage_id = ?1 ORDER BY position_index, created_at",
            LEAD_COLUMNS
        ))?;
        let leads = stmt
            .query_map(params![stage_id], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    pub fn find_by_id(&self, lead_id: &str) -> RepositoryResult<Option<Lead>> {
        let conn = self.get_conn()?;
        let lead = conn
            .query_row(
                &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
                params![lead_id],
                map_lead_row,
            )
            .optional()?;
        Ok(lead)
    }

    /// 阶段内排序号（升序），用于连续性诊断
    pub fn positions_by_stage(&self, stage_id: &str) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT position_index FROM leads WHERE stage_id = ?1 ORDER BY position_index",
        )?;
        let positions = stmt
            .query_map(params![stage_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    pub fn count_by_stage(&self, stage_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE stage_id = ?1",
            params![stage_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ===== 写入 =====

    /// 批量追加到阶段末尾（事务化，全部成功或全部回滚）
    ///
    /// # 返回
    /// - 按输入顺序排列的新线索，排序号为 max+1, max+2, ...
    pub fn bulk_append(&self, stage_id: &str, leads: &[NewLead]) -> RepositoryResult<Vec<Lead>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        ensure_stage_exists_tx(&tx, stage_id)?;
        if leads.is_empty() {
            return Ok(Vec::new());
        }

        let start = next_position_tx(&tx, stage_id)?;
        let mut inserted = Vec::with_capacity(leads.len());
        for (offset, new_lead) in leads.iter().enumerate() {
            let lead = build_lead(stage_id, new_lead, start + offset as i64);
            insert_lead_tx(&tx, &lead)?;
            inserted.push(lead);
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// 单条追加
    pub fn append(&self, stage_id: &str, new_lead: &NewLead) -> RepositoryResult<Lead> {
        self.bulk_append(stage_id, std::slice::from_ref(new_lead))?
            .pop()
            .ok_or_else(|| RepositoryError::InternalError("追加线索未返回记录".to_string()))
    }

    /// 字段编辑（不修改阶段与排序号）
    pub fn update_fields(&self, lead_id: &str, update: &LeadUpdate) -> RepositoryResult<Lead> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut lead = find_lead_tx(&tx, lead_id)?;
        if update.is_empty() {
            return Ok(lead);
        }

        update.apply_to(&mut lead);
        lead.updated_at = Utc::now();

        tx.execute(
            r#"UPDATE leads SET
                   contact_name = ?2, company_name = ?3, email = ?4, phone = ?5,
                   value = ?6, payment_terms = ?7, notes = ?8, updated_at = ?9
               WHERE id = ?1"#,
            params![
                lead.id,
                lead.contact_name,
                lead.company_name,
                lead.email,
                lead.phone,
                lead.value,
                lead.payment_terms.map(|t| t.as_str()),
                lead.notes,
                lead.updated_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(lead)
    }

    /// 移动线索（跨阶段或阶段内重排）
    ///
    /// # 步骤
    /// 1. 源阶段中排在其后的线索前移一位（关闭空位）
    /// 2. 目标阶段中 >= 目标位置的线索后移一位（打开空位）
    /// 3. 写入新阶段与新排序号
    ///
    /// target_position 截断到 [0, 目标阶段其他线索数]；
    /// 位置不变时不写库
    pub fn move_lead(
        &self,
        lead_id: &str,
        target_stage_id: &str,
        target_position: i64,
    ) -> RepositoryResult<Lead> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut lead = find_lead_tx(&tx, lead_id)?;
        ensure_stage_exists_tx(&tx, target_stage_id)?;

        let others: i64 = tx.query_row(
            "SELECT COUNT(*) FROM leads WHERE stage_id = ?1 AND id <> ?2",
            params![target_stage_id, lead_id],
            |row| row.get(0),
        )?;
        let target = target_position.clamp(0, others);

        if lead.stage_id == target_stage_id && lead.position_index == target {
            return Ok(lead);
        }

        tx.execute(
            r#"UPDATE leads SET position_index = position_index - 1
               WHERE stage_id = ?1 AND position_index > ?2 AND id <> ?3"#,
            params![lead.stage_id, lead.position_index, lead_id],
        )?;

        tx.execute(
            r#"UPDATE leads SET position_index = position_index + 1
               WHERE stage_id = ?1 AND position_index >= ?2 AND id <> ?3"#,
            params![target_stage_id, target, lead_id],
        )?;

        let now = Utc::now();
        tx.execute(
            "UPDATE leads SET stage_id = ?2, position_index = ?3, updated_at = ?4 WHERE id = ?1",
            params![lead_id, target_stage_id, target, now.to_rfc3339()],
        )?;

        tx.commit()?;

        lead.stage_id = target_stage_id.to_string();
        lead.position_index = target;
        lead.updated_at = now;
        Ok(lead)
    }

    /// 删除线索并重排原阶段（活动/任务由外键级联删除）
    pub fn delete_with_reindex(&self, lead_id: &str) -> RepositoryResult<Lead> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let lead = find_lead_tx(&tx, lead_id)?;

        tx.execute("DELETE FROM leads WHERE id = ?1", params![lead_id])?;
        tx.execute(
            r#"UPDATE leads SET position_index = position_index - 1
               WHERE stage_id = ?1 AND position_index > ?2"#,
            params![lead.stage_id, lead.position_index],
        )?;

        tx.commit()?;
        Ok(lead)
    }
}
