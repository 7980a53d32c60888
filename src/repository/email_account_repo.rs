// ==========================================
// 销售管道 CRM - 邮件账户仓储
// ==========================================
// 职责: email_accounts 表 CRUD（不保存令牌）
// ==========================================

use crate::domain::email::EmailAccount;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

fn map_account_row(row: &Row<'_>) -> rusqlite::Result<EmailAccount> {
    Ok(EmailAccount {
        id: row.get(0)?,
        provider: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub struct EmailAccountRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmailAccountRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, provider: &str, email: &str) -> RepositoryResult<EmailAccount> {
        let account = EmailAccount {
            id: Uuid::new_v4().to_string(),
            provider: provider.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO email_accounts (id, provider, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id,
                account.provider,
                account.email,
                account.created_at.to_rfc3339()
            ],
        )?;

        Ok(account)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<EmailAccount>> {
        let conn = self.get_conn()?;
        let account = conn
            .query_row(
                "SELECT id, provider, email, created_at FROM email_accounts WHERE id = ?1",
                params![id],
                map_account_row,
            )
            .optional()?;
        Ok(account)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<EmailAccount>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, provider, email, created_at FROM email_accounts ORDER BY created_at",
        )?;
        let accounts = stmt
            .query_map([], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }
}
