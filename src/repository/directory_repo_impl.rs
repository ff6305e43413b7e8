// ==========================================
// 专家评审阶段管理系统 - 外部登记簿 SQLite 实现
// ==========================================
// 职责: 实现 ExpertDirectory / UserDirectory (rusqlite)
// ==========================================

use crate::domain::identity::UserRecord;
use crate::domain::types::Role;
use crate::repository::directory_repo::{ExpertDirectory, UserDirectory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn lock(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

// ==========================================
// SqliteExpertDirectory
// ==========================================
pub struct SqliteExpertDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExpertDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl ExpertDirectory for SqliteExpertDirectory {
    fn expert_exists(&self, expert_id: i64) -> RepositoryResult<bool> {
        if expert_id <= 0 {
            return Ok(false);
        }
        let conn = lock(&self.conn)?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM experts WHERE id = ?1)",
            params![expert_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

// ==========================================
// SqliteUserDirectory
// ==========================================
pub struct SqliteUserDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl UserDirectory for SqliteUserDirectory {
    fn get_user(&self, user_id: i64) -> RepositoryResult<Option<UserRecord>> {
        let conn = lock(&self.conn)?;
        let user = conn
            .query_row(
                "SELECT id, name, role FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    let role: String = row.get(2)?;
                    Ok(UserRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        // 未知角色不报错, 交由调用方按权重 0 处理
                        role: Role::parse(&role),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = crate::db::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO users (id, name, role) VALUES (1, 'Ada', 'admin'), (2, 'Bob', 'scheduler');
            INSERT INTO experts (id, name) VALUES (10, 'Dr. Expert');
            "#,
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_user_lookup_with_unknown_role() {
        let users = SqliteUserDirectory::new(setup());
        let admin = users.get_user(1).unwrap().unwrap();
        assert_eq!(admin.role, Some(Role::Admin));
        let odd = users.get_user(2).unwrap().unwrap();
        assert_eq!(odd.role, None);
        assert!(users.get_user(3).unwrap().is_none());
    }

    #[test]
    fn test_expert_exists() {
        let experts = SqliteExpertDirectory::new(setup());
        assert!(experts.expert_exists(10).unwrap());
        assert!(!experts.expert_exists(11).unwrap());
        assert!(!experts.expert_exists(0).unwrap());
        assert!(!experts.expert_exists(-10).unwrap());
    }
}
