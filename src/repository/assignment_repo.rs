// ==========================================
// 专家评审阶段管理系统 - 委派关系仓储
// ==========================================
// 职责: user <-> application 的 planner / manager 多对多关系
// 红线: Repository 不含业务逻辑, 批量指派 = 事务内 先删后插
// ==========================================

use crate::domain::types::Capability;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{dedup_ids, format_ts, placeholders};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

// ==========================================
// AssignmentRepository - 委派关系仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 按数据库路径创建
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn =
            crate::db::open_sqlite_connection(db_path).map_err(RepositoryError::connection)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 共享已有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 用户是否对申请持有指定委派能力
    pub fn is_delegated(
        &self,
        capability: Capability,
        user_id: i64,
        application_id: i64,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::is_delegated_in(&conn, capability, user_id, application_id)
    }

    /// 事务/连接内的存在性检查
    pub fn is_delegated_in(
        conn: &Connection,
        capability: Capability,
        user_id: i64,
        application_id: i64,
    ) -> RepositoryResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND application_id = ?2)",
            capability.table_name()
        );
        let exists: bool = conn.query_row(&sql, params![user_id, application_id], |row| row.get(0))?;
        Ok(exists)
    }

    /// 用户是否持有任一该能力的委派 (不限申请)
    pub fn has_any(&self, capability: Capability, user_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1)",
            capability.table_name()
        );
        let exists: bool = conn.query_row(&sql, params![user_id], |row| row.get(0))?;
        Ok(exists)
    }

    /// 用户当前持有委派的全部申请ID (升序)
    pub fn list_applications(
        &self,
        capability: Capability,
        user_id: i64,
    ) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT application_id FROM {} WHERE user_id = ?1 ORDER BY application_id",
            capability.table_name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 批量指派 (原子替换)
    ///
    /// 事务内先清空该用户此能力下的全部委派, 再写入给定申请;
    /// 空列表直接成功返回, 不开启事务
    pub fn batch_assign(
        &self,
        capability: Capability,
        user_id: i64,
        application_ids: &[i64],
    ) -> RepositoryResult<usize> {
        if application_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let delete_sql = format!("DELETE FROM {} WHERE user_id = ?1", capability.table_name());
        tx.execute(&delete_sql, params![user_id])?;
        let inserted = Self::grant_in(&tx, capability, user_id, application_ids)?;

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(inserted)
    }

    /// 在调用方事务内追加委派 (已存在的行保持不变)
    ///
    /// 返回新写入的行数
    pub fn grant_in(
        conn: &Connection,
        capability: Capability,
        user_id: i64,
        application_ids: &[i64],
    ) -> RepositoryResult<usize> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (user_id, application_id, created_at) VALUES (?1, ?2, ?3)",
            capability.table_name()
        );
        let now = format_ts(&Utc::now());
        let mut stmt = conn.prepare(&sql)?;
        let mut inserted = 0;
        for id in dedup_ids(application_ids) {
            inserted += stmt.execute(params![user_id, id, now])?;
        }
        Ok(inserted)
    }

    /// 移除委派, 不存在的行不算错误
    pub fn remove(
        &self,
        capability: Capability,
        user_id: i64,
        application_ids: &[i64],
    ) -> RepositoryResult<usize> {
        if application_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        let ids = dedup_ids(application_ids);
        let mut values: Vec<Value> = Vec::with_capacity(ids.len() + 1);
        values.push(Value::Integer(user_id));
        values.extend(ids.iter().map(|id| Value::Integer(*id)));
        let sql = format!(
            "DELETE FROM {} WHERE user_id = ? AND application_id IN ({})",
            capability.table_name(),
            placeholders(ids.len())
        );
        let removed = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(removed)
    }

    // ==========================================
    // planner / manager 便捷方法
    // ==========================================

    pub fn is_planner(&self, user_id: i64, application_id: i64) -> RepositoryResult<bool> {
        self.is_delegated(Capability::Planner, user_id, application_id)
    }

    pub fn is_manager(&self, user_id: i64, application_id: i64) -> RepositoryResult<bool> {
        self.is_delegated(Capability::Manager, user_id, application_id)
    }

    pub fn batch_assign_planner(&self, user_id: i64, application_ids: &[i64]) -> RepositoryResult<usize> {
        self.batch_assign(Capability::Planner, user_id, application_ids)
    }

    pub fn batch_assign_manager(&self, user_id: i64, application_ids: &[i64]) -> RepositoryResult<usize> {
        self.batch_assign(Capability::Manager, user_id, application_ids)
    }

    pub fn remove_planner_assignments(&self, user_id: i64, application_ids: &[i64]) -> RepositoryResult<usize> {
        self.remove(Capability::Planner, user_id, application_ids)
    }

    pub fn remove_manager_assignments(&self, user_id: i64, application_ids: &[i64]) -> RepositoryResult<usize> {
        self.remove(Capability::Manager, user_id, application_ids)
    }

    pub fn list_planner_applications(&self, user_id: i64) -> RepositoryResult<Vec<i64>> {
        self.list_applications(Capability::Planner, user_id)
    }

    pub fn list_manager_applications(&self, user_id: i64) -> RepositoryResult<Vec<i64>> {
        self.list_applications(Capability::Manager, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Mutex<Connection>>, AssignmentRepository) {
        let conn = crate::db::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO phases (id, phase_code, title, assigned_planner_id, status, created_at, updated_at)
            VALUES (1, 'PH-2025-001', 'T', 1, 'draft', '', '');
            INSERT INTO phase_applications (id, phase_id, type, institution_name, qualification_name, status, created_at, updated_at)
            VALUES (1, 1, 'QP', 'I', 'Q', 'pending', '', ''),
                   (2, 1, 'QP', 'I', 'Q', 'pending', '', ''),
                   (3, 1, 'IL', 'I', 'Q', 'pending', '', '');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = AssignmentRepository::from_connection(conn.clone());
        (conn, repo)
    }

    #[test]
    fn test_batch_assign_reports_transaction_error_when_write_locked() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let holder = crate::db::open_sqlite_connection(path).unwrap();
        crate::db::ensure_schema(&holder).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        // 不等待写锁
        let conn = Connection::open(path).unwrap();
        conn.busy_timeout(std::time::Duration::ZERO).unwrap();
        let repo = AssignmentRepository::from_connection(Arc::new(Mutex::new(conn)));
        let err = repo.batch_assign_planner(3, &[1]).unwrap_err();
        assert!(matches!(err, RepositoryError::DatabaseTransactionError(_)));

        holder.execute_batch("ROLLBACK").unwrap();
    }

    #[test]
    fn test_batch_assign_empty_is_noop() {
        let (_conn, repo) = setup();
        assert_eq!(repo.batch_assign_planner(7, &[]).unwrap(), 0);
        assert!(repo.list_planner_applications(7).unwrap().is_empty());
    }

    #[test]
    fn test_batch_assign_replaces_previous_set() {
        let (_conn, repo) = setup();
        repo.batch_assign_planner(7, &[1, 2]).unwrap();
        repo.batch_assign_planner(7, &[1, 1]).unwrap();
        assert_eq!(repo.list_planner_applications(7).unwrap(), vec![1]);
        assert!(repo.is_planner(7, 1).unwrap());
        assert!(!repo.is_planner(7, 2).unwrap());
        assert!(!repo.is_manager(7, 1).unwrap());
    }

    #[test]
    fn test_batch_assign_keeps_other_users() {
        let (_conn, repo) = setup();
        repo.batch_assign_planner(7, &[1]).unwrap();
        repo.batch_assign_planner(8, &[1, 2]).unwrap();
        repo.batch_assign_planner(7, &[3]).unwrap();
        assert_eq!(repo.list_planner_applications(8).unwrap(), vec![1, 2]);
        assert_eq!(repo.list_planner_applications(7).unwrap(), vec![3]);
    }

    #[test]
    fn test_grant_in_is_additive() {
        let (conn, repo) = setup();
        repo.batch_assign_planner(7, &[1]).unwrap();
        {
            let guard = conn.lock().unwrap();
            let n = AssignmentRepository::grant_in(&guard, Capability::Planner, 7, &[1, 2]).unwrap();
            assert_eq!(n, 1);
        }
        assert_eq!(repo.list_planner_applications(7).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_batch_assign_unknown_application_rolls_back() {
        let (_conn, repo) = setup();
        repo.batch_assign_manager(7, &[2]).unwrap();
        let err = repo.batch_assign_manager(7, &[1, 99]).unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
        assert_eq!(repo.list_manager_applications(7).unwrap(), vec![2]);
    }

    #[test]
    fn test_remove_missing_rows_is_ok() {
        let (_conn, repo) = setup();
        repo.batch_assign_manager(7, &[1, 3]).unwrap();
        assert_eq!(repo.remove_manager_assignments(7, &[3, 2]).unwrap(), 1);
        assert_eq!(repo.list_manager_applications(7).unwrap(), vec![1]);
        assert!(repo.has_any(Capability::Manager, 7).unwrap());
        assert!(!repo.has_any(Capability::Planner, 7).unwrap());
    }
}
