// ==========================================
// 专家评审阶段管理系统 - 评审阶段仓储
// ==========================================
// 职责: phases 的读写, 业务编号 PH-<年>-<序号> 生成
// 红线: 编号生成 + 阶段写入 + 全部申请写入 在同一 IMMEDIATE 事务内
// ==========================================

use crate::domain::phase::{NewPhase, Phase, PhaseFilter, PhaseUpdate};
use crate::domain::types::{Capability, PhaseStatus};
use crate::repository::application_repo::ApplicationRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_enum, parse_ts};
use chrono::{Datelike, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

const SELECT_PHASE: &str = r#"
    SELECT p.id, p.phase_code, p.title, p.assigned_planner_id, u.name,
           p.status, p.created_at, p.updated_at
    FROM phases p
    LEFT JOIN users u ON u.id = p.assigned_planner_id
"#;

// ==========================================
// PhaseRepository - 评审阶段仓储
// ==========================================
pub struct PhaseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PhaseRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn =
            crate::db::open_sqlite_connection(db_path).map_err(RepositoryError::connection)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 业务编号生成
    // ==========================================

    /// 生成下一个可用的阶段编号
    ///
    /// 以当年已有编号数 + 1 为起点, 冲突时逐个向上探测,
    /// 探测 `probe_limit` 次仍冲突则返回 PhaseCodeExhausted
    pub fn next_phase_code(conn: &Connection, year: i32, probe_limit: u32) -> RepositoryResult<String> {
        let pattern = format!("PH-{}-%", year);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM phases WHERE phase_code LIKE ?1",
            params![pattern],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM phases WHERE phase_code = ?1)")?;
        for attempt in 0..probe_limit {
            let code = format!("PH-{}-{:03}", year, count + 1 + i64::from(attempt));
            let taken: bool = stmt.query_row(params![code], |row| row.get(0))?;
            if !taken {
                return Ok(code);
            }
            tracing::debug!(code = %code, "阶段编号已占用, 继续探测");
        }

        Err(RepositoryError::PhaseCodeExhausted {
            year,
            attempts: probe_limit,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 创建阶段及其全部申请
    ///
    /// # 参数
    /// - `probe_limit`: 编号探测上限
    /// - `grant_planner_to`: 同一事务内授予该用户全部新申请的 planner 委派
    pub fn create_with_applications(
        &self,
        new_phase: &NewPhase,
        probe_limit: u32,
        grant_planner_to: Option<i64>,
    ) -> RepositoryResult<Phase> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let now = Utc::now();
        let code = Self::next_phase_code(&tx, now.year(), probe_limit)?;
        let ts = format_ts(&now);
        tx.execute(
            r#"
            INSERT INTO phases (phase_code, title, assigned_planner_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![
                code,
                new_phase.title,
                new_phase.assigned_planner_id,
                new_phase.status.to_db_str(),
                ts,
            ],
        )?;
        let phase_id = tx.last_insert_rowid();

        let mut application_ids = Vec::with_capacity(new_phase.applications.len());
        for application in &new_phase.applications {
            application_ids.push(ApplicationRepository::insert_in(&tx, phase_id, application, &now)?);
        }
        if let Some(user_id) = grant_planner_to {
            AssignmentRepository::grant_in(&tx, Capability::Planner, user_id, &application_ids)?;
        }

        let phase = Self::find_in(&tx, phase_id)?
            .ok_or_else(|| RepositoryError::not_found("Phase", phase_id))?;
        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(phase)
    }

    /// 全字段更新
    ///
    /// `grant_planner_to`: 同一事务内授予该用户阶段内全部申请的 planner 委派
    pub fn update(
        &self,
        id: i64,
        update: &PhaseUpdate,
        grant_planner_to: Option<i64>,
    ) -> RepositoryResult<Phase> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let changed = tx.execute(
            r#"
            UPDATE phases
            SET title = ?1, assigned_planner_id = ?2, status = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                update.title,
                update.assigned_planner_id,
                update.status.to_db_str(),
                format_ts(&Utc::now()),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::not_found("Phase", id));
        }

        if let Some(user_id) = grant_planner_to {
            let application_ids = ApplicationRepository::ids_by_phase_in(&tx, id)?;
            AssignmentRepository::grant_in(&tx, Capability::Planner, user_id, &application_ids)?;
        }

        let phase = Self::find_in(&tx, id)?.ok_or_else(|| RepositoryError::not_found("Phase", id))?;
        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(phase)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按ID读取阶段 (含申请)
    pub fn find_in(conn: &Connection, id: i64) -> RepositoryResult<Option<Phase>> {
        let sql = format!("{} WHERE p.id = ?1", SELECT_PHASE);
        let phase = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Self::attach_applications(conn, phase)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Phase>> {
        let conn = self.get_conn()?;
        Self::find_in(&conn, id)
    }

    pub fn find_by_code(&self, phase_code: &str) -> RepositoryResult<Option<Phase>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE p.phase_code = ?1", SELECT_PHASE);
        let phase = conn
            .query_row(&sql, params![phase_code.trim()], Self::map_row)
            .optional()?;
        Self::attach_applications(&conn, phase)
    }

    /// 阶段的规划人ID (阶段不存在返回 None)
    pub fn planner_of(&self, id: i64) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        let planner = conn
            .query_row(
                "SELECT assigned_planner_id FROM phases WHERE id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(planner)
    }

    /// 条件过滤 (创建时间倒序)
    pub fn list(&self, filter: &PhaseFilter, limit: u32, offset: u32) -> RepositoryResult<Vec<Phase>> {
        let conn = self.get_conn()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            conditions.push("p.status = ?");
            values.push(Value::Text(status.to_db_str().to_string()));
        }
        if let Some(planner_id) = filter.planner_id {
            conditions.push("p.assigned_planner_id = ?");
            values.push(Value::Integer(planner_id));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "{}{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            SELECT_PHASE, where_clause
        );
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));

        let mut stmt = conn.prepare(&sql)?;
        let phases = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = Vec::with_capacity(phases.len());
        for mut phase in phases {
            phase.applications = ApplicationRepository::list_by_phase_in(&conn, phase.id)?;
            result.push(phase);
        }
        Ok(result)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM phases", [], |row| row.get(0))?;
        Ok(count)
    }

    fn attach_applications(conn: &Connection, phase: Option<Phase>) -> RepositoryResult<Option<Phase>> {
        match phase {
            Some(mut phase) => {
                phase.applications = ApplicationRepository::list_by_phase_in(conn, phase.id)?;
                Ok(Some(phase))
            }
            None => Ok(None),
        }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Phase> {
        let status: String = row.get(5)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;
        Ok(Phase {
            id: row.get(0)?,
            phase_code: row.get(1)?,
            title: row.get(2)?,
            assigned_planner_id: row.get(3)?,
            planner_name: row.get(4)?,
            status: parse_enum(5, &status, "phase status", PhaseStatus::parse)?,
            created_at: parse_ts(6, &created_at)?,
            updated_at: parse_ts(7, &updated_at)?,
            applications: Vec::new(),
        })
    }
}
