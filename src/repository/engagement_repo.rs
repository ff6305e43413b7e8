// ==========================================
// 专家评审阶段管理系统 - 聘任记录仓储
// ==========================================
// 职责: expert_engagements 的写入与查询
// 说明: 写入只发生在申请批准事务内, 见 insert_in
// ==========================================

use crate::domain::engagement::{Engagement, NewEngagement};
use crate::domain::types::EngagementType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_enum, parse_ts};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT id, expert_id, engagement_type, start_date, project_name,
           status, notes, source_application_id, created_at
    FROM expert_engagements
"#;

pub struct EngagementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EngagementRepository {
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

    /// 在调用方事务内写入一条聘任, 返回新ID
    pub fn insert_in(conn: &Connection, engagement: &NewEngagement) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO expert_engagements (
                expert_id, engagement_type, start_date, project_name,
                status, notes, source_application_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                engagement.expert_id,
                engagement.engagement_type.to_db_str(),
                format_ts(&engagement.start_date),
                engagement.project_name,
                engagement.status,
                engagement.notes,
                engagement.source_application_id,
                format_ts(&Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询专家的全部聘任 (按开始时间倒序)
    pub fn list_by_expert(&self, expert_id: i64) -> RepositoryResult<Vec<Engagement>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE expert_id = ?1 ORDER BY start_date DESC, id DESC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![expert_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询由某申请批准生成的聘任 (按ID升序)
    pub fn list_by_application(&self, application_id: i64) -> RepositoryResult<Vec<Engagement>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE source_application_id = ?1 ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![application_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Engagement> {
        let engagement_type: String = row.get(2)?;
        let start_date: String = row.get(3)?;
        let created_at: String = row.get(8)?;
        Ok(Engagement {
            id: row.get(0)?,
            expert_id: row.get(1)?,
            engagement_type: parse_enum(2, &engagement_type, "engagement type", EngagementType::parse)?,
            start_date: parse_ts(3, &start_date)?,
            project_name: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            source_application_id: row.get(7)?,
            created_at: parse_ts(8, &created_at)?,
        })
    }
}
