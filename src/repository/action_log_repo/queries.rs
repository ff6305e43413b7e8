use super::core::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::RepositoryResult;
use crate::repository::sql_utils::{parse_enum, parse_ts};
use rusqlite::types::Type;
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_LOG: &str = r#"
    SELECT action_id, action_type, action_ts, actor_id,
           phase_id, application_id, target_user_id,
           payload_json, detail
    FROM action_log
"#;

/// 日志作用对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Phase(i64),
    Application(i64),
    User(i64),
}

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE action_id = ?", SELECT_LOG);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![action_id], |row| self.map_row(row)) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询最近的操作日志
    pub fn list_recent(&self, limit: u32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY action_ts DESC LIMIT ?", SELECT_LOG);
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询作用于指定对象的操作日志 (时间倒序)
    pub fn list_by_target(&self, target: LogTarget) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let (column, id) = match target {
            LogTarget::Phase(id) => ("phase_id", id),
            LogTarget::Application(id) => ("application_id", id),
            LogTarget::User(id) => ("target_user_id", id),
        };
        let sql = format!("{} WHERE {} = ? ORDER BY action_ts DESC", SELECT_LOG, column);
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 映射数据库行到 ActionLog
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_type: String = row.get(1)?;
        let action_ts: String = row.get(2)?;
        let payload_json = row
            .get::<_, Option<String>>(7)?
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: parse_enum(1, &action_type, "action type", ActionType::parse)?,
            action_ts: parse_ts(2, &action_ts)?,
            actor_id: row.get(3)?,
            phase_id: row.get(4)?,
            application_id: row.get(5)?,
            target_user_id: row.get(6)?,
            payload_json,
            detail: row.get(8)?,
        })
    }
}
