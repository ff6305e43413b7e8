// ==========================================
// 专家评审阶段管理系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键、busy_timeout)
// - 统一建表入口 ensure_schema, 幂等执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置, 并发写入时等待写锁而不是立即报 busy
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

/// 打开内存数据库 (单元测试使用), 并完成建表
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
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

/// 建表（幂等）
///
/// 说明：
/// - users / experts 由外部登记簿维护, 这里只保证表存在, 本核心只读
/// - 委派表以 (user_id, application_id) 为主键, 随申请删除级联删除
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS experts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS phases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phase_code TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL CHECK(length(trim(title)) > 0),
            assigned_planner_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('draft', 'in_progress', 'completed', 'cancelled')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_phases_planner ON phases(assigned_planner_id);
        CREATE INDEX IF NOT EXISTS idx_phases_created_at ON phases(created_at DESC);

        CREATE TABLE IF NOT EXISTS phase_applications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phase_id INTEGER NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            institution_name TEXT NOT NULL,
            qualification_name TEXT NOT NULL,
            expert_1 INTEGER,
            expert_2 INTEGER,
            status TEXT NOT NULL CHECK(status IN ('pending', 'assigned', 'approved', 'rejected')),
            rejection_notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_phase_applications_phase ON phase_applications(phase_id);
        CREATE INDEX IF NOT EXISTS idx_phase_applications_status ON phase_applications(status);

        CREATE TABLE IF NOT EXISTS application_planners (
            user_id INTEGER NOT NULL,
            application_id INTEGER NOT NULL REFERENCES phase_applications(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, application_id)
        );
        CREATE INDEX IF NOT EXISTS idx_application_planners_app ON application_planners(application_id);

        CREATE TABLE IF NOT EXISTS application_managers (
            user_id INTEGER NOT NULL,
            application_id INTEGER NOT NULL REFERENCES phase_applications(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, application_id)
        );
        CREATE INDEX IF NOT EXISTS idx_application_managers_app ON application_managers(application_id);

        CREATE TABLE IF NOT EXISTS expert_engagements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expert_id INTEGER NOT NULL,
            engagement_type TEXT NOT NULL CHECK(engagement_type IN ('validator', 'evaluator')),
            start_date TEXT NOT NULL,
            project_name TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            source_application_id INTEGER,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_expert_engagements_expert ON expert_engagements(expert_id);
        CREATE INDEX IF NOT EXISTS idx_expert_engagements_source ON expert_engagements(source_application_id);

        CREATE TABLE IF NOT EXISTS application_ratings (
            application_id INTEGER NOT NULL REFERENCES phase_applications(id) ON DELETE CASCADE,
            expert_id INTEGER NOT NULL,
            rating INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
            comment TEXT,
            rated_by INTEGER NOT NULL,
            rated_at TEXT NOT NULL,
            PRIMARY KEY (application_id, expert_id)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor_id INTEGER NOT NULL,
            phase_id INTEGER,
            application_id INTEGER,
            target_user_id INTEGER,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts DESC);
        CREATE INDEX IF NOT EXISTS idx_action_log_application ON action_log(application_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = open_in_memory().unwrap();
        let result = conn.execute(
            "INSERT INTO phases (phase_code, title, assigned_planner_id, status, created_at, updated_at)
             VALUES ('PH-2025-001', 'T', 1, 'archived', '', '')",
            [],
        );
        assert!(result.is_err(), "非法状态应被 CHECK 约束拒绝");
    }
}
