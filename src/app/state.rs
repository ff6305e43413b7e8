// ==========================================
// 专家评审阶段管理系统 - 应用状态
// ==========================================
// 职责: 打开数据库、初始化表结构、装配共享的仓储与 API 实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ApplicationApi, AssignmentApi, PhaseApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version};
use crate::engine::access_guard::{AccessGuard, DelegationLookup};
use crate::repository::{
    action_log_repo::ActionLogRepository,
    application_repo::ApplicationRepository,
    assignment_repo::AssignmentRepository,
    directory_repo::{ExpertDirectory, UserDirectory},
    directory_repo_impl::{SqliteExpertDirectory, SqliteUserDirectory},
    engagement_repo::EngagementRepository,
    error::{RepositoryError, RepositoryResult},
    phase_repo::PhaseRepository,
    rating_repo::RatingRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "EXPERT_REVIEW_DB_PATH";

/// 应用状态
///
/// 所有仓储共享同一个连接; 每个 AppState 持有独立连接,
/// 多个 AppState 指向同一文件时由 SQLite 事务保证并发正确性
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 阶段管理API
    pub phase_api: Arc<PhaseApi>,

    /// 申请评审API
    pub application_api: Arc<ApplicationApi>,

    /// 委派能力管理API
    pub assignment_api: Arc<AssignmentApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    phase_repo: Arc<PhaseRepository>,
    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并设置 PRAGMA
    /// 2. 幂等建表
    /// 3. 初始化所有Repository与API
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path).map_err(RepositoryError::connection)?;
        ensure_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let phase_repo = Arc::new(PhaseRepository::from_connection(conn.clone()));
        let application_repo = Arc::new(ApplicationRepository::from_connection(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::from_connection(conn.clone()));
        let engagement_repo = Arc::new(EngagementRepository::from_connection(conn.clone()));
        let rating_repo = Arc::new(RatingRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));

        let experts: Arc<dyn ExpertDirectory> = Arc::new(SqliteExpertDirectory::new(conn.clone()));
        let users: Arc<dyn UserDirectory> = Arc::new(SqliteUserDirectory::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let lookup: Arc<dyn DelegationLookup> = assignment_repo.clone();
        let guard = Arc::new(AccessGuard::new(lookup));

        // ==========================================
        // 初始化API层
        // ==========================================
        let phase_api = Arc::new(PhaseApi::new(
            phase_repo.clone(),
            application_repo.clone(),
            assignment_repo.clone(),
            experts.clone(),
            users.clone(),
            config_manager.clone(),
            action_log_repo.clone(),
        ));
        let application_api = Arc::new(ApplicationApi::new(
            application_repo.clone(),
            engagement_repo,
            rating_repo,
            experts,
            guard.clone(),
            config_manager.clone(),
            action_log_repo.clone(),
        ));
        let assignment_api = Arc::new(AssignmentApi::new(
            assignment_repo,
            application_repo,
            users,
            guard,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            phase_api,
            application_api,
            assignment_api,
            config_manager,
            action_log_repo,
            phase_repo,
            conn,
        })
    }

    /// 启动摘要: (阶段数, 表结构版本)
    pub fn readiness(&self) -> RepositoryResult<(i64, Option<i64>)> {
        let phases = self.phase_repo.count()?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let version = read_schema_version(&conn)?;
        Ok((phases, version))
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 EXPERT_REVIEW_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./expert_review.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("expert-review");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("expert_review.db");
        }
    }
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_bootstrap_is_idempotent() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();

        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.readiness().unwrap(), (0, Some(crate::db::CURRENT_SCHEMA_VERSION)));

        // 重复打开不报错
        let again = AppState::new(path).unwrap();
        assert_eq!(again.readiness().unwrap().0, 0);
    }
}
