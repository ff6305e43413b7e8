// ==========================================
// 专家评审阶段管理系统 - 主入口
// ==========================================
// 职责: 初始化日志、解析数据库路径、建表、装配 AppState 并输出就绪摘要
// ==========================================

use std::process::ExitCode;

use expert_review::app::{get_default_db_path, AppState};
use expert_review::logging;

const LOG_FORMAT_ENV: &str = "EXPERT_REVIEW_LOG_FORMAT";

fn main() -> ExitCode {
    // 初始化日志系统, EXPERT_REVIEW_LOG_FORMAT=json 时输出 JSON
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{}", expert_review::APP_NAME);
    tracing::info!("系统版本: {}", expert_review::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "AppState初始化失败");
            return ExitCode::FAILURE;
        }
    };

    match state.readiness() {
        Ok((phases, schema_version)) => {
            tracing::info!(phases, schema_version = ?schema_version, "系统就绪");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "就绪检查失败");
            ExitCode::FAILURE
        }
    }
}
