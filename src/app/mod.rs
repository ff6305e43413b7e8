// ==========================================
// 专家评审阶段管理系统 - 应用层
// ==========================================
// 职责: 装配仓储/引擎/API, 解析数据库路径
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
