// ==========================================
// 专家评审阶段管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 多语句写入一律在单个事务内完成
// ==========================================

pub mod action_log_repo;
pub mod application_repo;
pub mod assignment_repo;
pub mod directory_repo;
pub mod directory_repo_impl;
pub mod engagement_repo;
pub mod error;
pub mod phase_repo;
pub mod rating_repo;
pub mod sql_utils;

// 重导出核心仓储
pub use action_log_repo::{ActionLogRepository, LogTarget};
pub use application_repo::{ApplicationRepository, ReviewOutcome};
pub use assignment_repo::AssignmentRepository;
pub use directory_repo::{ExpertDirectory, UserDirectory};
pub use directory_repo_impl::{SqliteExpertDirectory, SqliteUserDirectory};
pub use engagement_repo::EngagementRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use phase_repo::PhaseRepository;
pub use rating_repo::RatingRepository;
