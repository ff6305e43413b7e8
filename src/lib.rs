// ==========================================
// 专家评审阶段管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 评审阶段工作流与委派授权核心 (无传输层)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AccessCapability, ApplicationStatus, ApplicationType, Capability, EngagementType, PhaseStatus,
    ReviewAction, Role,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Engagement, ExpertRating, Identity, Phase, PhaseApplication, UserRecord,
};

// 引擎
pub use engine::{AccessGuard, RoleHierarchy, WorkflowRules};

// API
pub use api::{ApiError, ApiResult, ApplicationApi, AssignmentApi, ErrorKind, PhaseApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "专家评审阶段管理系统";
