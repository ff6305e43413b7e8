// ==========================================
// 专家评审阶段管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、封闭枚举、类型化的查询/写入参数
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod engagement;
pub mod identity;
pub mod phase;
pub mod requests;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use engagement::{Engagement, ExpertRating, NewEngagement, ENGAGEMENT_STATUS_ACTIVE};
pub use identity::{Identity, UserRecord};
pub use phase::{
    ApplicationFilter, ApplicationPage, ExpertSlots, ManagerTask, NewApplication, NewPhase, Phase,
    PhaseApplication, PhaseFilter, PhaseUpdate,
};
pub use requests::{
    ApplicationInput, AssignExpertsRequest, CreatePhaseRequest, RatingRequest, ReviewRequest,
    UpdatePhaseRequest,
};
pub use types::{
    AccessCapability, ApplicationStatus, ApplicationType, Capability, EngagementType,
    PhaseStatus, ReviewAction, Role,
};
