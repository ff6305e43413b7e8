// ==========================================
// 专家评审阶段管理系统 - 引擎层
// ==========================================
// 职责: 实现业务规则 (角色层级、上下文授权、工作流校验), 不拼 SQL
// 红线: Engine 不拼 SQL, 所有拒绝必须给出原因
// ==========================================

pub mod access_guard;
pub mod role_hierarchy;
pub mod workflow_rules;

// 重导出核心引擎
pub use access_guard::{AccessGuard, DelegationLookup};
pub use role_hierarchy::RoleHierarchy;
pub use workflow_rules::{PlannerCheck, Violations, WorkflowRules};
