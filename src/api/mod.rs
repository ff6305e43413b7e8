// ==========================================
// 专家评审阶段管理系统 - API 层
// ==========================================
// 职责: 提供业务用例接口 (权限门禁 + 校验 + 错误分类), 供上层传输层调用
// ==========================================

mod access;
pub mod application_api;
pub mod assignment_api;
pub mod error;
pub mod phase_api;

// 重导出核心类型
pub use application_api::ApplicationApi;
pub use assignment_api::{AssignmentApi, UserAssignments};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use phase_api::PhaseApi;
