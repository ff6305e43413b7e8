// ==========================================
// 专家评审阶段管理系统 - API 层公共门禁与审计
// ==========================================
// 职责: 基础角色门禁、按申请的两级授权门禁、操作日志留痕
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::identity::Identity;
use crate::domain::types::{AccessCapability, Role};
use crate::engine::access_guard::AccessGuard;
use crate::engine::role_hierarchy::RoleHierarchy;
use crate::repository::action_log_repo::ActionLogRepository;

/// 要求基础角色不低于 minimum
pub(crate) fn require_role(identity: &Identity, minimum: Role, operation: &str) -> ApiResult<()> {
    if RoleHierarchy::has_role(Some(identity.role), minimum) {
        return Ok(());
    }
    tracing::debug!(
        user_id = identity.user_id,
        role = %identity.role,
        operation,
        "基础角色不足"
    );
    Err(ApiError::Forbidden(format!(
        "{} requires role {} or higher",
        operation, minimum
    )))
}

/// 要求对申请持有委派能力 (admin 以上直接放行)
pub(crate) fn require_capability(
    guard: &AccessGuard,
    identity: &Identity,
    capability: AccessCapability,
    application_id: i64,
) -> ApiResult<()> {
    if guard.authorize(identity, capability, application_id)? {
        return Ok(());
    }
    Err(ApiError::Forbidden(format!(
        "user {} lacks {} access to application {}",
        identity.user_id, capability, application_id
    )))
}

/// 写入操作日志
///
/// 主事务已提交, 日志失败只告警不影响结果
pub(crate) fn record_action(repo: &ActionLogRepository, log: ActionLog) {
    if let Err(e) = repo.insert(&log) {
        tracing::warn!(
            action_type = %log.action_type,
            actor_id = log.actor_id,
            error = %e,
            "操作日志写入失败"
        );
    }
}

/// 记录并返回校验错误
pub(crate) fn reject(operation: &str, violations: Vec<String>) -> ApiError {
    tracing::debug!(operation, violations = ?violations, "校验未通过");
    ApiError::Validation(violations)
}
