// ==========================================
// 专家评审阶段管理系统 - 委派能力管理 API
// ==========================================
// 职责: planner / manager 委派的批量指派、移除、查询, 以及授权判定
// 权限: 批量指派/移除要求 admin 及以上, 且调用者可管理目标用户的角色
// 语义: 批量指派为该用户此能力下的原子整体替换
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::access::{record_action, reject, require_role};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::identity::{Identity, UserRecord};
use crate::domain::types::{AccessCapability, Capability, Role};
use crate::engine::access_guard::AccessGuard;
use crate::engine::role_hierarchy::RoleHierarchy;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::application_repo::ApplicationRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::directory_repo::UserDirectory;
use crate::repository::sql_utils::dedup_ids;

/// 用户当前持有的委派
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignments {
    pub user_id: i64,
    pub planner_applications: Vec<i64>,
    pub manager_applications: Vec<i64>,
}

// ==========================================
// AssignmentApi - 委派能力管理 API
// ==========================================
pub struct AssignmentApi {
    assignment_repo: Arc<AssignmentRepository>,
    application_repo: Arc<ApplicationRepository>,
    users: Arc<dyn UserDirectory>,
    guard: Arc<AccessGuard>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl AssignmentApi {
    pub fn new(
        assignment_repo: Arc<AssignmentRepository>,
        application_repo: Arc<ApplicationRepository>,
        users: Arc<dyn UserDirectory>,
        guard: Arc<AccessGuard>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            assignment_repo,
            application_repo,
            users,
            guard,
            action_log_repo,
        }
    }

    /// 授权判定
    ///
    /// # 返回
    /// - Ok(true/false): 是否放行
    /// - Err(ApiError): 委派表查询失败 (内部错误, 不视为拒绝)
    pub fn authorize(
        &self,
        identity: &Identity,
        capability: AccessCapability,
        application_id: i64,
    ) -> ApiResult<bool> {
        Ok(self.guard.authorize(identity, capability, application_id)?)
    }

    pub fn batch_assign_planner(
        &self,
        identity: &Identity,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        self.batch_assign(identity, Capability::Planner, user_id, application_ids)
    }

    pub fn batch_assign_manager(
        &self,
        identity: &Identity,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        self.batch_assign(identity, Capability::Manager, user_id, application_ids)
    }

    pub fn remove_planner_assignments(
        &self,
        identity: &Identity,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        self.remove(identity, Capability::Planner, user_id, application_ids)
    }

    pub fn remove_manager_assignments(
        &self,
        identity: &Identity,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        self.remove(identity, Capability::Manager, user_id, application_ids)
    }

    /// 查询用户的全部委派 (admin 及以上, 或查询自己)
    pub fn list_user_assignments(&self, identity: &Identity, user_id: i64) -> ApiResult<UserAssignments> {
        if identity.user_id != user_id {
            require_role(identity, Role::Admin, "list user assignments")?;
        }
        Ok(UserAssignments {
            user_id,
            planner_applications: self.assignment_repo.list_planner_applications(user_id)?,
            manager_applications: self.assignment_repo.list_manager_applications(user_id)?,
        })
    }

    // ==========================================
    // 内部实现
    // ==========================================

    /// 批量指派
    ///
    /// # 流程
    /// 1. 调用者角色与目标用户校验
    /// 2. 申请ID去重, 空列表直接成功
    /// 3. 校验全部申请存在 (汇总全部缺失ID)
    /// 4. 事务内整体替换
    fn batch_assign(
        &self,
        identity: &Identity,
        capability: Capability,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        let operation = format!("assign {}", capability);
        require_role(identity, Role::Admin, &operation)?;
        let target = self.require_manageable_user(identity, user_id)?;

        let ids = dedup_ids(application_ids);
        if ids.is_empty() {
            tracing::debug!(user_id, capability = %capability, "空列表, 跳过批量指派");
            return Ok(0);
        }

        let missing = self.application_repo.find_missing(&ids)?;
        if !missing.is_empty() {
            let violations = missing
                .iter()
                .map(|id| format!("application {} does not exist", id))
                .collect();
            return Err(reject(&operation, violations));
        }

        let inserted = self.assignment_repo.batch_assign(capability, user_id, &ids)?;

        tracing::info!(
            user_id,
            capability = %capability,
            applications = ids.len(),
            actor_id = identity.user_id,
            "委派已替换"
        );
        let action_type = match capability {
            Capability::Planner => ActionType::AssignPlanner,
            Capability::Manager => ActionType::AssignManager,
        };
        record_action(
            &self.action_log_repo,
            ActionLog::new(action_type, identity.user_id)
                .with_target_user(target.id)
                .with_payload(json!({ "application_ids": ids })),
        );
        Ok(inserted)
    }

    fn remove(
        &self,
        identity: &Identity,
        capability: Capability,
        user_id: i64,
        application_ids: &[i64],
    ) -> ApiResult<usize> {
        let operation = format!("remove {}", capability);
        require_role(identity, Role::Admin, &operation)?;
        let target = self.require_manageable_user(identity, user_id)?;

        let ids = dedup_ids(application_ids);
        let removed = self.assignment_repo.remove(capability, user_id, &ids)?;

        tracing::info!(
            user_id,
            capability = %capability,
            removed,
            actor_id = identity.user_id,
            "委派已移除"
        );
        let action_type = match capability {
            Capability::Planner => ActionType::RemovePlanner,
            Capability::Manager => ActionType::RemoveManager,
        };
        record_action(
            &self.action_log_repo,
            ActionLog::new(action_type, identity.user_id)
                .with_target_user(target.id)
                .with_payload(json!({ "application_ids": ids, "removed": removed })),
        );
        Ok(removed)
    }

    /// 目标用户必须存在、角色已知, 且调用者可管理该角色
    fn require_manageable_user(&self, identity: &Identity, user_id: i64) -> ApiResult<UserRecord> {
        let user = self
            .users
            .get_user(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User with ID {} not found", user_id)))?;
        if user.role.is_none() {
            return Err(reject(
                "manage delegation",
                vec![format!(
                    "user with ID {} has invalid role for elevation assignment",
                    user_id
                )],
            ));
        }
        if !RoleHierarchy::can_manage(Some(identity.role), user.role) {
            return Err(ApiError::Forbidden(format!(
                "role {} cannot manage delegations of user {}",
                identity.role, user_id
            )));
        }
        Ok(user)
    }
}
