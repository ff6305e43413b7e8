// ==========================================
// 专家评审阶段管理系统 - 上下文授权
// ==========================================
// 职责: 判定调用者对某个申请是否持有 planner / manager 能力
// 规则:
// 1. admin / super_user 直接放行, 不查委派表
// 2. 其余角色按请求的能力查询委派表, Either 任一命中即放行
// 3. 委派表查询失败向上传播, 不视为拒绝
// ==========================================

use crate::domain::identity::Identity;
use crate::domain::types::{AccessCapability, Capability};
use crate::engine::role_hierarchy::RoleHierarchy;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::error::RepositoryResult;
use std::sync::Arc;

// ==========================================
// DelegationLookup Trait
// ==========================================
// 实现者: AssignmentRepository; 测试中可替换为内存实现
pub trait DelegationLookup: Send + Sync {
    fn is_delegated(
        &self,
        capability: Capability,
        user_id: i64,
        application_id: i64,
    ) -> RepositoryResult<bool>;
}

impl DelegationLookup for AssignmentRepository {
    fn is_delegated(
        &self,
        capability: Capability,
        user_id: i64,
        application_id: i64,
    ) -> RepositoryResult<bool> {
        AssignmentRepository::is_delegated(self, capability, user_id, application_id)
    }
}

// ==========================================
// AccessGuard - 两级授权
// ==========================================
pub struct AccessGuard {
    lookup: Arc<dyn DelegationLookup>,
}

impl AccessGuard {
    pub fn new(lookup: Arc<dyn DelegationLookup>) -> Self {
        Self { lookup }
    }

    /// 授权判定
    ///
    /// # 返回
    /// - Ok(true): 放行
    /// - Ok(false): 拒绝, 调用方映射为 Forbidden
    /// - Err: 委派表查询失败
    pub fn authorize(
        &self,
        identity: &Identity,
        capability: AccessCapability,
        application_id: i64,
    ) -> RepositoryResult<bool> {
        if RoleHierarchy::bypasses_delegation(identity.role) {
            tracing::trace!(
                user_id = identity.user_id,
                role = %identity.role,
                application_id,
                "基础角色放行"
            );
            return Ok(true);
        }

        for candidate in capability.candidates() {
            if self
                .lookup
                .is_delegated(*candidate, identity.user_id, application_id)?
            {
                return Ok(true);
            }
        }

        tracing::debug!(
            user_id = identity.user_id,
            capability = %capability,
            application_id,
            "未持有委派能力"
        );
        Ok(false)
    }
}
