// ==========================================
// 专家评审阶段管理系统 - 角色层级纯函数库
// ==========================================
// 职责: 基础角色比较、角色管理资格判定
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::types::Role;

// ==========================================
// RoleHierarchy - 纯函数工具类
// ==========================================
pub struct RoleHierarchy;

impl RoleHierarchy {
    /// 角色权重, 未知角色为 0
    pub fn weight(role: Option<Role>) -> u8 {
        role.map(|r| r.weight()).unwrap_or(0)
    }

    /// actual 的权重是否不低于 minimum
    ///
    /// 未知角色 (None) 不满足任何最低要求
    pub fn has_role(actual: Option<Role>, minimum: Role) -> bool {
        Self::weight(actual) >= minimum.weight()
    }

    /// manager 是否可以管理 target
    ///
    /// # 规则
    /// - super_user 可管理除 super_user 外的所有已知角色
    /// - admin 只能管理 user
    /// - 其他角色不能管理任何角色
    pub fn can_manage(manager: Option<Role>, target: Option<Role>) -> bool {
        match (manager, target) {
            (Some(Role::SuperUser), Some(Role::Admin | Role::User)) => true,
            (Some(Role::Admin), Some(Role::User)) => true,
            _ => false,
        }
    }

    /// 是否享有全局放行 (admin 及以上)
    pub fn bypasses_delegation(role: Role) -> bool {
        Self::has_role(Some(role), Role::Admin)
    }
}
