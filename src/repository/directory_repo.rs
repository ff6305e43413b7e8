// ==========================================
// 专家评审阶段管理系统 - 外部登记簿 Repository Trait
// ==========================================
// 职责: 专家登记簿/用户登记簿的只读查询接口
// 红线: 本核心不写入 experts / users 表
// ==========================================

use crate::domain::identity::UserRecord;
use crate::repository::error::RepositoryResult;

// ==========================================
// ExpertDirectory Trait
// ==========================================
// 用途: 指派专家前校验专家ID真实存在
// 实现者: SqliteExpertDirectory
pub trait ExpertDirectory: Send + Sync {
    /// 专家是否存在
    fn expert_exists(&self, expert_id: i64) -> RepositoryResult<bool>;
}

// ==========================================
// UserDirectory Trait
// ==========================================
// 用途: 校验规划人候选用户及其基础角色
// 实现者: SqliteUserDirectory
pub trait UserDirectory: Send + Sync {
    /// 按ID查询用户
    ///
    /// # 返回
    /// - Ok(None): 用户不存在
    /// - Ok(Some(user)): user.role 为 None 表示角色未知
    fn get_user(&self, user_id: i64) -> RepositoryResult<Option<UserRecord>>;
}
