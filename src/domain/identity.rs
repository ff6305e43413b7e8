// ==========================================
// 专家评审阶段管理系统 - 身份领域模型
// ==========================================
// 职责: 已验证的调用者身份, 用户登记簿的查询结果
// 说明: 身份验证 (JWT 等) 在本核心之外完成
// ==========================================

use crate::domain::types::Role;
use serde::{Deserialize, Serialize};

// ==========================================
// Identity - 已验证身份
// ==========================================
/// 调用者身份
///
/// 由上游完成令牌校验后构造, 本核心只信任其 (user_id, role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

// ==========================================
// UserRecord - 用户登记簿记录
// ==========================================
/// 用户登记簿返回的用户
///
/// `role = None` 表示数据库中的角色不在三种基础角色之内
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub role: Option<Role>,
}
