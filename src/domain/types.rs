// ==========================================
// 专家评审阶段管理系统 - 领域类型定义
// ==========================================
// 职责: 角色、委派能力、阶段/申请状态等封闭枚举
// 约束: 数据库存储值与 to_db_str() 一一对应, 解析失败返回 None
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 基础角色 (Base Role)
// ==========================================
// 层级: super_user > admin > user
// 基础角色不过期, 也不绑定任何资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperUser, // 超级用户
    Admin,     // 管理员
    User,      // 普通用户 (可按申请提升为 planner/manager)
}

impl Role {
    /// 角色权重 (数值越大权限越高)
    pub fn weight(&self) -> u8 {
        match self {
            Role::SuperUser => 30,
            Role::Admin => 20,
            Role::User => 10,
        }
    }

    /// 从数据库字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "super_user" => Some(Role::SuperUser),
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    /// 转换为数据库字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::SuperUser => "super_user",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 委派能力 (Delegated Capability)
// ==========================================
// 按申请授予, 与基础角色相互独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Planner, // 规划人: 指派专家
    Manager, // 管理人: 评审与评分
}

impl Capability {
    /// 委派关系所在的表
    pub fn table_name(&self) -> &'static str {
        match self {
            Capability::Planner => "application_planners",
            Capability::Manager => "application_managers",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Planner => write!(f, "planner"),
            Capability::Manager => write!(f, "manager"),
        }
    }
}

// ==========================================
// 授权请求的能力 (Requested Capability)
// ==========================================
// Either: planner 或 manager 任一即可
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCapability {
    Planner,
    Manager,
    Either,
}

impl AccessCapability {
    /// 需要检查的委派能力列表 (按顺序, 任一命中即放行)
    pub fn candidates(&self) -> &'static [Capability] {
        match self {
            AccessCapability::Planner => &[Capability::Planner],
            AccessCapability::Manager => &[Capability::Manager],
            AccessCapability::Either => &[Capability::Planner, Capability::Manager],
        }
    }
}

impl From<Capability> for AccessCapability {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::Planner => AccessCapability::Planner,
            Capability::Manager => AccessCapability::Manager,
        }
    }
}

impl fmt::Display for AccessCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessCapability::Planner => write!(f, "planner"),
            AccessCapability::Manager => write!(f, "manager"),
            AccessCapability::Either => write!(f, "planner|manager"),
        }
    }
}

// ==========================================
// 阶段状态 (Phase Status)
// ==========================================
// 阶段只是容器, 四个状态之间可任意切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Draft,      // 草稿
    InProgress, // 进行中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl PhaseStatus {
    pub const ALLOWED: &'static str = "draft, in_progress, completed, cancelled";

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "draft" => Some(PhaseStatus::Draft),
            "in_progress" => Some(PhaseStatus::InProgress),
            "completed" => Some(PhaseStatus::Completed),
            "cancelled" => Some(PhaseStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            PhaseStatus::Draft => "draft",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for PhaseStatus {
    fn default() -> Self {
        PhaseStatus::Draft
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 申请状态 (Application Status)
// ==========================================
// 状态机: pending -> assigned -> approved | rejected
// approved / rejected 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,  // 待指派
    Assigned, // 已指派专家
    Approved, // 已批准 (终态)
    Rejected, // 已驳回 (终态)
}

impl ApplicationStatus {
    pub const ALLOWED: &'static str = "pending, assigned, approved, rejected";

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "pending" => Some(ApplicationStatus::Pending),
            "assigned" => Some(ApplicationStatus::Assigned),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Assigned => "assigned",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::Pending
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 申请类型 (Application Type)
// ==========================================
// QP: Qualification Placement -> validator
// IL: Institutional Listing   -> evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationType {
    #[serde(rename = "QP")]
    QualificationPlacement,
    #[serde(rename = "IL")]
    InstitutionalListing,
}

impl ApplicationType {
    pub const ALLOWED: &'static str = "QP (Qualification Placement), IL (Institutional Listing)";

    /// 解析申请类型
    ///
    /// 兼容旧库中的 validation / evaluation 写法
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "QP" | "validation" => Some(ApplicationType::QualificationPlacement),
            "IL" | "evaluation" => Some(ApplicationType::InstitutionalListing),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApplicationType::QualificationPlacement => "QP",
            ApplicationType::InstitutionalListing => "IL",
        }
    }

    /// 批准后生成的聘任类型
    pub fn engagement_type(&self) -> EngagementType {
        match self {
            ApplicationType::QualificationPlacement => EngagementType::Validator,
            ApplicationType::InstitutionalListing => EngagementType::Evaluator,
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 聘任类型 (Engagement Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementType {
    Validator, // 验证专家 (QP)
    Evaluator, // 评估专家 (IL)
}

impl EngagementType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "validator" => Some(EngagementType::Validator),
            "evaluator" => Some(EngagementType::Evaluator),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            EngagementType::Validator => "validator",
            EngagementType::Evaluator => "evaluator",
        }
    }
}

impl fmt::Display for EngagementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 评审动作 (Review Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "approve" => Some(ReviewAction::Approve),
            "reject" => Some(ReviewAction::Reject),
            _ => None,
        }
    }

    /// 评审动作对应的目标状态
    pub fn target_status(&self) -> ApplicationStatus {
        match self {
            ReviewAction::Approve => ApplicationStatus::Approved,
            ReviewAction::Reject => ApplicationStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => write!(f, "approve"),
            ReviewAction::Reject => write!(f, "reject"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_and_weight() {
        for role in [Role::SuperUser, Role::Admin, Role::User] {
            assert_eq!(Role::parse(role.to_db_str()), Some(role));
        }
        assert!(Role::SuperUser.weight() > Role::Admin.weight());
        assert!(Role::Admin.weight() > Role::User.weight());
        assert_eq!(Role::parse("scheduler"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_application_type_legacy_alias() {
        assert_eq!(
            ApplicationType::parse("validation"),
            Some(ApplicationType::QualificationPlacement)
        );
        assert_eq!(
            ApplicationType::parse("evaluation"),
            Some(ApplicationType::InstitutionalListing)
        );
        assert_eq!(ApplicationType::parse("XX"), None);
        // 写回数据库时统一使用新写法
        assert_eq!(ApplicationType::QualificationPlacement.to_db_str(), "QP");
    }

    #[test]
    fn test_engagement_type_mapping() {
        assert_eq!(
            ApplicationType::QualificationPlacement.engagement_type(),
            EngagementType::Validator
        );
        assert_eq!(
            ApplicationType::InstitutionalListing.engagement_type(),
            EngagementType::Evaluator
        );
    }

    #[test]
    fn test_application_status_terminal() {
        assert!(ApplicationStatus::Approved.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(!ApplicationStatus::Pending.is_terminal());
        assert!(!ApplicationStatus::Assigned.is_terminal());
        assert_eq!(ApplicationStatus::default(), ApplicationStatus::Pending);
        assert_eq!(PhaseStatus::default(), PhaseStatus::Draft);
    }

    #[test]
    fn test_access_capability_candidates() {
        assert_eq!(AccessCapability::Either.candidates().len(), 2);
        assert_eq!(
            AccessCapability::from(Capability::Manager).candidates(),
            &[Capability::Manager]
        );
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&ApplicationType::InstitutionalListing).unwrap();
        assert_eq!(json, "\"IL\"");
        let json = serde_json::to_string(&PhaseStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
