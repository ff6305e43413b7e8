// ==========================================
// 专家评审阶段管理系统 - 工作流校验规则
// ==========================================
// 职责: 阶段/申请/指派/评审/评分的输入校验
// 规则: 违规信息全部收集后一并返回, 不在第一个错误处中断
// 红线: Engine 不拼 SQL, 外部查询通过闭包注入
// ==========================================

use crate::domain::identity::UserRecord;
use crate::domain::phase::{ExpertSlots, NewApplication, PhaseApplication};
use crate::domain::requests::{ApplicationInput, RatingRequest, ReviewRequest};
use crate::domain::types::{ApplicationStatus, ApplicationType, PhaseStatus, ReviewAction, Role};
use crate::repository::error::RepositoryResult;

/// 校验违规收集器
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Violations {
    messages: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// 无违规时返回 value, 否则返回全部违规信息
    pub fn finish<T>(self, value: T) -> Result<T, Vec<String>> {
        if self.messages.is_empty() {
            Ok(value)
        } else {
            Err(self.messages)
        }
    }
}

/// 规划人校验结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerCheck {
    /// 需要为规划人补齐阶段内申请的 planner 委派 (基础角色为 user 时)
    pub grant_delegation: bool,
}

// ==========================================
// WorkflowRules - 校验规则
// ==========================================
pub struct WorkflowRules;

impl WorkflowRules {
    /// 标题非空, 返回去除首尾空白后的标题
    pub fn check_title(title: &str, violations: &mut Violations) -> String {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            violations.push("title is required");
        }
        trimmed.to_string()
    }

    /// 解析阶段状态, 缺省为 draft
    pub fn check_phase_status(raw: Option<&str>, violations: &mut Violations) -> PhaseStatus {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => PhaseStatus::default(),
            Some(s) => PhaseStatus::parse(s).unwrap_or_else(|| {
                violations.push(format!("status must be one of: {}", PhaseStatus::ALLOWED));
                PhaseStatus::default()
            }),
        }
    }

    /// 规划人资格
    ///
    /// # 规则
    /// - admin / super_user 始终可担任
    /// - user 仅在已持有至少一条 planner 委派时可担任
    /// - 未知角色不可担任
    pub fn check_planner<F, G>(
        planner_id: i64,
        lookup_user: F,
        is_elevated: G,
        violations: &mut Violations,
    ) -> RepositoryResult<PlannerCheck>
    where
        F: FnOnce(i64) -> RepositoryResult<Option<UserRecord>>,
        G: FnOnce(i64) -> RepositoryResult<bool>,
    {
        let mut check = PlannerCheck {
            grant_delegation: false,
        };
        if planner_id <= 0 {
            violations.push("assigned planner ID is required");
            return Ok(check);
        }

        match lookup_user(planner_id)? {
            None => violations.push(format!("user with ID {} does not exist", planner_id)),
            Some(UserRecord { role: None, .. }) => violations.push(format!(
                "user with ID {} has invalid role for elevation assignment",
                planner_id
            )),
            Some(UserRecord {
                role: Some(Role::Admin | Role::SuperUser),
                ..
            }) => {}
            Some(UserRecord {
                role: Some(Role::User),
                ..
            }) => {
                if is_elevated(planner_id)? {
                    check.grant_delegation = true;
                } else {
                    violations.push(format!(
                        "user with ID {} is not eligible to be assigned as planner",
                        planner_id
                    ));
                }
            }
        }
        Ok(check)
    }

    /// 专家槽位
    ///
    /// `require_one`: 至少一个槽位非 0
    pub fn check_expert_slots<F>(
        slots: ExpertSlots,
        require_one: bool,
        prefix: &str,
        mut expert_exists: F,
        violations: &mut Violations,
    ) -> RepositoryResult<()>
    where
        F: FnMut(i64) -> RepositoryResult<bool>,
    {
        if require_one && slots.is_empty() {
            violations.push(format!("{}at least one expert must be provided", prefix));
        }
        for (slot, expert_id) in [(1u8, slots.expert1), (2u8, slots.expert2)] {
            if expert_id > 0 && !expert_exists(expert_id)? {
                violations.push(format!(
                    "{}expert {} with ID {} does not exist",
                    prefix, slot, expert_id
                ));
            }
        }
        Ok(())
    }

    /// 单个申请输入
    ///
    /// `index`: 作为阶段创建的一部分时的序号 (从 1 开始), 用于错误前缀
    pub fn check_application<F>(
        index: Option<usize>,
        input: &ApplicationInput,
        expert_exists: F,
        violations: &mut Violations,
    ) -> RepositoryResult<NewApplication>
    where
        F: FnMut(i64) -> RepositoryResult<bool>,
    {
        let prefix = match index {
            Some(i) => format!("application {}: ", i),
            None => String::new(),
        };

        let raw_type = input.app_type.trim();
        let app_type = if raw_type.is_empty() {
            violations.push(format!("{}type is required", prefix));
            None
        } else {
            let parsed = ApplicationType::parse(raw_type);
            if parsed.is_none() {
                violations.push(format!("{}type must be one of: {}", prefix, ApplicationType::ALLOWED));
            }
            parsed
        };

        let institution_name = input.institution_name.trim().to_string();
        if institution_name.is_empty() {
            violations.push(format!("{}institution name is required", prefix));
        }
        let qualification_name = input.qualification_name.trim().to_string();
        if qualification_name.is_empty() {
            violations.push(format!("{}qualification name is required", prefix));
        }

        let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => ApplicationStatus::default(),
            Some(raw) => match ApplicationStatus::parse(raw) {
                None => {
                    violations.push(format!(
                        "{}status must be one of: {}",
                        prefix,
                        ApplicationStatus::ALLOWED
                    ));
                    ApplicationStatus::default()
                }
                // 终态只能经由评审到达
                Some(s) if s.is_terminal() => {
                    violations.push(format!(
                        "{}status '{}' can only be reached through review",
                        prefix, s
                    ));
                    ApplicationStatus::default()
                }
                Some(s) => s,
            },
        };

        let experts = ExpertSlots::new(input.expert1, input.expert2);
        Self::check_expert_slots(
            experts,
            status == ApplicationStatus::Assigned,
            &prefix,
            expert_exists,
            violations,
        )?;

        Ok(NewApplication {
            app_type: app_type.unwrap_or(ApplicationType::QualificationPlacement),
            institution_name,
            qualification_name,
            experts,
            status,
        })
    }

    /// 评审前置条件
    ///
    /// # 规则
    /// - action 只能是 approve / reject
    /// - 申请必须处于 assigned
    /// - reject 必须填写驳回说明
    /// - approve 至少已指派一个专家
    pub fn check_review(
        application: &PhaseApplication,
        request: &ReviewRequest,
    ) -> Result<ReviewAction, Vec<String>> {
        let mut violations = Violations::new();

        let action = ReviewAction::parse(&request.action);
        if action.is_none() {
            violations.push("action must be either 'approve' or 'reject'");
        }
        if application.status != ApplicationStatus::Assigned {
            violations.push("application must be in 'assigned' status to be reviewed");
        }
        match action {
            Some(ReviewAction::Reject) => {
                let notes = request.rejection_notes.as_deref().map(str::trim).unwrap_or("");
                if notes.is_empty() {
                    violations.push("rejection notes are required when rejecting an application");
                }
            }
            Some(ReviewAction::Approve) => {
                if application.experts.is_empty() {
                    violations.push("at least one expert must be assigned before approving");
                }
            }
            None => {}
        }

        match action {
            Some(action) => violations.finish(action),
            None => Err(violations.messages().to_vec()),
        }
    }

    /// 评分输入, 返回 1..=5 的评分值
    pub fn check_rating(
        application: &PhaseApplication,
        request: &RatingRequest,
    ) -> Result<u8, Vec<String>> {
        let mut violations = Violations::new();
        if request.expert_id <= 0 {
            violations.push("expert ID is required");
        }
        if !(1..=5).contains(&request.rating) {
            violations.push("rating must be between 1 and 5");
        }
        if !application.experts.contains(request.expert_id) {
            violations.push("expert is not assigned to this application");
        }
        if application.status != ApplicationStatus::Approved {
            violations.push("only approved applications can be rated");
        }
        let rating = u8::try_from(request.rating.clamp(1, 5)).unwrap_or(1);
        violations.finish(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn application(status: ApplicationStatus, experts: ExpertSlots) -> PhaseApplication {
        PhaseApplication {
            id: 1,
            phase_id: 1,
            app_type: ApplicationType::InstitutionalListing,
            institution_name: "Inst".to_string(),
            qualification_name: "Qual".to_string(),
            experts,
            expert1_name: None,
            expert2_name: None,
            status,
            rejection_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(role: Option<Role>) -> impl Fn(i64) -> RepositoryResult<Option<UserRecord>> {
        move |id| {
            Ok(Some(UserRecord {
                id,
                name: "u".to_string(),
                role,
            }))
        }
    }

    fn known_experts(id: i64) -> RepositoryResult<bool> {
        Ok(id == 10 || id == 12)
    }

    #[test]
    fn test_phase_status_default_and_invalid() {
        let mut v = Violations::new();
        assert_eq!(WorkflowRules::check_phase_status(None, &mut v), PhaseStatus::Draft);
        assert_eq!(WorkflowRules::check_phase_status(Some("  "), &mut v), PhaseStatus::Draft);
        assert!(v.is_empty());
        WorkflowRules::check_phase_status(Some("archived"), &mut v);
        assert_eq!(
            v.messages(),
            &["status must be one of: draft, in_progress, completed, cancelled".to_string()]
        );
    }

    #[test]
    fn test_planner_eligibility() {
        let mut v = Violations::new();
        let check = WorkflowRules::check_planner(1, user(Some(Role::Admin)), |_| Ok(false), &mut v).unwrap();
        assert!(v.is_empty());
        assert!(!check.grant_delegation);

        let check = WorkflowRules::check_planner(7, user(Some(Role::User)), |_| Ok(true), &mut v).unwrap();
        assert!(v.is_empty());
        assert!(check.grant_delegation);

        WorkflowRules::check_planner(7, user(Some(Role::User)), |_| Ok(false), &mut v).unwrap();
        WorkflowRules::check_planner(8, user(None), |_| Ok(true), &mut v).unwrap();
        WorkflowRules::check_planner(9, |_| Ok(None), |_| Ok(true), &mut v).unwrap();
        WorkflowRules::check_planner(0, |_| Ok(None), |_| Ok(true), &mut v).unwrap();
        assert_eq!(
            v.messages(),
            &[
                "user with ID 7 is not eligible to be assigned as planner".to_string(),
                "user with ID 8 has invalid role for elevation assignment".to_string(),
                "user with ID 9 does not exist".to_string(),
                "assigned planner ID is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_application_collects_all_violations() {
        let input = ApplicationInput {
            app_type: "XX".to_string(),
            institution_name: " ".to_string(),
            qualification_name: String::new(),
            expert1: 99,
            expert2: 0,
            status: Some("unknown".to_string()),
        };
        let mut v = Violations::new();
        WorkflowRules::check_application(Some(2), &input, known_experts, &mut v).unwrap();
        assert_eq!(
            v.messages(),
            &[
                "application 2: type must be one of: QP (Qualification Placement), IL (Institutional Listing)".to_string(),
                "application 2: institution name is required".to_string(),
                "application 2: qualification name is required".to_string(),
                "application 2: status must be one of: pending, assigned, approved, rejected".to_string(),
                "application 2: expert 1 with ID 99 does not exist".to_string(),
            ]
        );
    }

    #[test]
    fn test_application_rejects_terminal_initial_status() {
        let input = ApplicationInput {
            app_type: "QP".to_string(),
            institution_name: "I".to_string(),
            qualification_name: "Q".to_string(),
            expert1: 10,
            status: Some("approved".to_string()),
            ..Default::default()
        };
        let mut v = Violations::new();
        WorkflowRules::check_application(None, &input, known_experts, &mut v).unwrap();
        assert_eq!(v.messages(), &["status 'approved' can only be reached through review".to_string()]);
    }

    #[test]
    fn test_expert_slots() {
        let mut v = Violations::new();
        WorkflowRules::check_expert_slots(ExpertSlots::new(0, 0), true, "", known_experts, &mut v).unwrap();
        WorkflowRules::check_expert_slots(ExpertSlots::new(10, 10), true, "", known_experts, &mut v).unwrap();
        WorkflowRules::check_expert_slots(ExpertSlots::new(0, 13), true, "", known_experts, &mut v).unwrap();
        // 负数ID等同未指派
        WorkflowRules::check_expert_slots(ExpertSlots::new(-1, -5), true, "", known_experts, &mut v).unwrap();
        WorkflowRules::check_expert_slots(ExpertSlots::new(-1, 10), true, "", known_experts, &mut v).unwrap();
        assert_eq!(
            v.messages(),
            &[
                "at least one expert must be provided".to_string(),
                "expert 2 with ID 13 does not exist".to_string(),
                "at least one expert must be provided".to_string(),
            ]
        );
    }

    #[test]
    fn test_review_rules() {
        let assigned = application(ApplicationStatus::Assigned, ExpertSlots::new(10, 0));
        let approve = ReviewRequest {
            action: "approve".to_string(),
            rejection_notes: None,
        };
        assert_eq!(WorkflowRules::check_review(&assigned, &approve), Ok(ReviewAction::Approve));

        let reject = ReviewRequest {
            action: "reject".to_string(),
            rejection_notes: Some("   ".to_string()),
        };
        let errors = WorkflowRules::check_review(&assigned, &reject).unwrap_err();
        assert_eq!(errors, vec!["rejection notes are required when rejecting an application"]);

        let pending = application(ApplicationStatus::Pending, ExpertSlots::default());
        let errors = WorkflowRules::check_review(&pending, &approve).unwrap_err();
        assert_eq!(errors.len(), 2);

        let bogus = ReviewRequest {
            action: "escalate".to_string(),
            rejection_notes: None,
        };
        let errors = WorkflowRules::check_review(&assigned, &bogus).unwrap_err();
        assert_eq!(errors, vec!["action must be either 'approve' or 'reject'"]);
    }

    #[test]
    fn test_rating_rules() {
        let approved = application(ApplicationStatus::Approved, ExpertSlots::new(10, 12));
        let ok = RatingRequest {
            expert_id: 12,
            rating: 4,
            comment: None,
        };
        assert_eq!(WorkflowRules::check_rating(&approved, &ok), Ok(4));

        let bad = RatingRequest {
            expert_id: 11,
            rating: 6,
            comment: None,
        };
        let errors = WorkflowRules::check_rating(&approved, &bad).unwrap_err();
        assert_eq!(
            errors,
            vec!["rating must be between 1 and 5", "expert is not assigned to this application"]
        );
    }
}
