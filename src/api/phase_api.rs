// ==========================================
// 专家评审阶段管理系统 - 阶段管理 API
// ==========================================
// 职责: 阶段创建/更新/查询, 向已有阶段追加申请
// 权限: 写操作要求基础角色 admin 及以上; 读操作对任意已认证身份开放
// ==========================================

use std::sync::Arc;

use serde_json::json;

use crate::api::access::{record_action, reject, require_role};
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::identity::Identity;
use crate::domain::phase::{NewPhase, Phase, PhaseApplication, PhaseFilter, PhaseUpdate};
use crate::domain::requests::{ApplicationInput, CreatePhaseRequest, UpdatePhaseRequest};
use crate::domain::types::{Capability, Role};
use crate::engine::workflow_rules::{Violations, WorkflowRules};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::application_repo::ApplicationRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::directory_repo::{ExpertDirectory, UserDirectory};
use crate::repository::phase_repo::PhaseRepository;

// ==========================================
// PhaseApi - 阶段管理 API
// ==========================================

/// 阶段管理API
///
/// 职责：
/// 1. 阶段创建（编号生成 + 全部申请同一事务写入）
/// 2. 阶段全字段更新（规划人变更时校验资格）
/// 3. 规划人委派补齐（规划人为 user 时授予阶段内全部申请的 planner 委派）
/// 4. ActionLog记录
pub struct PhaseApi {
    phase_repo: Arc<PhaseRepository>,
    application_repo: Arc<ApplicationRepository>,
    assignment_repo: Arc<AssignmentRepository>,
    experts: Arc<dyn ExpertDirectory>,
    users: Arc<dyn UserDirectory>,
    config: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl PhaseApi {
    /// 创建新的PhaseApi实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        phase_repo: Arc<PhaseRepository>,
        application_repo: Arc<ApplicationRepository>,
        assignment_repo: Arc<AssignmentRepository>,
        experts: Arc<dyn ExpertDirectory>,
        users: Arc<dyn UserDirectory>,
        config: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            phase_repo,
            application_repo,
            assignment_repo,
            experts,
            users,
            config,
            action_log_repo,
        }
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 创建阶段
    ///
    /// # 参数
    /// - identity: 调用者 (admin 及以上)
    /// - request: 标题、规划人、可选状态、申请列表
    ///
    /// # 返回
    /// - Ok(Phase): 含生成的业务编号与全部申请
    /// - Err(ApiError::Validation): 全部违规信息, 未写入任何数据
    pub fn create_phase(&self, identity: &Identity, request: CreatePhaseRequest) -> ApiResult<Phase> {
        require_role(identity, Role::Admin, "create phase")?;

        let mut violations = Violations::new();
        let title = WorkflowRules::check_title(&request.title, &mut violations);
        let status = WorkflowRules::check_phase_status(request.status.as_deref(), &mut violations);
        let planner = WorkflowRules::check_planner(
            request.assigned_planner_id,
            |id| self.users.get_user(id),
            |id| self.assignment_repo.has_any(Capability::Planner, id),
            &mut violations,
        )?;

        let mut applications = Vec::with_capacity(request.applications.len());
        for (i, input) in request.applications.iter().enumerate() {
            applications.push(WorkflowRules::check_application(
                Some(i + 1),
                input,
                |id| self.experts.expert_exists(id),
                &mut violations,
            )?);
        }

        let new_phase = violations
            .finish(NewPhase {
                title,
                assigned_planner_id: request.assigned_planner_id,
                status,
                applications,
            })
            .map_err(|v| reject("create phase", v))?;

        let probe_limit = self.config.get_phase_code_probe_limit()?;
        let grant_to = planner
            .grant_delegation
            .then_some(new_phase.assigned_planner_id);
        let phase = self
            .phase_repo
            .create_with_applications(&new_phase, probe_limit, grant_to)?;

        tracing::info!(
            phase_id = phase.id,
            phase_code = %phase.phase_code,
            planner_id = phase.assigned_planner_id,
            applications = phase.applications.len(),
            actor_id = identity.user_id,
            "阶段已创建"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::CreatePhase, identity.user_id)
                .with_phase(phase.id)
                .with_target_user(phase.assigned_planner_id)
                .with_payload(json!({
                    "phase_code": phase.phase_code,
                    "status": phase.status,
                    "application_ids": phase.applications.iter().map(|a| a.id).collect::<Vec<_>>(),
                    "planner_delegated": grant_to.is_some(),
                })),
        );
        Ok(phase)
    }

    /// 更新阶段
    ///
    /// 缺省字段保持原值; 规划人仅在变更时校验资格
    pub fn update_phase(
        &self,
        identity: &Identity,
        phase_id: i64,
        request: UpdatePhaseRequest,
    ) -> ApiResult<Phase> {
        require_role(identity, Role::Admin, "update phase")?;

        let current = self.require_phase(phase_id)?;
        let mut violations = Violations::new();

        let title = match request.title.as_deref() {
            Some(raw) => WorkflowRules::check_title(raw, &mut violations),
            None => current.title.clone(),
        };
        let status = match request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => WorkflowRules::check_phase_status(Some(raw), &mut violations),
            None => current.status,
        };

        let mut grant_to = None;
        let planner_id = match request.assigned_planner_id {
            Some(id) if id != current.assigned_planner_id => {
                let check = WorkflowRules::check_planner(
                    id,
                    |id| self.users.get_user(id),
                    |id| self.assignment_repo.has_any(Capability::Planner, id),
                    &mut violations,
                )?;
                if check.grant_delegation {
                    grant_to = Some(id);
                }
                id
            }
            _ => current.assigned_planner_id,
        };

        let update = violations
            .finish(PhaseUpdate {
                title,
                assigned_planner_id: planner_id,
                status,
            })
            .map_err(|v| reject("update phase", v))?;

        let phase = self.phase_repo.update(phase_id, &update, grant_to)?;

        tracing::info!(
            phase_id,
            status = %phase.status,
            planner_id = phase.assigned_planner_id,
            actor_id = identity.user_id,
            "阶段已更新"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::UpdatePhase, identity.user_id)
                .with_phase(phase_id)
                .with_payload(json!({
                    "before": {
                        "title": current.title,
                        "assigned_planner_id": current.assigned_planner_id,
                        "status": current.status,
                    },
                    "after": {
                        "title": phase.title,
                        "assigned_planner_id": phase.assigned_planner_id,
                        "status": phase.status,
                    },
                    "planner_delegated": grant_to.is_some(),
                })),
        );
        Ok(phase)
    }

    /// 向已有阶段追加申请
    ///
    /// 阶段规划人基础角色为 user 时, 同一事务内授予其新申请的 planner 委派
    pub fn create_application(
        &self,
        identity: &Identity,
        phase_id: i64,
        input: ApplicationInput,
    ) -> ApiResult<PhaseApplication> {
        require_role(identity, Role::Admin, "create application")?;

        let planner_id = self
            .phase_repo
            .planner_of(phase_id)?
            .ok_or_else(|| phase_not_found(phase_id))?;

        let mut violations = Violations::new();
        let new_application = WorkflowRules::check_application(
            None,
            &input,
            |id| self.experts.expert_exists(id),
            &mut violations,
        )?;
        let new_application = violations
            .finish(new_application)
            .map_err(|v| reject("create application", v))?;

        let grant_to = match self.users.get_user(planner_id)? {
            Some(user) if user.role == Some(Role::User) => Some(planner_id),
            _ => None,
        };
        let application = self
            .application_repo
            .create(phase_id, &new_application, grant_to)?;

        tracing::info!(
            phase_id,
            application_id = application.id,
            status = %application.status,
            actor_id = identity.user_id,
            "申请已创建"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::CreateApplication, identity.user_id)
                .with_phase(phase_id)
                .with_application(application.id)
                .with_payload(json!({
                    "type": application.app_type,
                    "institution_name": application.institution_name,
                    "qualification_name": application.qualification_name,
                    "status": application.status,
                    "planner_delegated": grant_to.is_some(),
                })),
        );
        Ok(application)
    }

    // ==========================================
    // 读操作
    // ==========================================

    pub fn get_phase(&self, phase_id: i64) -> ApiResult<Phase> {
        self.require_phase(phase_id)
    }

    /// 按业务编号查询 (如 PH-2025-001)
    pub fn get_phase_by_code(&self, phase_code: &str) -> ApiResult<Phase> {
        if phase_code.trim().is_empty() {
            return Err(ApiError::validation("phase code is required"));
        }
        self.phase_repo
            .find_by_code(phase_code)?
            .ok_or_else(|| ApiError::NotFound(format!("Phase with code {} not found", phase_code.trim())))
    }

    /// 阶段列表 (创建时间倒序), 条数按配置取默认值并截断
    pub fn list_phases(&self, filter: PhaseFilter) -> ApiResult<Vec<Phase>> {
        let (limit, offset) = self.config.resolve_page(filter.limit, filter.offset)?;
        Ok(self.phase_repo.list(&filter, limit, offset)?)
    }

    fn require_phase(&self, phase_id: i64) -> ApiResult<Phase> {
        self.phase_repo
            .find_by_id(phase_id)?
            .ok_or_else(|| phase_not_found(phase_id))
    }
}

fn phase_not_found(phase_id: i64) -> ApiError {
    ApiError::NotFound(format!("Phase with ID {} not found", phase_id))
}
