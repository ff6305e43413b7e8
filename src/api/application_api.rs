// ==========================================
// 专家评审阶段管理系统 - 申请评审 API
// ==========================================
// 职责: 专家指派、评审(批准/驳回)、专家评分、管理人待办、申请查询
// 权限: 指派需 planner 能力, 评审/评分需 manager 能力 (两级授权)
// 顺序: 先确认申请存在 (NotFound), 再授权 (Forbidden), 再校验 (Validation)
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::api::access::{record_action, reject, require_capability};
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::engagement::{Engagement, ExpertRating};
use crate::domain::identity::Identity;
use crate::domain::phase::{ApplicationFilter, ApplicationPage, ExpertSlots, ManagerTask, PhaseApplication};
use crate::domain::requests::{AssignExpertsRequest, RatingRequest, ReviewRequest};
use crate::domain::types::AccessCapability;
use crate::engine::access_guard::AccessGuard;
use crate::engine::workflow_rules::{Violations, WorkflowRules};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::application_repo::ApplicationRepository;
use crate::repository::directory_repo::ExpertDirectory;
use crate::repository::engagement_repo::EngagementRepository;
use crate::repository::error::RepositoryError;
use crate::repository::rating_repo::RatingRepository;

// ==========================================
// ApplicationApi - 申请评审 API
// ==========================================
pub struct ApplicationApi {
    application_repo: Arc<ApplicationRepository>,
    engagement_repo: Arc<EngagementRepository>,
    rating_repo: Arc<RatingRepository>,
    experts: Arc<dyn ExpertDirectory>,
    guard: Arc<AccessGuard>,
    config: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ApplicationApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        application_repo: Arc<ApplicationRepository>,
        engagement_repo: Arc<EngagementRepository>,
        rating_repo: Arc<RatingRepository>,
        experts: Arc<dyn ExpertDirectory>,
        guard: Arc<AccessGuard>,
        config: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            application_repo,
            engagement_repo,
            rating_repo,
            experts,
            guard,
            config,
            action_log_repo,
        }
    }

    // ==========================================
    // 读操作
    // ==========================================

    pub fn get_application(&self, application_id: i64) -> ApiResult<PhaseApplication> {
        self.require_application(application_id)
    }

    /// 申请列表, 过滤在 SQL 中完成
    pub fn list_applications(&self, filter: ApplicationFilter) -> ApiResult<ApplicationPage> {
        let (limit, offset) = self.config.resolve_page(filter.limit, filter.offset)?;
        let (items, total) = self.application_repo.list(&filter, limit, offset)?;
        Ok(ApplicationPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// 批准后生成的聘任记录
    pub fn list_engagements(&self, application_id: i64) -> ApiResult<Vec<Engagement>> {
        self.require_application(application_id)?;
        Ok(self.engagement_repo.list_by_application(application_id)?)
    }

    pub fn list_ratings(&self, application_id: i64) -> ApiResult<Vec<ExpertRating>> {
        self.require_application(application_id)?;
        Ok(self.rating_repo.list_by_application(application_id)?)
    }

    /// 调用者持有 manager 委派的全部申请
    pub fn manager_tasks(&self, identity: &Identity) -> ApiResult<Vec<ManagerTask>> {
        Ok(self.application_repo.list_manager_tasks(identity.user_id)?)
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 指派专家
    ///
    /// # 规则
    /// - 至少一个槽位非 0, 非 0 槽位必须是已登记的专家
    /// - 无论原状态如何, 成功后状态均为 assigned
    ///
    /// # 返回
    /// - Ok(PhaseApplication): 指派后的申请
    /// - Err(ApiError::NotFound / Forbidden / Validation)
    pub fn assign_experts(
        &self,
        identity: &Identity,
        application_id: i64,
        request: AssignExpertsRequest,
    ) -> ApiResult<PhaseApplication> {
        self.require_application(application_id)?;
        require_capability(&self.guard, identity, AccessCapability::Planner, application_id)?;

        let slots = ExpertSlots::new(request.expert1, request.expert2);
        let mut violations = Violations::new();
        WorkflowRules::check_expert_slots(
            slots,
            true,
            "",
            |id| self.experts.expert_exists(id),
            &mut violations,
        )?;
        violations
            .finish(())
            .map_err(|v| reject("assign experts", v))?;

        let (previous, application) = self.application_repo.assign_experts(application_id, slots)?;
        if previous.is_terminal() {
            tracing::warn!(
                application_id,
                previous_status = %previous,
                actor_id = identity.user_id,
                "终态申请被重新指派专家, 状态回到 assigned"
            );
        }

        tracing::info!(
            application_id,
            expert1 = slots.expert1,
            expert2 = slots.expert2,
            actor_id = identity.user_id,
            "专家已指派"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::AssignExperts, identity.user_id)
                .with_phase(application.phase_id)
                .with_application(application_id)
                .with_payload(json!({
                    "expert1": slots.expert1,
                    "expert2": slots.expert2,
                    "previous_status": previous,
                })),
        );
        Ok(application)
    }

    /// 评审申请
    ///
    /// 批准时同一事务内为每个非空专家槽位生成一条聘任记录;
    /// 并发评审同一申请时只有一个成功, 其余返回校验错误
    pub fn review_application(
        &self,
        identity: &Identity,
        application_id: i64,
        request: ReviewRequest,
    ) -> ApiResult<PhaseApplication> {
        let current = self.require_application(application_id)?;
        require_capability(&self.guard, identity, AccessCapability::Manager, application_id)?;

        let action = WorkflowRules::check_review(&current, &request)
            .map_err(|v| reject("review application", v))?;

        let outcome = self
            .application_repo
            .record_review(application_id, action, request.rejection_notes.as_deref())
            .map_err(|e| match e {
                // 快照校验之后被其他请求抢先评审
                RepositoryError::InvalidStateTransition { .. } => reject(
                    "review application",
                    vec!["application must be in 'assigned' status to be reviewed".to_string()],
                ),
                other => ApiError::from(other),
            })?;

        tracing::info!(
            application_id,
            action = %action,
            status = %outcome.application.status,
            engagements = outcome.engagement_ids.len(),
            actor_id = identity.user_id,
            "申请已评审"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::ReviewApplication, identity.user_id)
                .with_phase(outcome.application.phase_id)
                .with_application(application_id)
                .with_payload(json!({
                    "action": action,
                    "rejection_notes": outcome.application.rejection_notes,
                    "engagement_ids": outcome.engagement_ids,
                })),
        );
        Ok(outcome.application)
    }

    /// 专家评分 (同一申请同一专家重复评分覆盖旧值)
    pub fn rate_expert(
        &self,
        identity: &Identity,
        application_id: i64,
        request: RatingRequest,
    ) -> ApiResult<ExpertRating> {
        let current = self.require_application(application_id)?;
        require_capability(&self.guard, identity, AccessCapability::Manager, application_id)?;

        let rating = WorkflowRules::check_rating(&current, &request)
            .map_err(|v| reject("rate expert", v))?;

        let record = ExpertRating {
            application_id,
            expert_id: request.expert_id,
            rating,
            comment: request
                .comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            rated_by: identity.user_id,
            rated_at: Utc::now(),
        };
        self.rating_repo.upsert(&record)?;

        tracing::info!(
            application_id,
            expert_id = record.expert_id,
            rating = record.rating,
            actor_id = identity.user_id,
            "专家评分已保存"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::RateExpert, identity.user_id)
                .with_phase(current.phase_id)
                .with_application(application_id)
                .with_payload(json!({
                    "expert_id": record.expert_id,
                    "rating": record.rating,
                    "comment": record.comment,
                })),
        );
        Ok(record)
    }

    fn require_application(&self, application_id: i64) -> ApiResult<PhaseApplication> {
        self.application_repo
            .find_by_id(application_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Application with ID {} not found", application_id))
            })
    }
}
