// ==========================================
// 专家评审阶段管理系统 - 操作日志领域模型
// ==========================================
// 用途: 审计追踪, 记录每一次成功的写操作
// 对齐: action_log 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String, // uuid v4
    pub action_type: ActionType,
    pub action_ts: DateTime<Utc>,
    pub actor_id: i64, // 操作人 user_id

    // ===== 作用对象 =====
    pub phase_id: Option<i64>,
    pub application_id: Option<i64>,
    pub target_user_id: Option<i64>,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 新建一条日志, 生成 action_id 与时间戳
    pub fn new(action_type: ActionType, actor_id: i64) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            action_ts: Utc::now(),
            actor_id,
            phase_id: None,
            application_id: None,
            target_user_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_phase(mut self, phase_id: i64) -> Self {
        self.phase_id = Some(phase_id);
        self
    }

    pub fn with_application(mut self, application_id: i64) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn with_target_user(mut self, user_id: i64) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreatePhase,
    UpdatePhase,
    CreateApplication,
    AssignExperts,
    ReviewApplication,
    RateExpert,
    AssignPlanner,
    AssignManager,
    RemovePlanner,
    RemoveManager,
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::CreatePhase => "CREATE_PHASE",
            ActionType::UpdatePhase => "UPDATE_PHASE",
            ActionType::CreateApplication => "CREATE_APPLICATION",
            ActionType::AssignExperts => "ASSIGN_EXPERTS",
            ActionType::ReviewApplication => "REVIEW_APPLICATION",
            ActionType::RateExpert => "RATE_EXPERT",
            ActionType::AssignPlanner => "ASSIGN_PLANNER",
            ActionType::AssignManager => "ASSIGN_MANAGER",
            ActionType::RemovePlanner => "REMOVE_PLANNER",
            ActionType::RemoveManager => "REMOVE_MANAGER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "CREATE_PHASE" => Some(ActionType::CreatePhase),
            "UPDATE_PHASE" => Some(ActionType::UpdatePhase),
            "CREATE_APPLICATION" => Some(ActionType::CreateApplication),
            "ASSIGN_EXPERTS" => Some(ActionType::AssignExperts),
            "REVIEW_APPLICATION" => Some(ActionType::ReviewApplication),
            "RATE_EXPERT" => Some(ActionType::RateExpert),
            "ASSIGN_PLANNER" => Some(ActionType::AssignPlanner),
            "ASSIGN_MANAGER" => Some(ActionType::AssignManager),
            "REMOVE_PLANNER" => Some(ActionType::RemovePlanner),
            "REMOVE_MANAGER" => Some(ActionType::RemoveManager),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
