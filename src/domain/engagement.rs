// ==========================================
// 专家评审阶段管理系统 - 聘任/评分领域模型
// ==========================================
// 职责: 申请批准时生成的聘任记录, 管理人对专家的评分
// 说明: 聘任记录归专家登记子系统所有, 本核心只负责写入
// ==========================================

use crate::domain::phase::PhaseApplication;
use crate::domain::types::EngagementType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 新生成聘任的状态
pub const ENGAGEMENT_STATUS_ACTIVE: &str = "active";

// ==========================================
// Engagement - 专家聘任
// ==========================================
// 对齐: expert_engagements 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: i64,
    pub expert_id: i64,
    pub engagement_type: EngagementType,
    pub start_date: DateTime<Utc>,
    pub project_name: String,
    pub status: String,
    pub notes: Option<String>,
    pub source_application_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的聘任
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEngagement {
    pub expert_id: i64,
    pub engagement_type: EngagementType,
    pub start_date: DateTime<Utc>,
    pub project_name: String,
    pub status: String,
    pub notes: String,
    pub source_application_id: i64,
}

impl NewEngagement {
    /// 按申请批准生成某一专家的聘任
    pub fn from_approval(
        application: &PhaseApplication,
        expert_id: i64,
        approved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expert_id,
            engagement_type: application.app_type.engagement_type(),
            start_date: approved_at,
            project_name: application.project_name(),
            status: ENGAGEMENT_STATUS_ACTIVE.to_string(),
            notes: format!(
                "Automatically created from phase application ID {}",
                application.id
            ),
            source_application_id: application.id,
        }
    }
}

// ==========================================
// ExpertRating - 专家评分
// ==========================================
// 对齐: application_ratings 表 (application_id, expert_id) 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertRating {
    pub application_id: i64,
    pub expert_id: i64,
    pub rating: u8, // 1..=5
    pub comment: Option<String>,
    pub rated_by: i64,
    pub rated_at: DateTime<Utc>,
}
