// ==========================================
// 专家评审阶段管理系统 - 阶段/申请领域模型
// ==========================================
// 职责: Phase / PhaseApplication 实体, 以及创建/更新/查询所用的类型化参数
// 约束: 专家槽位 0 表示未指派 (数据库存 NULL)
// ==========================================

use crate::domain::types::{ApplicationStatus, ApplicationType, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ExpertSlots - 两个评审专家槽位
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertSlots {
    pub expert1: i64,
    pub expert2: i64,
}

impl ExpertSlots {
    /// 负数ID视为未指派
    pub fn new(expert1: i64, expert2: i64) -> Self {
        Self {
            expert1: expert1.max(0),
            expert2: expert2.max(0),
        }
    }

    /// 两个槽位都未指派
    pub fn is_empty(&self) -> bool {
        self.expert1 <= 0 && self.expert2 <= 0
    }

    /// 已指派的不同专家 (槽位号, 专家ID), 槽位号从 1 开始
    ///
    /// 两个槽位是同一专家时只保留槽位 1
    pub fn assigned(&self) -> Vec<(u8, i64)> {
        let mut out: Vec<(u8, i64)> = Vec::with_capacity(2);
        for (slot, id) in [(1u8, self.expert1), (2u8, self.expert2)] {
            if id > 0 && !out.iter().any(|(_, seen)| *seen == id) {
                out.push((slot, id));
            }
        }
        out
    }

    /// 专家是否占用任一槽位
    pub fn contains(&self, expert_id: i64) -> bool {
        expert_id > 0 && (self.expert1 == expert_id || self.expert2 == expert_id)
    }

    /// 转换为数据库可空值
    pub fn slot_for_db(id: i64) -> Option<i64> {
        if id > 0 {
            Some(id)
        } else {
            None
        }
    }
}

// ==========================================
// Phase - 评审阶段
// ==========================================
// 对齐: phases 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub phase_code: String, // 业务编号 PH-<年>-<序号>
    pub title: String,
    pub assigned_planner_id: i64,
    pub planner_name: Option<String>,
    pub status: PhaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applications: Vec<PhaseApplication>,
}

// ==========================================
// PhaseApplication - 阶段内的资格申请
// ==========================================
// 对齐: phase_applications 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseApplication {
    pub id: i64,
    pub phase_id: i64, // 创建后不可变
    pub app_type: ApplicationType,
    pub institution_name: String,
    pub qualification_name: String,
    #[serde(flatten)]
    pub experts: ExpertSlots,
    pub expert1_name: Option<String>,
    pub expert2_name: Option<String>,
    pub status: ApplicationStatus,
    pub rejection_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhaseApplication {
    /// 聘任记录使用的项目名称: "<机构> - <资格>"
    pub fn project_name(&self) -> String {
        format!("{} - {}", self.institution_name, self.qualification_name)
    }
}

// ==========================================
// 写入参数
// ==========================================

/// 新建申请 (已通过校验)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub app_type: ApplicationType,
    pub institution_name: String,
    pub qualification_name: String,
    pub experts: ExpertSlots,
    pub status: ApplicationStatus,
}

/// 新建阶段 (已通过校验), 业务编号由仓储在事务内生成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhase {
    pub title: String,
    pub assigned_planner_id: i64,
    pub status: PhaseStatus,
    pub applications: Vec<NewApplication>,
}

/// 阶段全字段更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub title: String,
    pub assigned_planner_id: i64,
    pub status: PhaseStatus,
}

// ==========================================
// 查询参数
// ==========================================

/// 阶段列表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFilter {
    pub status: Option<PhaseStatus>,
    pub planner_id: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 申请列表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    pub phase_id: Option<i64>,
    pub status: Option<ApplicationStatus>,
    pub app_type: Option<ApplicationType>,
    pub expert_id: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 申请分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationPage {
    pub items: Vec<PhaseApplication>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

/// 管理人待办
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerTask {
    pub application: PhaseApplication,
    pub phase_title: String,
    pub rating_requested: bool, // 已批准且尚未评分
}
