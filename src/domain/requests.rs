// ==========================================
// 专家评审阶段管理系统 - 请求参数
// ==========================================
// 职责: 调用方提交的原始输入 (未校验)
// 说明: 枚举字段保持字符串, 以便一次性汇总全部校验错误
// ==========================================

use serde::{Deserialize, Serialize};

/// 申请输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInput {
    #[serde(rename = "type")]
    pub app_type: String,
    pub institution_name: String,
    pub qualification_name: String,
    #[serde(default)]
    pub expert1: i64,
    #[serde(default)]
    pub expert2: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// 创建阶段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhaseRequest {
    pub title: String,
    pub assigned_planner_id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub applications: Vec<ApplicationInput>,
}

/// 更新阶段 (缺省字段保持原值)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhaseRequest {
    pub title: Option<String>,
    pub assigned_planner_id: Option<i64>,
    pub status: Option<String>,
}

/// 指派专家 (0 表示该槽位不指派)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignExpertsRequest {
    #[serde(default)]
    pub expert1: i64,
    #[serde(default)]
    pub expert2: i64,
}

/// 评审
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub action: String,
    #[serde(default)]
    pub rejection_notes: Option<String>,
}

/// 专家评分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub expert_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_input_wire_names() {
        let input: ApplicationInput = serde_json::from_str(
            r#"{"type":"QP","institutionName":"Inst","qualificationName":"Qual","expert1":10}"#,
        )
        .unwrap();
        assert_eq!(input.app_type, "QP");
        assert_eq!(input.expert1, 10);
        assert_eq!(input.expert2, 0);
        assert_eq!(input.status, None);
    }
}
