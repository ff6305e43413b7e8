// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用辅助函数
// ==========================================

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::NamedTempFile;

use expert_review::api::{ApiError, ApplicationApi, AssignmentApi, ErrorKind, PhaseApi};
use expert_review::app::AppState;
use expert_review::config::ConfigManager;
use expert_review::domain::{
    ApplicationInput, AssignExpertsRequest, CreatePhaseRequest, Identity, Phase, ReviewRequest,
    Role,
};
use expert_review::repository::ActionLogRepository;

pub use crate::test_helpers::*;

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 包含所有API实例和必要的依赖
pub struct ApiTestEnv {
    pub db_path: String,
    pub phase_api: Arc<PhaseApi>,
    pub application_api: Arc<ApplicationApi>,
    pub assignment_api: Arc<AssignmentApi>,
    pub config_manager: Arc<ConfigManager>,
    pub action_log_repo: Arc<ActionLogRepository>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的测试环境
    pub fn new() -> Result<Self, String> {
        expert_review::logging::init_test();

        let (temp_file, db_path) = create_test_db().map_err(|e| format!("无法创建测试数据库: {}", e))?;
        let state = AppState::new(db_path.clone()).map_err(|e| format!("无法创建AppState: {}", e))?;

        Ok(Self {
            db_path,
            phase_api: state.phase_api.clone(),
            application_api: state.application_api.clone(),
            assignment_api: state.assignment_api.clone(),
            config_manager: state.config_manager.clone(),
            action_log_repo: state.action_log_repo.clone(),
            _temp_file: temp_file,
        })
    }

    /// 同一数据库文件上的独立 AppState (独立连接, 用于并发测试)
    pub fn open_state(&self) -> AppState {
        AppState::new(self.db_path.clone()).expect("无法打开AppState")
    }

    /// 由 admin 创建一个阶段, 规划人为 admin
    pub fn create_phase(&self, title: &str, applications: Vec<ApplicationInput>) -> Phase {
        self.phase_api
            .create_phase(
                &admin(),
                CreatePhaseRequest {
                    title: title.to_string(),
                    assigned_planner_id: ADMIN_ID,
                    status: None,
                    applications,
                },
            )
            .expect("创建阶段失败")
    }

    /// 创建阶段并把第一个申请推进到 assigned, 返回申请ID
    pub fn assigned_application(&self, app_type: &str, expert1: i64, expert2: i64) -> i64 {
        let phase = self.create_phase("Review cycle", vec![application(app_type)]);
        let application_id = phase.applications[0].id;
        self.application_api
            .assign_experts(&admin(), application_id, AssignExpertsRequest { expert1, expert2 })
            .expect("指派专家失败");
        application_id
    }
}

// ==========================================
// 身份与请求构造
// ==========================================

pub fn super_user() -> Identity {
    Identity::new(SUPER_USER_ID, Role::SuperUser)
}

pub fn admin() -> Identity {
    Identity::new(ADMIN_ID, Role::Admin)
}

pub fn bob() -> Identity {
    Identity::new(USER_BOB_ID, Role::User)
}

pub fn carol() -> Identity {
    Identity::new(USER_CAROL_ID, Role::User)
}

/// 合法的申请输入
pub fn application(app_type: &str) -> ApplicationInput {
    ApplicationInput {
        app_type: app_type.to_string(),
        institution_name: "Northfield Polytechnic".to_string(),
        qualification_name: "Diploma in Applied Robotics".to_string(),
        ..Default::default()
    }
}

pub fn approve() -> ReviewRequest {
    ReviewRequest {
        action: "approve".to_string(),
        rejection_notes: None,
    }
}

pub fn reject_with(notes: &str) -> ReviewRequest {
    ReviewRequest {
        action: "reject".to_string(),
        rejection_notes: Some(notes.to_string()),
    }
}

// ==========================================
// 断言辅助
// ==========================================

pub fn assert_kind<T: std::fmt::Debug>(result: Result<T, ApiError>, kind: ErrorKind) -> ApiError {
    match result {
        Ok(v) => panic!("期望 {:?} 错误, 实际成功: {:?}", kind, v),
        Err(e) => {
            assert_eq!(e.kind(), kind, "错误分类不符: {}", e);
            e
        }
    }
}
