// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证多连接并发写入时的事务保证
// 1. 并发创建阶段: 业务编号不重复
// 2. 并发批准同一申请: 只有一次成功, 聘任不重复
// 3. 并发批量指派同一用户: 最终结果为某一次调用的完整替换
// ==========================================

mod helpers;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use expert_review::api::ErrorKind;
use expert_review::domain::{ApplicationStatus, CreatePhaseRequest};
use helpers::api_test_helper::*;

const THREADS: usize = 8;

#[test]
fn test_concurrent_phase_creation_yields_unique_codes() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            // 每个线程独立连接
            let state = env.open_state();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut codes = Vec::new();
                for round in 0..3 {
                    let phase = state
                        .phase_api
                        .create_phase(
                            &admin(),
                            CreatePhaseRequest {
                                title: format!("thread {} round {}", i, round),
                                assigned_planner_id: ADMIN_ID,
                                status: None,
                                applications: vec![application("QP")],
                            },
                        )
                        .expect("并发创建阶段失败");
                    codes.push(phase.phase_code);
                }
                codes
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().expect("线程异常退出"));
    }
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(all.len(), THREADS * 3);
    assert_eq!(unique.len(), all.len(), "业务编号重复: {:?}", all);
    assert_eq!(count_rows(&env.db_path, "phases"), (THREADS * 3) as i64);
    assert_eq!(count_rows(&env.db_path, "phase_applications"), (THREADS * 3) as i64);
}

#[test]
fn test_concurrent_approval_creates_engagements_once() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = env.assigned_application("IL", EXPERT_A, EXPERT_B);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let state = env.open_state();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                state.application_api.review_application(&admin(), id, approve())
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.join().expect("线程异常退出") {
            Ok(app) => {
                assert_eq!(app.status, ApplicationStatus::Approved);
                successes += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::Validation, "意外错误: {}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(count_rows(&env.db_path, "expert_engagements"), 2);
    assert_eq!(env.application_api.list_engagements(id).unwrap().len(), 2);
}

#[test]
fn test_concurrent_batch_assign_is_last_writer_wins() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let phase = env.create_phase(
        "delegation",
        (0..THREADS).map(|_| application("IL")).collect(),
    );
    let ids: Vec<i64> = phase.applications.iter().map(|a| a.id).collect();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = ids
        .iter()
        .map(|&application_id| {
            let state = env.open_state();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                state
                    .assignment_api
                    .batch_assign_manager(&admin(), USER_BOB_ID, &[application_id])
                    .expect("并发批量指派失败");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("线程异常退出");
    }

    // 每次调用都是整体替换, 最终只剩某一次调用写入的一行
    let rows = env.assignment_api.list_user_assignments(&admin(), USER_BOB_ID).unwrap();
    assert_eq!(rows.manager_applications.len(), 1);
    assert!(ids.contains(&rows.manager_applications[0]));
}
