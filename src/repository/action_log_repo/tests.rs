use super::queries::LogTarget;
use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = crate::db::open_in_memory().unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::CreatePhase, 1)
        .with_phase(3)
        .with_payload(serde_json::json!({ "phase_code": "PH-2025-001" }))
        .with_detail("创建阶段");
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, ActionType::CreatePhase);
    assert_eq!(found.phase_id, Some(3));
    assert_eq!(found.payload_json.unwrap()["phase_code"], "PH-2025-001");
    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_list_by_target_and_recent() {
    let repo = ActionLogRepository::new(setup_test_db());

    let mut older = ActionLog::new(ActionType::AssignExperts, 2).with_application(9);
    older.action_ts = Utc::now() - Duration::minutes(5);
    repo.insert(&older).unwrap();
    repo.insert(&ActionLog::new(ActionType::ReviewApplication, 2).with_application(9))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::AssignManager, 1).with_target_user(5))
        .unwrap();

    let by_app = repo.list_by_target(LogTarget::Application(9)).unwrap();
    assert_eq!(by_app.len(), 2);
    assert_eq!(by_app[0].action_type, ActionType::ReviewApplication);
    assert_eq!(repo.list_by_target(LogTarget::User(5)).unwrap().len(), 1);
    assert!(repo.list_by_target(LogTarget::Phase(9)).unwrap().is_empty());

    let recent = repo.list_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|l| l.action_ts > older.action_ts));
}
