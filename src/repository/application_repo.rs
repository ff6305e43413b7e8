// ==========================================
// 专家评审阶段管理系统 - 阶段申请仓储
// ==========================================
// 职责: phase_applications 的读写, 评审事务 (状态更新 + 聘任写入)
// 红线: 评审前置条件在事务内以条件更新再确认, 未命中即回滚
// ==========================================

use crate::domain::engagement::NewEngagement;
use crate::domain::phase::{
    ApplicationFilter, ExpertSlots, ManagerTask, NewApplication, PhaseApplication,
};
use crate::domain::types::{ApplicationStatus, ApplicationType, Capability, ReviewAction};
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::engagement_repo::EngagementRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_enum, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

const SELECT_APPLICATION: &str = r#"
    SELECT a.id, a.phase_id, a.type, a.institution_name, a.qualification_name,
           a.expert_1, a.expert_2, e1.name, e2.name,
           a.status, a.rejection_notes, a.created_at, a.updated_at
    FROM phase_applications a
    LEFT JOIN experts e1 ON e1.id = a.expert_1
    LEFT JOIN experts e2 ON e2.id = a.expert_2
"#;

/// 评审结果
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub application: PhaseApplication,
    pub engagement_ids: Vec<i64>,
}

// ==========================================
// ApplicationRepository - 阶段申请仓储
// ==========================================
pub struct ApplicationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ApplicationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn =
            crate::db::open_sqlite_connection(db_path).map_err(RepositoryError::connection)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内辅助 (供阶段仓储复用)
    // ==========================================

    /// 在调用方事务内插入申请, 返回新ID
    pub fn insert_in(
        conn: &Connection,
        phase_id: i64,
        application: &NewApplication,
        now: &DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let ts = format_ts(now);
        conn.execute(
            r#"
            INSERT INTO phase_applications (
                phase_id, type, institution_name, qualification_name,
                expert_1, expert_2, status, rejection_notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?8)
            "#,
            params![
                phase_id,
                application.app_type.to_db_str(),
                application.institution_name,
                application.qualification_name,
                ExpertSlots::slot_for_db(application.experts.expert1),
                ExpertSlots::slot_for_db(application.experts.expert2),
                application.status.to_db_str(),
                ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_in(conn: &Connection, id: i64) -> RepositoryResult<Option<PhaseApplication>> {
        let sql = format!("{} WHERE a.id = ?1", SELECT_APPLICATION);
        let app = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(app)
    }

    /// 阶段下的全部申请 (按ID升序)
    pub fn list_by_phase_in(conn: &Connection, phase_id: i64) -> RepositoryResult<Vec<PhaseApplication>> {
        let sql = format!("{} WHERE a.phase_id = ?1 ORDER BY a.id", SELECT_APPLICATION);
        let mut stmt = conn.prepare(&sql)?;
        let apps = stmt
            .query_map(params![phase_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    pub fn ids_by_phase_in(conn: &Connection, phase_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT id FROM phase_applications WHERE phase_id = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![phase_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<PhaseApplication>> {
        let conn = self.get_conn()?;
        Self::find_in(&conn, id)
    }

    /// 返回给定ID中不存在的申请ID (保持输入顺序)
    pub fn find_missing(&self, ids: &[i64]) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM phase_applications WHERE id = ?1)")?;
        let mut missing = Vec::new();
        for id in ids {
            let exists: bool = stmt.query_row(params![id], |row| row.get(0))?;
            if !exists {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    /// 条件过滤 + 分页
    ///
    /// # 返回
    /// - (当前页, 满足条件的总数)
    pub fn list(
        &self,
        filter: &ApplicationFilter,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<(Vec<PhaseApplication>, i64)> {
        let conn = self.get_conn()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(phase_id) = filter.phase_id {
            conditions.push("a.phase_id = ?");
            values.push(Value::Integer(phase_id));
        }
        if let Some(status) = filter.status {
            conditions.push("a.status = ?");
            values.push(Value::Text(status.to_db_str().to_string()));
        }
        if let Some(app_type) = filter.app_type {
            conditions.push("a.type = ?");
            values.push(Value::Text(app_type.to_db_str().to_string()));
        }
        if let Some(expert_id) = filter.expert_id {
            conditions.push("(a.expert_1 = ? OR a.expert_2 = ?)");
            values.push(Value::Integer(expert_id));
            values.push(Value::Integer(expert_id));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM phase_applications a{}", where_clause);
        let total: i64 = conn.query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))?;

        let page_sql = format!(
            "{}{} ORDER BY a.id LIMIT ? OFFSET ?",
            SELECT_APPLICATION, where_clause
        );
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));
        let mut stmt = conn.prepare(&page_sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }

    /// 管理人待办: 用户持有 manager 委派的全部申请
    pub fn list_manager_tasks(&self, user_id: i64) -> RepositoryResult<Vec<ManagerTask>> {
        let conn = self.get_conn()?;
        // 前 13 列与 SELECT_APPLICATION 一致, 复用 map_row
        // 末列: 仍有已指派专家未被评分
        let mut stmt = conn.prepare(
            r#"
            SELECT a.id, a.phase_id, a.type, a.institution_name, a.qualification_name,
                   a.expert_1, a.expert_2, e1.name, e2.name,
                   a.status, a.rejection_notes, a.created_at, a.updated_at,
                   p.title,
                   (COALESCE(a.expert_1, 0) > 0 AND NOT EXISTS (
                        SELECT 1 FROM application_ratings r
                        WHERE r.application_id = a.id AND r.expert_id = a.expert_1))
                   OR (COALESCE(a.expert_2, 0) > 0 AND NOT EXISTS (
                        SELECT 1 FROM application_ratings r
                        WHERE r.application_id = a.id AND r.expert_id = a.expert_2))
            FROM application_managers m
            JOIN phase_applications a ON a.id = m.application_id
            JOIN phases p ON p.id = a.phase_id
            LEFT JOIN experts e1 ON e1.id = a.expert_1
            LEFT JOIN experts e2 ON e2.id = a.expert_2
            WHERE m.user_id = ?1
            ORDER BY a.id
            "#,
        )?;
        let tasks = stmt
            .query_map(params![user_id], |row| {
                let application = Self::map_row(row)?;
                let unrated: bool = row.get(14)?;
                let rating_requested = application.status == ApplicationStatus::Approved && unrated;
                Ok(ManagerTask {
                    application,
                    phase_title: row.get(13)?,
                    rating_requested,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 向已有阶段追加申请
    ///
    /// `grant_planner_to`: 同一事务内授予该用户新申请的 planner 委派
    pub fn create(
        &self,
        phase_id: i64,
        application: &NewApplication,
        grant_planner_to: Option<i64>,
    ) -> RepositoryResult<PhaseApplication> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let phase_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM phases WHERE id = ?1)",
            params![phase_id],
            |row| row.get(0),
        )?;
        if !phase_exists {
            return Err(RepositoryError::not_found("Phase", phase_id));
        }

        let id = Self::insert_in(&tx, phase_id, application, &Utc::now())?;
        if let Some(user_id) = grant_planner_to {
            AssignmentRepository::grant_in(&tx, Capability::Planner, user_id, &[id])?;
        }
        let created = Self::find_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("PhaseApplication", id))?;

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(created)
    }

    /// 指派专家, 状态强制置为 assigned
    ///
    /// # 返回
    /// - (指派前状态, 指派后的申请)
    pub fn assign_experts(
        &self,
        id: i64,
        experts: ExpertSlots,
    ) -> RepositoryResult<(ApplicationStatus, PhaseApplication)> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let previous = Self::find_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("PhaseApplication", id))?
            .status;

        tx.execute(
            r#"
            UPDATE phase_applications
            SET expert_1 = ?1, expert_2 = ?2, status = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                ExpertSlots::slot_for_db(experts.expert1),
                ExpertSlots::slot_for_db(experts.expert2),
                ApplicationStatus::Assigned.to_db_str(),
                format_ts(&Utc::now()),
                id,
            ],
        )?;
        let updated = Self::find_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("PhaseApplication", id))?;

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok((previous, updated))
    }

    /// 记录评审结果
    ///
    /// IMMEDIATE 事务:
    /// 1. 条件更新 (status = 'assigned', 批准时还要求至少一个专家), 未命中返回 InvalidStateTransition
    /// 2. 批准时按每个非空专家槽位写入一条聘任
    /// 任一步失败整体回滚
    pub fn record_review(
        &self,
        id: i64,
        action: ReviewAction,
        rejection_notes: Option<&str>,
    ) -> RepositoryResult<ReviewOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let current = Self::find_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("PhaseApplication", id))?;
        let target = action.target_status();
        let reviewed_at = Utc::now();

        let notes = match action {
            ReviewAction::Approve => None,
            ReviewAction::Reject => rejection_notes.map(str::trim).filter(|n| !n.is_empty()),
        };
        if action == ReviewAction::Reject && notes.is_none() {
            return Err(RepositoryError::FieldValueError {
                field: "rejection_notes".to_string(),
                message: "rejection notes are required when rejecting an application".to_string(),
            });
        }

        let guard = match action {
            ReviewAction::Approve => " AND (COALESCE(expert_1, 0) > 0 OR COALESCE(expert_2, 0) > 0)",
            ReviewAction::Reject => "",
        };
        let sql = format!(
            r#"
            UPDATE phase_applications
            SET status = ?1, rejection_notes = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5{}
            "#,
            guard
        );
        let changed = tx.execute(
            &sql,
            params![
                target.to_db_str(),
                notes,
                format_ts(&reviewed_at),
                id,
                ApplicationStatus::Assigned.to_db_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let mut engagement_ids = Vec::new();
        if action == ReviewAction::Approve {
            for (_, expert_id) in current.experts.assigned() {
                let engagement = NewEngagement::from_approval(&current, expert_id, reviewed_at);
                engagement_ids.push(EngagementRepository::insert_in(&tx, &engagement)?);
            }
        }

        let application = Self::find_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("PhaseApplication", id))?;
        tx.commit().map_err(RepositoryError::transaction)?;

        Ok(ReviewOutcome {
            application,
            engagement_ids,
        })
    }

    // ==========================================
    // 行映射
    // ==========================================

    /// 列序见 SELECT_APPLICATION
    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<PhaseApplication> {
        let app_type: String = row.get(2)?;
        let status: String = row.get(9)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;
        Ok(PhaseApplication {
            id: row.get(0)?,
            phase_id: row.get(1)?,
            app_type: parse_enum(2, &app_type, "application type", ApplicationType::parse)?,
            institution_name: row.get(3)?,
            qualification_name: row.get(4)?,
            experts: ExpertSlots::new(
                row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            ),
            expert1_name: row.get(7)?,
            expert2_name: row.get(8)?,
            status: parse_enum(9, &status, "application status", ApplicationStatus::parse)?,
            rejection_notes: row.get(10)?,
            created_at: parse_ts(11, &created_at)?,
            updated_at: parse_ts(12, &updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::NewPhase;
    use crate::domain::types::{EngagementType, PhaseStatus};
    use crate::repository::phase_repo::PhaseRepository;

    struct Fixture {
        conn: Arc<Mutex<Connection>>,
        repo: ApplicationRepository,
        phase_id: i64,
    }

    fn setup(app_type: ApplicationType, experts: ExpertSlots) -> (Fixture, i64) {
        let conn = crate::db::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO users (id, name, role) VALUES (1, 'Admin', 'admin');
            INSERT INTO experts (id, name) VALUES (10, 'E10'), (12, 'E12');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let phase = PhaseRepository::from_connection(conn.clone())
            .create_with_applications(
                &NewPhase {
                    title: "T".to_string(),
                    assigned_planner_id: 1,
                    status: PhaseStatus::Draft,
                    applications: vec![NewApplication {
                        app_type,
                        institution_name: "Inst".to_string(),
                        qualification_name: "Qual".to_string(),
                        experts,
                        status: ApplicationStatus::Pending,
                    }],
                },
                1000,
                None,
            )
            .unwrap();
        let app_id = phase.applications[0].id;
        let fixture = Fixture {
            repo: ApplicationRepository::from_connection(conn.clone()),
            conn,
            phase_id: phase.id,
        };
        (fixture, app_id)
    }

    fn engagement_count(conn: &Arc<Mutex<Connection>>) -> i64 {
        conn.lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM expert_engagements", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_assign_experts_forces_assigned() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        let (previous, app) = f.repo.assign_experts(id, ExpertSlots::new(10, 0)).unwrap();
        assert_eq!(previous, ApplicationStatus::Pending);
        assert_eq!(app.status, ApplicationStatus::Assigned);
        assert_eq!(app.expert1_name.as_deref(), Some("E10"));
        assert_eq!(app.experts.expert2, 0);
    }

    #[test]
    fn test_approve_creates_one_engagement_per_slot() {
        let (f, id) = setup(ApplicationType::InstitutionalListing, ExpertSlots::default());
        f.repo.assign_experts(id, ExpertSlots::new(10, 12)).unwrap();
        let outcome = f.repo.record_review(id, ReviewAction::Approve, None).unwrap();
        assert_eq!(outcome.application.status, ApplicationStatus::Approved);
        assert_eq!(outcome.engagement_ids.len(), 2);

        let engagements = EngagementRepository::from_connection(f.conn.clone())
            .list_by_application(id)
            .unwrap();
        assert!(engagements
            .iter()
            .all(|e| e.engagement_type == EngagementType::Evaluator && e.project_name == "Inst - Qual"));
    }

    #[test]
    fn test_review_requires_assigned_status() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::new(10, 0));
        let err = f.repo.record_review(id, ReviewAction::Approve, None).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
        assert_eq!(f.repo.find_by_id(id).unwrap().unwrap().status, ApplicationStatus::Pending);
        assert_eq!(engagement_count(&f.conn), 0);
    }

    #[test]
    fn test_second_approval_is_rejected() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        f.repo.assign_experts(id, ExpertSlots::new(10, 0)).unwrap();
        f.repo.record_review(id, ReviewAction::Approve, None).unwrap();
        let err = f.repo.record_review(id, ReviewAction::Approve, None).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
        assert_eq!(engagement_count(&f.conn), 1);
    }

    #[test]
    fn test_reject_stores_trimmed_notes() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        f.repo.assign_experts(id, ExpertSlots::new(10, 0)).unwrap();
        assert!(f.repo.record_review(id, ReviewAction::Reject, Some("   ")).is_err());
        let outcome = f
            .repo
            .record_review(id, ReviewAction::Reject, Some("  incomplete dossier "))
            .unwrap();
        assert_eq!(outcome.application.status, ApplicationStatus::Rejected);
        assert_eq!(outcome.application.rejection_notes.as_deref(), Some("incomplete dossier"));
        assert!(outcome.engagement_ids.is_empty());
    }

    #[test]
    fn test_list_filter_and_total() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        let extra = NewApplication {
            app_type: ApplicationType::InstitutionalListing,
            institution_name: "Other".to_string(),
            qualification_name: "Q".to_string(),
            experts: ExpertSlots::new(12, 0),
            status: ApplicationStatus::Pending,
        };
        f.repo.create(f.phase_id, &extra, None).unwrap();
        f.repo.create(f.phase_id, &extra, None).unwrap();

        let filter = ApplicationFilter {
            phase_id: Some(f.phase_id),
            app_type: Some(ApplicationType::InstitutionalListing),
            ..Default::default()
        };
        let (items, total) = f.repo.list(&filter, 1, 0).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);

        let by_expert = ApplicationFilter {
            expert_id: Some(12),
            ..Default::default()
        };
        assert_eq!(f.repo.list(&by_expert, 10, 0).unwrap().1, 2);
        assert_eq!(f.repo.find_missing(&[id, 999]).unwrap(), vec![999]);
    }

    #[test]
    fn test_create_in_missing_phase() {
        let (f, _) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        let app = NewApplication {
            app_type: ApplicationType::QualificationPlacement,
            institution_name: "I".to_string(),
            qualification_name: "Q".to_string(),
            experts: ExpertSlots::default(),
            status: ApplicationStatus::Pending,
        };
        let err = f.repo.create(404, &app, None).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_manager_tasks_flag_unrated_approvals() {
        let (f, id) = setup(ApplicationType::QualificationPlacement, ExpertSlots::default());
        AssignmentRepository::from_connection(f.conn.clone())
            .batch_assign_manager(5, &[id])
            .unwrap();
        let tasks = f.repo.list_manager_tasks(5).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].rating_requested);

        f.repo.assign_experts(id, ExpertSlots::new(10, 0)).unwrap();
        f.repo.record_review(id, ReviewAction::Approve, None).unwrap();
        let tasks = f.repo.list_manager_tasks(5).unwrap();
        assert!(tasks[0].rating_requested);
        assert_eq!(tasks[0].phase_title, "T");
        assert!(f.repo.list_manager_tasks(6).unwrap().is_empty());
    }
}
