// ==========================================
// 专家评审阶段管理系统 - 专家评分仓储
// ==========================================
// 职责: application_ratings 的 upsert 与查询
// 约束: (application_id, expert_id) 唯一, 重复评分覆盖旧值
// ==========================================

use crate::domain::engagement::ExpertRating;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct RatingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RatingRepository {
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

    /// 写入或覆盖评分
    pub fn upsert(&self, rating: &ExpertRating) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO application_ratings (application_id, expert_id, rating, comment, rated_by, rated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(application_id, expert_id) DO UPDATE SET
                rating = excluded.rating,
                comment = excluded.comment,
                rated_by = excluded.rated_by,
                rated_at = excluded.rated_at
            "#,
            params![
                rating.application_id,
                rating.expert_id,
                rating.rating,
                rating.comment,
                rating.rated_by,
                format_ts(&rating.rated_at),
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, application_id: i64, expert_id: i64) -> RepositoryResult<Option<ExpertRating>> {
        let conn = self.get_conn()?;
        let rating = conn
            .query_row(
                r#"
                SELECT application_id, expert_id, rating, comment, rated_by, rated_at
                FROM application_ratings
                WHERE application_id = ?1 AND expert_id = ?2
                "#,
                params![application_id, expert_id],
                Self::map_row,
            )
            .optional()?;
        Ok(rating)
    }

    /// 申请下的全部评分 (按专家ID)
    pub fn list_by_application(&self, application_id: i64) -> RepositoryResult<Vec<ExpertRating>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT application_id, expert_id, rating, comment, rated_by, rated_at
            FROM application_ratings
            WHERE application_id = ?1
            ORDER BY expert_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![application_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ExpertRating> {
        let rated_at: String = row.get(5)?;
        Ok(ExpertRating {
            application_id: row.get(0)?,
            expert_id: row.get(1)?,
            rating: row.get(2)?,
            comment: row.get(3)?,
            rated_by: row.get(4)?,
            rated_at: parse_ts(5, &rated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_upsert_replaces_previous_rating() {
        let conn = crate::db::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO phases (id, phase_code, title, assigned_planner_id, status, created_at, updated_at)
            VALUES (1, 'PH-2025-001', 'T', 1, 'draft', '', '');
            INSERT INTO phase_applications (id, phase_id, type, institution_name, qualification_name, expert_1, status, created_at, updated_at)
            VALUES (1, 1, 'QP', 'I', 'Q', 10, 'approved', '', '');
            "#,
        )
        .unwrap();
        let repo = RatingRepository::from_connection(Arc::new(Mutex::new(conn)));

        let mut rating = ExpertRating {
            application_id: 1,
            expert_id: 10,
            rating: 3,
            comment: None,
            rated_by: 5,
            rated_at: Utc::now(),
        };
        repo.upsert(&rating).unwrap();
        rating.rating = 5;
        rating.comment = Some("thorough".to_string());
        repo.upsert(&rating).unwrap();

        let found = repo.find(1, 10).unwrap().unwrap();
        assert_eq!(found.rating, 5);
        assert_eq!(found.comment.as_deref(), Some("thorough"));
        assert_eq!(repo.list_by_application(1).unwrap().len(), 1);
        assert!(repo.find(1, 11).unwrap().is_none());
    }
}
