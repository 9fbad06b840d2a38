use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::user::{DepartmentAssignment, RoleAssignment, SystemAssignment, UserAccount};

pub struct UserRepository {
    db_pool: PgPool,
}

impl UserRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Looks up an account by email. A miss is not an error here; sign-in
    /// decides how to answer without leaking whether the address exists.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, full_name, password_hash, is_active, must_change_password
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, full_name, password_hash, is_active, must_change_password
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    /// Marks the account inactive. Fired by the lockout escalation path; the
    /// account stays in place so an operator can reinstate it.
    pub async fn deactivate(&self, id: &Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    /// Replaces the account password inside one transaction: the old hash is
    /// pushed into the history table, the history is pruned to `history_depth`
    /// previous entries, and any pending must-change flag is cleared.
    pub async fn update_password(
        &self,
        id: &Uuid,
        new_password_hash: &str,
        history_depth: i64,
    ) -> AppResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let (old_hash,): (String,) = sqlx::query_as(
            r#"
            SELECT password_hash
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO password_history (id, user_id, password_hash, created_at)
            VALUES ($1, $2, $3, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(&old_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                must_change_password = FALSE,
                updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(new_password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM password_history
            WHERE user_id = $1
              AND id NOT IN (
                  SELECT id
                  FROM password_history
                  WHERE user_id = $1
                  ORDER BY created_at DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(id)
        .bind(history_depth)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Most recent previous password hashes, newest first. The current hash
    /// lives on the `users` row and is not included.
    pub async fn password_history(&self, id: &Uuid, limit: i64) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT password_hash
            FROM password_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(|(hash,)| hash).collect())
    }

    pub async fn user_roles(&self, id: &Uuid) -> AppResult<Vec<RoleAssignment>> {
        let roles = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT r.id, r.code, r.description
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.code
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(roles)
    }

    pub async fn user_departments(&self, id: &Uuid) -> AppResult<Vec<DepartmentAssignment>> {
        let departments = sqlx::query_as::<_, DepartmentAssignment>(
            r#"
            SELECT d.id, d.name
            FROM departments d
            JOIN user_departments ud ON ud.department_id = d.id
            WHERE ud.user_id = $1
            ORDER BY d.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(departments)
    }

    pub async fn user_systems(&self, id: &Uuid) -> AppResult<Vec<SystemAssignment>> {
        let systems = sqlx::query_as::<_, SystemAssignment>(
            r#"
            SELECT s.id, s.name
            FROM systems s
            JOIN user_systems us ON us.system_id = s.id
            WHERE us.user_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(systems)
    }
}
