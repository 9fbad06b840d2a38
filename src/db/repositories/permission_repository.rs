use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::permission::PermissionGrantRow;

pub struct PermissionRepository {
    db_pool: PgPool,
}

impl PermissionRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Every screen grant attached to any of the given roles, joined with the
    /// screen and owning system. Department/system scoping happens in the
    /// resolver, not here.
    pub async fn grants_for_roles(&self, role_ids: &[Uuid]) -> AppResult<Vec<PermissionGrantRow>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let grants = sqlx::query_as::<_, PermissionGrantRow>(
            r#"
            SELECT p.role_id,
                   p.department_id,
                   p.screen_id,
                   sc.name AS screen_name,
                   sc.code AS screen_code,
                   sy.id   AS system_id,
                   sy.name AS system_name,
                   p.access_type
            FROM role_screen_permissions p
            JOIN screens sc ON sc.id = p.screen_id
            JOIN systems sy ON sy.id = sc.system_id
            WHERE p.role_id = ANY($1)
            ORDER BY sy.name, sc.name
            "#,
        )
        .bind(role_ids)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(grants)
    }
}
