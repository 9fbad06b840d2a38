use std::collections::HashMap;
use std::collections::hash_map::Entry;

use uuid::Uuid;

use crate::db::repositories::PermissionRepository;
use crate::error::AppResult;
use crate::models::permission::{AccessLevel, PermissionGrantRow, ResolvedPermission};

/// Resolves the navigation/permission payload for a freshly authenticated
/// user. Grants are fetched per role, then scoped and deduplicated in memory.
pub struct PermissionResolver {
    permissions: PermissionRepository,
}

impl PermissionResolver {
    pub fn new(permissions: PermissionRepository) -> Self {
        Self { permissions }
    }

    pub async fn resolve_for_user(
        &self,
        role_ids: &[Uuid],
        department_ids: &[Uuid],
        system_ids: &[Uuid],
    ) -> AppResult<Vec<ResolvedPermission>> {
        let grants = self.permissions.grants_for_roles(role_ids).await?;
        Ok(resolve(grants, department_ids, system_ids))
    }
}

/// Scopes and folds raw grants into the final permission list.
///
/// A grant applies when its department is unset (role-wide) or held by the
/// user, and its screen's system is one the user is assigned to. The same
/// screen is often reachable through several roles or departments with
/// different levels; per `(screenName, screenCode, systemName)` only the
/// highest access level survives, so the result is deterministic however the
/// grants arrive.
pub fn resolve(
    grants: Vec<PermissionGrantRow>,
    department_ids: &[Uuid],
    system_ids: &[Uuid],
) -> Vec<ResolvedPermission> {
    let mut by_screen: HashMap<(String, String, String), ResolvedPermission> = HashMap::new();

    for grant in grants {
        let department_in_scope = match grant.department_id {
            None => true,
            Some(department_id) => department_ids.contains(&department_id),
        };
        if !department_in_scope {
            continue;
        }
        if !system_ids.contains(&grant.system_id) {
            continue;
        }

        let level = AccessLevel::from_name(&grant.access_type);
        let key = (
            grant.screen_name.clone(),
            grant.screen_code.clone(),
            grant.system_name.clone(),
        );

        match by_screen.entry(key) {
            Entry::Occupied(mut entry) => {
                if level > entry.get().access_type {
                    let existing = entry.get_mut();
                    existing.access_type = level;
                    existing.access_type_priority = level.priority();
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(ResolvedPermission {
                    screen_name: grant.screen_name,
                    screen_code: grant.screen_code,
                    system_name: grant.system_name,
                    access_type: level,
                    access_type_priority: level.priority(),
                });
            }
        }
    }

    let mut resolved: Vec<ResolvedPermission> = by_screen.into_values().collect();
    resolved.sort_by(|a, b| {
        (&a.system_name, &a.screen_name, &a.screen_code)
            .cmp(&(&b.system_name, &b.screen_name, &b.screen_code))
    });
    resolved
}
