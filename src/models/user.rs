use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable account row as the auth flows see it. Master-data details
/// (factories, customers, screen assignments) live in their own tables and
/// repositories.
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub must_change_password: bool,
}

/// A role held by a user, scoped to systems via the permission grants.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: Uuid,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentAssignment {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAssignment {
    pub id: Uuid,
    pub name: String,
}

/// Capability level resolved from role assignments once, at authentication
/// time, and carried in the access-token claims. Call sites compare this enum
/// instead of matching on role description strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Standard,
}

/// Role code granted the super-admin capability.
pub const SUPER_ADMIN_ROLE_CODE: &str = "super-admin";
/// Legacy role description carrying the same capability; older rows predate
/// the `code` column.
pub const SUPER_ADMIN_LEGACY_DESCRIPTION: &str = "BackofficeSuperAdmin";

impl UserRole {
    pub fn from_assignments(roles: &[RoleAssignment]) -> Self {
        let is_super_admin = roles.iter().any(|role| {
            role.code.eq_ignore_ascii_case(SUPER_ADMIN_ROLE_CODE)
                || role.description == SUPER_ADMIN_LEGACY_DESCRIPTION
        });
        if is_super_admin {
            UserRole::SuperAdmin
        } else {
            UserRole::Standard
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(code: &str, description: &str) -> RoleAssignment {
        RoleAssignment {
            id: Uuid::new_v4(),
            code: code.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn super_admin_resolved_from_role_code() {
        let roles = vec![role("viewer", "Read-only staff"), role("Super-Admin", "Ops")];
        assert_eq!(UserRole::from_assignments(&roles), UserRole::SuperAdmin);
    }

    #[test]
    fn super_admin_resolved_from_legacy_description() {
        let roles = vec![role("ops", "BackofficeSuperAdmin")];
        assert_eq!(UserRole::from_assignments(&roles), UserRole::SuperAdmin);
        assert!(UserRole::from_assignments(&roles).is_super_admin());
    }

    #[test]
    fn plain_roles_resolve_to_standard() {
        let roles = vec![role("viewer", "Read-only staff")];
        assert_eq!(UserRole::from_assignments(&roles), UserRole::Standard);
        assert_eq!(UserRole::from_assignments(&[]), UserRole::Standard);
    }
}
