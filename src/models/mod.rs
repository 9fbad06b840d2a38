pub mod auth_claims;
pub mod authenticated_user;
pub mod permission;
pub mod user;

pub use auth_claims::*;
pub use authenticated_user::AuthenticatedUser;
pub use permission::{AccessLevel, PermissionGrantRow, ResolvedPermission};
pub use user::{
    DepartmentAssignment, RoleAssignment, SystemAssignment, UserAccount, UserRole,
};
