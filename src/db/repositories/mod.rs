pub mod permission_repository;
pub mod user_repository;

pub use permission_repository::PermissionRepository;
pub use user_repository::UserRepository;
