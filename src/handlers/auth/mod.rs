pub mod logout_handler;
pub mod password_handler;
pub mod refresh_handler;
pub mod signin_handler;
pub mod verify_handler;
