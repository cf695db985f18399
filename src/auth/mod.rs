pub mod auth;
pub mod permissions;
pub mod user;

pub use auth::*;
pub use permissions::*;
pub use user::*;
