//! Typed wrappers over the backend's `auth`, `user` and `admin` surfaces.

mod admin;
mod auth;
mod user;

pub use admin::AdminApi;
pub use auth::AuthApi;
pub use user::UserApi;
