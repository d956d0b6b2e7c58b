//! Data models for the navigation backend.
//!
//! - `UserProfile`: the cached profile of the signed-in user
//! - Auth wire types: login/refresh request and response bodies
//! - `NavigationStatus`: the host's navigation health report

pub mod auth;
pub mod status;
pub mod user;

pub use auth::{ErrorBody, LoginOutcome, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
pub use status::NavigationStatus;
pub use user::UserProfile;
