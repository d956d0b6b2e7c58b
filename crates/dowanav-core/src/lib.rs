//! Session management and authenticated HTTP access for the DOWA navigation
//! backend.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dowanav_core::{ApiClient, Config, MemoryStorage, SessionManager};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::default();
//! let session = SessionManager::new(&config, Arc::new(MemoryStorage::new()))?;
//! let api = ApiClient::new(&config)?
//!     .with_session(session.clone())
//!     .with_login_required(|| eprintln!("Your session has expired. Please login again."));
//!
//! if session.login("ada", "secret").await.is_success() {
//!     let me = api.fetch_current_user().await?;
//!     println!("{}", me.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, LoginRequired, RequestOptions};
pub use auth::{FileStorage, KeyringStorage, MemoryStorage, SessionManager, StorageError, TokenStorage};
pub use config::{Config, StorageKind};
pub use models::{LoginOutcome, NavigationStatus, UserProfile};
