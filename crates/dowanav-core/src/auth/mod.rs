//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: login, logout and refresh against the auth endpoints,
//!   plus accessors over the persisted session
//! - `TokenStorage`: the key-value interface the session is persisted through,
//!   with in-memory, JSON file and OS keychain backends
//!
//! The session is the triple `auth_token`, `refresh_token`, `current_user`.

pub mod session;
pub mod storage;

pub use session::{SessionManager, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, StorageError, TokenStorage};
