//! Process-wide session state for the dashboard client.
//!
//! The [`SessionStore`] holds at most one [`AccessToken`](crate::AccessToken)
//! in memory and mirrors it into a [`TokenStorage`] backend so the session
//! survives restarts.
//!
//! ```rust,ignore
//! use canary_session::session::{FileStorage, SessionStore};
//!
//! let store = SessionStore::new(FileStorage::new("storage.json"), "canary_token");
//! store.load();
//! if store.current().is_none() {
//!     // send the user to sign in
//! }
//! ```

mod storage;
mod store;

pub use storage::{FileStorage, MemoryStorage, TokenStorage};
pub use store::SessionStore;
