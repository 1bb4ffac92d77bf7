#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod callback;
#[cfg(feature = "client")]
pub mod client;
pub mod config;
#[cfg(feature = "client")]
mod dashboard;
pub mod error;
pub mod guard;
#[cfg(feature = "client")]
pub mod repos;
pub mod session;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use callback::{AuthCallbackHandler, CallbackOutcome, CallbackParams};
#[cfg(feature = "client")]
pub use client::{ApiClient, ExchangeResponse};
pub use config::ClientConfig;
#[cfg(feature = "client")]
pub use dashboard::DashboardClient;
pub use error::Error;
pub use guard::{GuardDecision, RouteGuard, ViewOutcome};
#[cfg(feature = "client")]
pub use repos::{RepositoryCard, RepositoryService};
pub use session::{FileStorage, MemoryStorage, SessionStore, TokenStorage};
pub use types::{
    AccessToken, NewRepository, RepoId, ReportId, Repository, RepositoryActivationState, Route,
    ScanReport, ScanStatus,
};
