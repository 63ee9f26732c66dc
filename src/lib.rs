//! Carelink: registration and linking of primary users, caregivers and elders.
//!
//! A primary user registers and receives a six-character invite code.
//! Caregivers and elders register with that code and are added to the
//! primary's member lists.

pub mod config;
pub mod credentials;
pub mod db;
pub mod invite;
pub mod logging;
pub mod models;
pub mod notify;
pub mod registration;
pub mod server;
pub mod store;

pub use invite::InviteCode;
pub use models::{RegistrationForm, UserId, UserRecord, UserType};
pub use notify::{Notice, NotificationSink};
pub use registration::{Outcome, Registrar, RegistrationError};

/// Crate version, as reported by `/health` and `--version`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
