//! Registration and linking workflow.
//!
//! A submission is validated locally, then a credential is created, then
//! either a primary record is written with a fresh invite code, or the
//! invite code is resolved to a primary and a secondary record is written and
//! added to that primary's member list.

mod error;
mod validate;
mod workflow;

pub use error::{RegistrationError, Stage};
pub use validate::{validate, Field, ValidationError};
pub use workflow::{Outcome, Registrar, DEFAULT_INVITE_CODE_ATTEMPTS};
