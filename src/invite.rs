//! Invite codes linking secondary users to a primary user.
//!
//! A code is 6 characters drawn uniformly from `[A-Z0-9]`. It is created
//! once, when the primary's record is written, and never changes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters in an invite code.
pub const INVITE_CODE_LEN: usize = 6;

/// Alphabet invite codes are drawn from.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A short shared code identifying a primary user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Draw a fresh random code.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draw a code from the given random source.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..INVITE_CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..INVITE_CODE_ALPHABET.len());
                INVITE_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Wrap a code typed by a user. No format check is applied: a code
    /// that does not exist simply fails to resolve.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns true if the code has the shape of a generated code.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == INVITE_CODE_LEN && self.0.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of candidate invite codes for new primary users.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> InviteCode;
}

/// Draws codes from the thread-local random generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn generate(&self) -> InviteCode {
        InviteCode::generate()
    }
}
