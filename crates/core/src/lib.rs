//! Shared domain types for the portal backend.
//!
//! Everything here is pure: no I/O, no framework types. The `db` and `api`
//! crates depend on this crate for the error taxonomy, ID types, role
//! constants, and the credential lockout policy.

pub mod error;
pub mod lockout;
pub mod roles;
pub mod types;
