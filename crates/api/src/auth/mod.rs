//! Authentication primitives: the token engine, revocation blacklist,
//! CSRF guard, password hashing, and cookie helpers.

pub mod blacklist;
pub mod cookies;
pub mod csrf;
pub mod password;
pub mod tokens;
