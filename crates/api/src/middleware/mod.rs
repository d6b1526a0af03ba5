//! Request-level guards: authentication extractors, role checks, and
//! the CSRF layer. Guards compose as extractor parameters, so a route
//! states its requirements in its own signature.

pub mod auth;
pub mod csrf;
pub mod rbac;
