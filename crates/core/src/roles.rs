//! Well-known role name constants.
//!
//! These must match the seed data in `20260301000001_create_users_table.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Roles allowed to act on other users' sessions.
pub const ADMIN_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_MODERATOR];

/// Whether `role` may manage resources owned by other users.
pub fn is_admin_role(role: &str) -> bool {
    ADMIN_ROLES.contains(&role)
}
