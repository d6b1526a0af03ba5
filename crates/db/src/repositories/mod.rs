mod session_repo;
mod user_repo;

pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
