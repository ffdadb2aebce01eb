pub mod refresh_token_repository;
pub mod user_repository;

pub use refresh_token_repository::RefreshTokenRepository;
pub use user_repository::UserRepository;
