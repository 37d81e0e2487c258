mod claims;
pub(crate) mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::AuthUser;
pub use jwt::JwtKeys;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
