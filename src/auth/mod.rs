//! Bearer token verification. Tokens are issued by the identity provider;
//! this service only checks them and extracts the user id.

pub mod claims;
pub mod extractors;
pub mod jwt;

pub use extractors::AuthUser;
pub use jwt::JwtKeys;
