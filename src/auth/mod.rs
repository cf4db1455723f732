//! Authentication module
//!
//! Bearer tokens are issued by the identity service; this crate only verifies them
//! and reads the user id and role from the claims.

mod jwt;

pub use jwt::{generate_access_token, verify_token, Claims, JwtError, TokenVerifier};
