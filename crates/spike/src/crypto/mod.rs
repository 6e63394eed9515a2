// Crypto module: password hashing, session JWTs, random strings.

pub mod jwt;
pub mod password;
pub mod random;

pub use jwt::{sign_jwt, verify_jwt};
pub use password::{hash_password, verify_password};
pub use random::generate_random_string;

use subtle::ConstantTimeEq;

/// Compare two byte slices without short-circuiting on the first mismatch.
pub fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_equal() {
        assert!(constant_time_equal(b"abc", b"abc"));
        assert!(!constant_time_equal(b"abc", b"abd"));
        assert!(!constant_time_equal(b"abc", b"abcd"));
    }
}
