// Password hashing: scrypt (N=16384, r=16, p=1, dkLen=64) with a random
// 16-byte salt. Stored as "hex(salt):hex(key)".

use rand::RngCore;
use scrypt::{Params, scrypt};

use spike_core::error::SpikeError;

/// A well-formed hash of a random throwaway password. Verifying against it
/// costs one full scrypt derivation, the same as checking a real account.
pub const DUMMY_PASSWORD_HASH: &str = "a36d481f9b79cfe3a544237da3d48cf3:\
d4d25ae85630f570bcea3dad72ae48f5ec5d1ef57f636d02cab47fdcfc4b2e1c\
0121443e62cfa9144a185cdea9673753fad1ddb9477f4cad7753852d036c9d30";

/// Hash a password, returning `salt:key` (both hex).
pub fn hash_password(password: &str) -> Result<String, SpikeError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt_hex = hex::encode(salt_bytes);

    let key = generate_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Verify a password against a hash produced by [`hash_password`].
pub fn verify_password(hash: &str, password: &str) -> Result<bool, SpikeError> {
    let (salt, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| SpikeError::Crypto("Invalid password hash format".into()))?;

    let expected_key = hex::decode(key_hex)
        .map_err(|e| SpikeError::Crypto(format!("Invalid hex in password hash: {e}")))?;

    let derived_key = generate_key(password, salt)?;
    Ok(super::constant_time_equal(&derived_key, &expected_key))
}

fn generate_key(password: &str, salt: &str) -> Result<Vec<u8>, SpikeError> {
    // log2(N) = 14
    let params = Params::new(14, 16, 1, 64)
        .map_err(|e| SpikeError::Crypto(format!("Invalid scrypt params: {e}")))?;

    let mut output = vec![0u8; 64];
    scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| SpikeError::Crypto(format!("scrypt failed: {e}")))?;
    Ok(output)
}
