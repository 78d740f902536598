//! Password hashing and random credential generation.

use crate::error::Error;
use rand::distributions::Slice;
use rand::Rng;

/// bcrypt cost for stored account and admin passwords.
pub const BCRYPT_COST: u32 = 10;

/// A fixed known-good bcrypt hash. Whenever an account or admin lookup
/// misses, the caller must still verify the presented password against this
/// hash so that "no such user" takes as long as "wrong password". This is a
/// security contract, not an optimization.
pub const DUMMY_HASH: &str = "$2a$10$8JEFVNYYhLoBysjAxe2yBuXrkDojBQBkVpXEQgyQyjn43SvJ4vL36";

const API_PASSWORD_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l',
    'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

// Subdomains are DNS labels, so stay lowercase.
const SUBDOMAIN_ALPHABET: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Hashes a plaintext password with bcrypt at [`BCRYPT_COST`].
pub fn hash_password(plain: &str) -> Result<String, Error> {
    Ok(bcrypt::hash(plain, BCRYPT_COST)?)
}

/// Verifies a plaintext password against a stored bcrypt hash. A hash that
/// fails to parse counts as a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

/// Burns one bcrypt verification against [`DUMMY_HASH`]. Called on every
/// credential lookup miss before the unauthenticated response goes out.
pub fn dummy_verify(plain: &str) {
    let _ = bcrypt::verify(plain, DUMMY_HASH);
}

/// Generates a fresh 40-character `[A-Za-z0-9]` API password.
pub fn generate_api_password() -> String {
    random_string(API_PASSWORD_ALPHABET, crate::validation::API_KEY_LEN)
}

/// Generates a fresh 40-character `[a-z0-9]` subdomain label.
pub fn generate_subdomain() -> String {
    random_string(SUBDOMAIN_ALPHABET, crate::validation::SUBDOMAIN_LEN)
}

fn random_string(alphabet: &[char], len: usize) -> String {
    let dist = Slice::new(alphabet).expect("non-empty alphabet");
    rand::thread_rng().sample_iter(dist).take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{valid_api_key, valid_subdomain};

    #[test]
    fn hash_round_trip() {
        let hash = hash_password("nevergonnagiveyouup").unwrap();
        assert!(verify_password("nevergonnagiveyouup", &hash));
        assert!(!verify_password("nevergonnagiveyoudown", &hash));
        assert!(!verify_password("nevergonnagiveyouuP", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn verify_tolerates_garbage_hash() {
        assert!(!verify_password("password", "not a bcrypt hash"));
    }

    #[test]
    fn dummy_hash_is_a_real_hash() {
        // The fallback must exercise a full bcrypt verification.
        assert!(bcrypt::verify("anything", DUMMY_HASH).is_ok());
    }

    #[test]
    fn generated_credentials_have_expected_shape() {
        let password = generate_api_password();
        assert!(valid_api_key(&password));
        let subdomain = generate_subdomain();
        assert!(valid_subdomain(&subdomain));
        assert_ne!(generate_api_password(), password);
    }
}
