//! Password hashes in werkzeug's `method$salt$hash` form, so the auth server's
//! `check_password_hash` accepts what the admin CLI writes and the other way
//! around.
//!
//! New hashes are `pbkdf2:sha256:<iterations>`. Verification also accepts
//! `pbkdf2:sha512:<iterations>` and werkzeug's default `scrypt:<n>:<r>:<p>`.

use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Sha256, Sha512};

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

/// werkzeug `gen_salt(16)`: ASCII letters and digits
const SALT_LEN: usize = 16;
const SCRYPT_KEY_LEN: usize = 64;

/// Hash with a fresh salt. [`UserStore`](super::UserStore) passes
/// [`DEFAULT_PBKDF2_ITERATIONS`] unless configured otherwise.
pub fn hash_password_with(password: &str, iterations: u32) -> String {
    let salt: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    let mut dk = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut dk);
    format!("pbkdf2:sha256:{}${}${}", iterations, salt, hex::encode(dk))
}

/// `false` for a wrong password and for a hash this module cannot read.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next()) else {
        tracing::warn!("Stored password hash is not in method$salt$hash form");
        return false;
    };
    match derive(method, password.as_bytes(), salt.as_bytes()) {
        Some(computed) => hex::encode(computed) == expected,
        None => {
            tracing::warn!("Unsupported password hash method '{}'", method);
            false
        }
    }
}

fn derive(method: &str, password: &[u8], salt: &[u8]) -> Option<Vec<u8>> {
    let fields: Vec<&str> = method.split(':').collect();
    match fields.as_slice() {
        ["pbkdf2", digest, iterations] => {
            let iterations = iterations.parse::<u32>().ok().filter(|&i| i > 0)?;
            match *digest {
                "sha256" => {
                    let mut dk = vec![0u8; 32];
                    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut dk);
                    Some(dk)
                }
                "sha512" => {
                    let mut dk = vec![0u8; 64];
                    pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut dk);
                    Some(dk)
                }
                _ => None,
            }
        }
        ["scrypt", n, r, p] => {
            let n = n.parse::<u64>().ok().filter(|n| n.is_power_of_two() && *n > 1)?;
            let log_n = u8::try_from(n.trailing_zeros()).ok()?;
            let params = scrypt::Params::new(log_n, r.parse().ok()?, p.parse().ok()?, SCRYPT_KEY_LEN).ok()?;
            let mut dk = vec![0u8; SCRYPT_KEY_LEN];
            scrypt::scrypt(password, salt, &params, &mut dk).ok()?;
            Some(dk)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // werkzeug.security.check_password_hash로 검증한 값
    const WERKZEUG_PBKDF2_SHA256: &str = "pbkdf2:sha256:1000$Xb3kQ9mZ2pLr7TsW$\
        a7d65f4b2a87c8724ffb3a498123f2bab9ac2f8eaa66bb7817732bde81962ef7";
    const WERKZEUG_PBKDF2_SHA512: &str = "pbkdf2:sha512:1000$Xb3kQ9mZ2pLr7TsW$\
        330da4f19e512f46f8273f7992817e604cc730725445d41f56810e1ebf484877\
        1e86b12ca28ebe9277d2bbd451fdb74b909578c320a0be4cd8dc2413e3b493e5";
    const WERKZEUG_SCRYPT: &str = "scrypt:1024:8:1$Xb3kQ9mZ2pLr7TsW$\
        e1effae53596e0c24dbe18fac60ae3d8a779774d9405e7141d3df3f62a0fcca0\
        02431a122cbf5e562ae3384e3e3e3144998a6625cc6a77fc8fa42d01952dad92";

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password_with("pw", 1_000);
        assert!(hash.starts_with("pbkdf2:sha256:1000$"));
        assert!(verify_password("pw", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn hash_layout_matches_werkzeug() {
        let hash = hash_password_with("pw", 1_000);
        let parts: Vec<&str> = hash.split('$').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), SALT_LEN);
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2].len(), 64);
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password_with("pw", 1_000), hash_password_with("pw", 1_000));
    }

    #[test]
    fn verifies_hashes_written_by_the_auth_server() {
        for hash in [WERKZEUG_PBKDF2_SHA256, WERKZEUG_PBKDF2_SHA512, WERKZEUG_SCRYPT] {
            assert!(verify_password("hunter2", hash), "{}", hash);
            assert!(!verify_password("hunter3", hash), "{}", hash);
        }
    }

    #[test]
    fn unreadable_hashes_never_verify() {
        assert!(!verify_password("pw", "plaintext-pw"));
        assert!(!verify_password("", ""));
        assert!(!verify_password("pw", "md5$salt$abcdef"));
        assert!(!verify_password("pw", "pbkdf2:sha256:0$salt$abcdef"));
        assert!(!verify_password("pw", "scrypt:1000:8:1$salt$abcdef"));
    }
}
