//! User Security Model (RFC 3414): password-to-key, key localization, and
//! the authentication/privacy protocols registered in `AuthProtocol`/
//! `PrivProtocol`.

use aes::Aes128;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;

use super::{AuthProtocol, PrivProtocol};
use crate::{Error, Result};

const EXPANSION_LEN: usize = 1_048_576;

/// RFC 3414 Appendix A.2: repeats `password` cyclically to fill a 1MB
/// buffer and digests it, rather than hashing the (typically short)
/// password directly.
fn password_to_key_md5(password: &[u8]) -> [u8; 16] {
    if password.is_empty() {
        return Md5::digest(b"").into();
    }
    let mut hasher = Md5::new();
    let mut produced = 0usize;
    let mut cursor = 0usize;
    let mut chunk = [0u8; 64];
    while produced < EXPANSION_LEN {
        for slot in chunk.iter_mut() {
            *slot = password[cursor % password.len()];
            cursor += 1;
        }
        hasher.update(chunk);
        produced += chunk.len();
    }
    hasher.finalize().into()
}

fn password_to_key_sha1(password: &[u8]) -> [u8; 20] {
    use sha1::Digest as _;
    if password.is_empty() {
        return Sha1::digest(b"").into();
    }
    let mut hasher = Sha1::new();
    let mut produced = 0usize;
    let mut cursor = 0usize;
    let mut chunk = [0u8; 64];
    while produced < EXPANSION_LEN {
        for slot in chunk.iter_mut() {
            *slot = password[cursor % password.len()];
            cursor += 1;
        }
        hasher.update(chunk);
        produced += chunk.len();
    }
    hasher.finalize().into()
}

/// RFC 3414 Appendix A.2: `Hash(Kul || engineID || Kul)`.
fn localize_md5(key: &[u8; 16], engine_id: &[u8]) -> [u8; 16] {
    let mut buf = Vec::with_capacity(16 + engine_id.len() + 16);
    buf.extend_from_slice(key);
    buf.extend_from_slice(engine_id);
    buf.extend_from_slice(key);
    Md5::digest(&buf).into()
}

fn localize_sha1(key: &[u8; 20], engine_id: &[u8]) -> [u8; 20] {
    use sha1::Digest as _;
    let mut buf = Vec::with_capacity(20 + engine_id.len() + 20);
    buf.extend_from_slice(key);
    buf.extend_from_slice(engine_id);
    buf.extend_from_slice(key);
    Sha1::digest(&buf).into()
}

/// A key localized to a specific authoritative engine, ready to key an
/// auth or privacy protocol. The length depends on the digest algorithm
/// used to derive it (16 bytes for MD5, 20 for SHA-1).
#[derive(Clone)]
pub struct LocalizedKey(pub Vec<u8>);

/// Derives the localized authentication key for `protocol` from a
/// plaintext password and the target engine ID.
pub fn localize_auth_key(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Result<LocalizedKey> {
    match protocol {
        AuthProtocol::HmacMd5 => {
            let kul = password_to_key_md5(password);
            Ok(LocalizedKey(localize_md5(&kul, engine_id).to_vec()))
        }
        AuthProtocol::HmacSha1 => {
            let kul = password_to_key_sha1(password);
            Ok(LocalizedKey(localize_sha1(&kul, engine_id).to_vec()))
        }
        AuthProtocol::None => Ok(LocalizedKey(Vec::new())),
        _ => Err(Error::UnsupportedAlgorithm),
    }
}

/// Derives the localized privacy key. RFC 3414 reuses the auth
/// password-to-key/localization algorithm keyed by the privacy password;
/// only the first 16 bytes are used as the AES-128 key.
pub fn localize_priv_key(protocol: PrivProtocol, auth_protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Result<LocalizedKey> {
    match protocol {
        PrivProtocol::Aes128 => {
            let auth_like = match auth_protocol {
                AuthProtocol::HmacSha1 | AuthProtocol::None => AuthProtocol::HmacSha1,
                _ => AuthProtocol::HmacMd5,
            };
            let localized = localize_auth_key(auth_like, password, engine_id)?;
            let mut key = localized.0;
            key.truncate(16);
            Ok(LocalizedKey(key))
        }
        PrivProtocol::None => Ok(LocalizedKey(Vec::new())),
        _ => Err(Error::UnsupportedAlgorithm),
    }
}

const AUTH_PARAMETERS_LEN: usize = 12;

type HmacMd5 = Hmac<Md5>;
type HmacSha1 = Hmac<Sha1>;

/// Computes the 12-octet authentication parameter over `message`, which
/// must already have its `msgAuthenticationParameters` field zeroed.
pub fn sign(protocol: AuthProtocol, key: &LocalizedKey, message: &[u8]) -> Result<[u8; AUTH_PARAMETERS_LEN]> {
    let mut out = [0u8; AUTH_PARAMETERS_LEN];
    match protocol {
        AuthProtocol::HmacMd5 => {
            let mut mac = HmacMd5::new_from_slice(&key.0).map_err(|_| Error::UnsupportedAlgorithm)?;
            mac.update(message);
            out.copy_from_slice(&mac.finalize().into_bytes()[..AUTH_PARAMETERS_LEN]);
        }
        AuthProtocol::HmacSha1 => {
            let mut mac = HmacSha1::new_from_slice(&key.0).map_err(|_| Error::UnsupportedAlgorithm)?;
            mac.update(message);
            out.copy_from_slice(&mac.finalize().into_bytes()[..AUTH_PARAMETERS_LEN]);
        }
        AuthProtocol::None => return Ok(out),
        _ => return Err(Error::UnsupportedAlgorithm),
    }
    Ok(out)
}

/// Verifies `received` against a freshly computed digest, constant-time
/// to avoid leaking partial matches through timing.
pub fn verify(protocol: AuthProtocol, key: &LocalizedKey, message: &[u8], received: &[u8]) -> Result<()> {
    let expected = sign(protocol, key, message)?;
    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(received.iter()) {
        diff |= a ^ b;
    }
    if diff != 0 || received.len() != expected.len() {
        return Err(Error::AuthenticationFailed);
    }
    Ok(())
}

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// Encrypts `plaintext` under AES-128-CFB (RFC 3826) using a 16-byte IV
/// built from the engine's boot/time counters and a random 8-byte salt.
/// Returns the ciphertext and the 8-byte `msgPrivacyParameters` salt the
/// receiver needs to rebuild the same IV.
pub fn encrypt_aes128_cfb(key: &LocalizedKey, engine_boots: u32, engine_time: u32, salt: u64, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; 8])> {
    if key.0.len() < 16 {
        return Err(Error::UnsupportedAlgorithm);
    }
    let priv_parameters = salt.to_be_bytes();
    let iv = build_iv(&key.0, engine_boots, engine_time, &priv_parameters);
    let mut buf = plaintext.to_vec();
    let cipher = Aes128CfbEnc::new(key.0[..16].into(), (&iv).into());
    cipher.encrypt(&mut buf);
    Ok((buf, priv_parameters))
}

pub fn decrypt_aes128_cfb(key: &LocalizedKey, engine_boots: u32, engine_time: u32, priv_parameters: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if key.0.len() < 16 {
        return Err(Error::UnsupportedAlgorithm);
    }
    let priv_parameters: [u8; 8] = priv_parameters.try_into().map_err(|_| Error::InvalidLength)?;
    let iv = build_iv(&key.0, engine_boots, engine_time, &priv_parameters);
    let mut buf = ciphertext.to_vec();
    let cipher = Aes128CfbDec::new(key.0[..16].into(), (&iv).into());
    cipher.decrypt(&mut buf);
    Ok(buf)
}

fn build_iv(key: &[u8], engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut pre_iv = [0u8; 16];
    pre_iv[0..4].copy_from_slice(&engine_boots.to_be_bytes());
    pre_iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    pre_iv[8..16].copy_from_slice(salt);
    let mut iv = [0u8; 16];
    for i in 0..16 {
        iv[i] = pre_iv[i] ^ key.get(i).copied().unwrap_or(0);
    }
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localizes_md5_key_deterministically() {
        let key = localize_auth_key(AuthProtocol::HmacMd5, b"maplesyrup", b"engine-1").unwrap();
        let key2 = localize_auth_key(AuthProtocol::HmacMd5, b"maplesyrup", b"engine-1").unwrap();
        assert_eq!(key.0, key2.0);
        assert_eq!(key.0.len(), 16);
    }

    #[test]
    fn localizing_same_password_differs_per_engine() {
        let a = localize_auth_key(AuthProtocol::HmacSha1, b"maplesyrup", b"engine-a").unwrap();
        let b = localize_auth_key(AuthProtocol::HmacSha1, b"maplesyrup", b"engine-b").unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let key = localize_auth_key(AuthProtocol::HmacSha1, b"maplesyrup", b"engine-1").unwrap();
        let message = b"a fully encoded snmp message";
        let mac = sign(AuthProtocol::HmacSha1, &key, message).unwrap();
        verify(AuthProtocol::HmacSha1, &key, message, &mac).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = localize_auth_key(AuthProtocol::HmacMd5, b"maplesyrup", b"engine-1").unwrap();
        let mac = sign(AuthProtocol::HmacMd5, &key, b"message one").unwrap();
        assert!(verify(AuthProtocol::HmacMd5, &key, b"message two", &mac).is_err());
    }

    #[test]
    fn aes_round_trips() {
        let key = localize_priv_key(PrivProtocol::Aes128, AuthProtocol::HmacSha1, b"maplesyrup", b"engine-1").unwrap();
        let plaintext = b"scoped pdu bytes go here, padded to a block boundary!!";
        let (ciphertext, salt) = encrypt_aes128_cfb(&key, 3, 100, 0xdead_beef_0000_0001, plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        let recovered = decrypt_aes128_cfb(&key, 3, 100, &salt, &ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn unsupported_algorithms_are_rejected_not_panicking() {
        assert!(matches!(
            localize_auth_key(AuthProtocol::HmacSha256, b"x", b"engine"),
            Err(Error::UnsupportedAlgorithm)
        ));
    }
}
