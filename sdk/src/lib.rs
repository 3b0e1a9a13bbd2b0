//! # snmp-engine SDK
//!
//! Convenience helpers built on top of [`dispatch`] and [`codec`]:
//! constructing `UsmUser`s from plaintext passwords the way an operator
//! types them in, and persisting the local engine's identity and boot
//! counter across restarts (RFC 3414 §2.2.2).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use codec::mp::v3::UsmUser;
use codec::security::{AuthProtocol, PrivProtocol};

/// Builds a `UsmUser` from an operator-supplied auth/priv password pair,
/// the RFC 3414 analogue of the teacher SDK's `generate_password`: a
/// human enters a password, the engine localizes it to a key on first
/// use against each authoritative engine ID it talks to.
pub struct UsmUserBuilder {
    user_name: Vec<u8>,
    auth_protocol: AuthProtocol,
    auth_password: Vec<u8>,
    priv_protocol: PrivProtocol,
    priv_password: Vec<u8>,
}

impl UsmUserBuilder {
    pub fn new(user_name: impl Into<Vec<u8>>) -> Self {
        Self {
            user_name: user_name.into(),
            auth_protocol: AuthProtocol::None,
            auth_password: Vec::new(),
            priv_protocol: PrivProtocol::None,
            priv_password: Vec::new(),
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth_protocol = protocol;
        self.auth_password = password.into();
        self
    }

    pub fn priv_(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.priv_protocol = protocol;
        self.priv_password = password.into();
        self
    }

    pub fn build(self) -> UsmUser {
        UsmUser {
            user_name: self.user_name,
            auth_protocol: self.auth_protocol,
            auth_password: self.auth_password,
            priv_protocol: self.priv_protocol,
            priv_password: self.priv_password,
        }
    }
}

/// Supplies the local SNMP engine's identity: its engine ID and its
/// boot counter, which must be persisted and monotonically increased
/// across restarts (RFC 3414 §2.2.2) so a peer's time-window check never
/// sees a boot count it has already observed.
pub trait EngineIdProvider: Send + Sync {
    fn local_engine_id(&self) -> Vec<u8>;
    fn engine_boots(&self) -> u32;
}

/// A fixed engine ID paired with a boot counter persisted as two
/// newline-separated lines in a plain file, incremented once at load
/// time. Good enough for a single-process agent; a clustered deployment
/// needs its own shared counter.
pub struct FileEngineIdProvider {
    engine_id: Vec<u8>,
    engine_boots: u32,
}

impl FileEngineIdProvider {
    /// Loads `(engine_id_hex, boots)` from `path`, creating the file with
    /// `default_engine_id` and `boots = 0` if it doesn't exist yet, then
    /// rewrites it with `boots + 1`.
    pub fn load_or_create(path: impl AsRef<Path>, default_engine_id: &[u8]) -> io::Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let (engine_id, boots) = match fs::read_to_string(&path) {
            Ok(contents) => parse(&contents).unwrap_or_else(|| (default_engine_id.to_vec(), 0)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => (default_engine_id.to_vec(), 0),
            Err(err) => return Err(err),
        };

        let next_boots = boots.saturating_add(1);
        fs::write(&path, render(&engine_id, next_boots))?;

        Ok(Self {
            engine_id,
            engine_boots: next_boots,
        })
    }
}

impl EngineIdProvider for FileEngineIdProvider {
    fn local_engine_id(&self) -> Vec<u8> {
        self.engine_id.clone()
    }

    fn engine_boots(&self) -> u32 {
        self.engine_boots
    }
}

fn parse(contents: &str) -> Option<(Vec<u8>, u32)> {
    let mut lines = contents.lines();
    let engine_id_hex = lines.next()?;
    let boots = lines.next()?.trim().parse().ok()?;
    let engine_id = hex_decode(engine_id_hex)?;
    Some((engine_id, boots))
}

fn render(engine_id: &[u8], boots: u32) -> String {
    format!("{}\n{}\n", hex_encode(engine_id), boots)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_usm_user_with_auth_and_priv() {
        let user = UsmUserBuilder::new(b"admin".to_vec())
            .auth(AuthProtocol::HmacSha1, b"maplesyrup".to_vec())
            .priv_(PrivProtocol::Aes128, b"maplesyrup".to_vec())
            .build();
        assert_eq!(user.user_name, b"admin");
        assert_eq!(user.auth_protocol, AuthProtocol::HmacSha1);
    }

    #[test]
    fn engine_id_provider_round_trips_hex() {
        assert_eq!(hex_decode(&hex_encode(&[1, 2, 255, 0])).unwrap(), vec![1, 2, 255, 0]);
    }

    #[test]
    fn file_engine_id_provider_persists_and_increments_boots() {
        let dir = std::env::temp_dir().join(format!("snmp-engine-sdk-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.state");
        let _ = std::fs::remove_file(&path);

        let first = FileEngineIdProvider::load_or_create(&path, b"default-engine").unwrap();
        assert_eq!(first.engine_boots(), 1);

        let second = FileEngineIdProvider::load_or_create(&path, b"default-engine").unwrap();
        assert_eq!(second.engine_boots(), 2);
        assert_eq!(second.local_engine_id(), first.local_engine_id());

        std::fs::remove_file(&path).unwrap();
    }
}
