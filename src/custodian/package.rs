//! Encrypted per-custodian share packages.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{default_role, PackageError};
use crate::crypto::{self, DEFAULT_ITERATIONS};
use crate::mpc::Share;

/// Format version written into every package.
pub const PACKAGE_VERSION: &str = "1.0";

const SALT_LEN: usize = 16;

/// The transportable, encrypted form of one custodian's share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPackage {
    #[serde(rename = "agent")]
    pub agent_id: String,
    /// Cipher token over the JSON of [`AgentData`].
    #[serde(rename = "data", with = "base64_field")]
    pub encrypted_share: Vec<u8>,
    /// Not secret; needed to re-derive the package key.
    #[serde(with = "base64_field")]
    pub salt: Vec<u8>,
    pub version: String,
    /// PBKDF2 rounds used for this package.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// What a custodian recovers by opening their package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentData {
    #[serde(rename = "agent")]
    pub agent_id: String,
    pub share: Share,
    pub k: u8,
    pub n: u8,
    pub role: String,
}

impl AgentPackage {
    pub fn to_json(&self) -> Result<String, PackageError> {
        serde_json::to_string_pretty(self).map_err(|e| PackageError::Malformed {
            agent_id: self.agent_id.clone(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, PackageError> {
        serde_json::from_str(json).map_err(|e| PackageError::Malformed {
            agent_id: String::from("<unknown>"),
            reason: e.to_string(),
        })
    }
}

/// Packs and unpacks custodian shares at a fixed KDF cost.
#[derive(Debug, Clone, Copy)]
pub struct Packager {
    iterations: u32,
}

impl Default for Packager {
    fn default() -> Self {
        Self { iterations: DEFAULT_ITERATIONS }
    }
}

impl Packager {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Packs `share` for `agent_id` with the default role for that name.
    pub fn pack<R: RngCore + CryptoRng + ?Sized>(
        &self,
        agent_id: &str,
        share: &Share,
        password: &str,
        rng: &mut R,
    ) -> Result<AgentPackage, PackageError> {
        self.pack_with_role(agent_id, share, default_role(agent_id), password, rng)
    }

    pub fn pack_with_role<R: RngCore + CryptoRng + ?Sized>(
        &self,
        agent_id: &str,
        share: &Share,
        role: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<AgentPackage, PackageError> {
        if agent_id.trim().is_empty() {
            return Err(PackageError::InvalidInput("empty agent id".into()));
        }
        share.validate()?;

        let mut salt = vec![0u8; SALT_LEN];
        rng.try_fill_bytes(&mut salt)
            .map_err(|_| PackageError::Crypto(crypto::CryptoError::RngFailure))?;

        let key = crypto::derive(password, &salt, self.iterations)
            .map_err(|e| PackageError::from_crypto(e, agent_id))?;

        let data = AgentData {
            agent_id: agent_id.to_string(),
            share: share.clone(),
            k: share.k,
            n: share.n,
            role: role.to_string(),
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&data).map_err(|e| {
            PackageError::Malformed { agent_id: agent_id.to_string(), reason: e.to_string() }
        })?);

        let encrypted_share = crypto::encrypt_with_rng(&plaintext, &key, rng)
            .map_err(|e| PackageError::from_crypto(e, agent_id))?;

        log::debug!("Packed share {} of {} for custodian '{}'", share.index, share.n, agent_id);

        Ok(AgentPackage {
            agent_id: agent_id.to_string(),
            encrypted_share,
            salt,
            version: PACKAGE_VERSION.to_string(),
            iterations: self.iterations,
        })
    }

    /// Opens a package with its custodian's password.
    ///
    /// Uses the iteration count recorded in the package, not `self`'s.
    ///
    /// # Errors
    /// * `Authentication` - wrong password or tampered package.
    /// * `Malformed` - decrypted content is not a consistent `AgentData`.
    /// * `UnsupportedVersion` - unknown package format.
    pub fn unpack(&self, package: &AgentPackage, password: &str) -> Result<AgentData, PackageError> {
        let agent_id = package.agent_id.as_str();
        if package.version != PACKAGE_VERSION {
            return Err(PackageError::UnsupportedVersion(package.version.clone()));
        }

        let key = crypto::derive(password, &package.salt, package.iterations)
            .map_err(|e| PackageError::from_crypto(e, agent_id))?;
        let plaintext = Zeroizing::new(
            crypto::decrypt(&package.encrypted_share, &key)
                .map_err(|e| PackageError::from_crypto(e, agent_id))?,
        );

        let malformed = |reason: String| PackageError::Malformed { agent_id: agent_id.to_string(), reason };
        let data: AgentData = serde_json::from_slice(&plaintext).map_err(|e| malformed(e.to_string()))?;

        if data.agent_id != package.agent_id {
            return Err(malformed(format!("sealed for '{}'", data.agent_id)));
        }
        if data.k != data.share.k || data.n != data.share.n {
            return Err(malformed("threshold does not match share".into()));
        }
        data.share.validate().map_err(|e| malformed(e.to_string()))?;

        Ok(data)
    }
}

mod base64_field {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        URL_SAFE.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::split_secret;
    use rand_core::OsRng;

    const ITER: u32 = 1_000;

    fn shares() -> Vec<Share> {
        split_secret(b"alpha beta gamma", 2, 3, &mut OsRng).unwrap()
    }

    #[test]
    fn test_pack_unpack() {
        let packager = Packager::new(ITER);
        let shares = shares();
        let package = packager.pack("architect", &shares[0], "pw", &mut OsRng).unwrap();

        let data = packager.unpack(&package, "pw").unwrap();
        assert_eq!(data.agent_id, "architect");
        assert_eq!(data.share, shares[0]);
        assert_eq!((data.k, data.n), (2, 3));
        assert_eq!(data.role, default_role("architect"));
    }

    #[test]
    fn test_wrong_password() {
        let packager = Packager::new(ITER);
        let package = packager.pack("infra", &shares()[1], "pw", &mut OsRng).unwrap();
        assert_eq!(
            packager.unpack(&package, "wrong-pw"),
            Err(PackageError::Authentication { agent_id: "infra".into() })
        );
    }

    #[test]
    fn test_salts_are_distinct() {
        let packager = Packager::new(ITER);
        let shares = shares();
        let a = packager.pack("a", &shares[0], "pw", &mut OsRng).unwrap();
        let b = packager.pack("b", &shares[1], "pw", &mut OsRng).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_eq!(a.salt.len(), SALT_LEN);
    }

    #[test]
    fn test_json_transport() {
        let packager = Packager::new(ITER);
        let package = packager.pack("security", &shares()[2], "pw", &mut OsRng).unwrap();
        let json = package.to_json().unwrap();
        assert!(json.contains("\"agent\": \"security\""));
        assert!(json.contains("\"version\": \"1.0\""));

        let restored = AgentPackage::from_json(&json).unwrap();
        assert_eq!(restored, package);
        // a different packager cost does not matter, the package records its own
        assert!(Packager::default().unpack(&restored, "pw").is_ok());
    }

    #[test]
    fn test_missing_iterations_defaults() {
        let json = r#"{"agent":"x","data":"AA==","salt":"AA==","version":"1.0"}"#;
        let package = AgentPackage::from_json(json).unwrap();
        assert_eq!(package.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_relabelled_package_rejected() {
        let packager = Packager::new(ITER);
        let mut package = packager.pack("deploy", &shares()[0], "pw", &mut OsRng).unwrap();
        package.agent_id = "monitor".into();
        assert!(matches!(
            packager.unpack(&package, "pw"),
            Err(PackageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_unknown_version() {
        let packager = Packager::new(ITER);
        let mut package = packager.pack("deploy", &shares()[0], "pw", &mut OsRng).unwrap();
        package.version = "9.9".into();
        assert_eq!(
            packager.unpack(&package, "pw"),
            Err(PackageError::UnsupportedVersion("9.9".into()))
        );
    }

    #[test]
    fn test_tampered_ciphertext() {
        let packager = Packager::new(ITER);
        let mut package = packager.pack("deploy", &shares()[0], "pw", &mut OsRng).unwrap();
        let last = package.encrypted_share.len() - 1;
        package.encrypted_share[last] ^= 0x80;
        assert!(matches!(
            packager.unpack(&package, "pw"),
            Err(PackageError::Authentication { .. })
        ));
    }

    #[test]
    fn test_empty_password_rejected() {
        let packager = Packager::new(ITER);
        assert!(matches!(
            packager.pack("deploy", &shares()[0], "", &mut OsRng),
            Err(PackageError::InvalidInput(_))
        ));
    }
}
