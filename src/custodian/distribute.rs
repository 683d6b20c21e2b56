//! Distribution of the master secret among custodians.

use rand_core::{CryptoRng, RngCore};

use super::{AgentPackage, PackageError, Packager};
use crate::mpc::{split_secret, MasterSecret};

/// One custodian taking part in a distribution.
#[derive(Clone, Copy)]
pub struct Custodian<'a> {
    pub agent_id: &'a str,
    pub password: &'a str,
    /// Overrides [`default_role`] when set.
    pub role: Option<&'a str>,
}

impl<'a> Custodian<'a> {
    pub fn new(agent_id: &'a str, password: &'a str) -> Self {
        Self { agent_id, password, role: None }
    }
}

/// Role description recorded in a package for the well-known agent names.
pub fn default_role(agent_id: &str) -> &'static str {
    match agent_id {
        "architect" => "Chief architect, full access",
        "infra" => "Infrastructure management, server access",
        "security" => "Security, monitoring and audit",
        "deploy" => "Application deployment",
        "monitor" => "Monitoring and alerting",
        _ => "System agent",
    }
}

/// Splits `master` into one share per custodian (n = `custodians.len()`)
/// with threshold `k`, and packs each share under its custodian's password.
///
/// Packages are returned in custodian order; custodian `i` holds share `i + 1`.
pub fn distribute<R: RngCore + CryptoRng + ?Sized>(
    master: &MasterSecret,
    custodians: &[Custodian<'_>],
    k: u8,
    packager: &Packager,
    rng: &mut R,
) -> Result<Vec<AgentPackage>, PackageError> {
    let n = u8::try_from(custodians.len())
        .map_err(|_| PackageError::InvalidInput(format!("too many custodians: {}", custodians.len())))?;

    for (i, custodian) in custodians.iter().enumerate() {
        if custodians[..i].iter().any(|c| c.agent_id == custodian.agent_id) {
            return Err(PackageError::InvalidInput(format!(
                "duplicate custodian '{}'",
                custodian.agent_id
            )));
        }
    }

    let shares = split_secret(master.as_bytes(), k, n, rng)?;

    let packages = custodians
        .iter()
        .zip(shares.iter())
        .map(|(custodian, share)| {
            let role = custodian.role.unwrap_or_else(|| default_role(custodian.agent_id));
            packager.pack_with_role(custodian.agent_id, share, role, custodian.password, &mut *rng)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Master secret split {}-of-{} and packed for {} custodians", k, n, packages.len());
    Ok(packages)
}
