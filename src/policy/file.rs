//! The on-disk TOML policy-file format.
//!
//! A file holds one or more named policies, each a `keys` array (read in
//! file order — order is part of the key-planner's determinism contract)
//! and a `timing` table of the five durations `ksr` derives `prepub` and
//! `retire` from.
//!
//! ```toml
//! [example]
//! keys = [
//!     { role = "ksk", algorithm = "ECDSAP256SHA256" },
//!     { role = "zsk", algorithm = "ECDSAP256SHA256", lifetime = "90d" },
//! ]
//!
//! [example.timing]
//! propagation = "1h"
//! publish_safety = "1h"
//! retire_safety = "1h"
//! sign_delay = "1d"
//! dnskey_ttl = "1h"
//! max_zone_ttl = "1d"
//! ```

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::Fatal;
use crate::policy::{Algorithm, KeyRole, Policy, PolicyKeyEntry, Timing};
use crate::time::TimeSpan;
use crate::zone::ZoneName;

#[derive(Deserialize)]
struct PolicySpec {
    keys: Vec<KeySpec>,
    timing: TimingSpec,
}

#[derive(Deserialize)]
struct KeySpec {
    role: String,
    algorithm: String,
    #[serde(default)]
    size: u32,
    #[serde(default)]
    lifetime: Option<TimeSpan>,
    #[serde(default)]
    keystore: Option<String>,
}

#[derive(Deserialize)]
struct TimingSpec {
    propagation: TimeSpan,
    publish_safety: TimeSpan,
    retire_safety: TimeSpan,
    sign_delay: TimeSpan,
    dnskey_ttl: TimeSpan,
    max_zone_ttl: TimeSpan,
}

/// Loads a named policy from a TOML file, combining it with the zone and
/// key directory the command line supplies.
///
/// Every way this can fail — an unreadable file, a parse error, a missing
/// policy name, or an empty key list — is a [`Fatal::Configuration`], and
/// all are caught before anything is read from or written to the key
/// directory.
pub fn load(
    path: &Utf8Path,
    policy_name: &str,
    zone: ZoneName,
    key_dir: Utf8PathBuf,
) -> Result<Policy, Fatal> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Fatal::Configuration(format!("unable to read '{path}': {e}")))?;

    let document: HashMap<String, PolicySpec> = toml::from_str(&text)
        .map_err(|e| Fatal::Configuration(format!("unable to parse '{path}': {e}")))?;

    let spec = document.get(policy_name).ok_or_else(|| {
        Fatal::Configuration(format!(
            "'{path}' does not define a dnssec-policy named '{policy_name}'"
        ))
    })?;

    if spec.keys.is_empty() {
        return Err(Fatal::Configuration(format!(
            "dnssec-policy '{policy_name}' has no keys configured"
        )));
    }

    let keys = spec
        .keys
        .iter()
        .map(|k| k.resolve(policy_name))
        .collect::<Result<Vec<_>, _>>()?;

    let timing = spec.timing.resolve()?;

    Ok(Policy::new(
        policy_name.to_string(),
        zone,
        "IN".to_string(),
        key_dir,
        keys,
        timing,
    ))
}

impl KeySpec {
    fn resolve(&self, policy_name: &str) -> Result<PolicyKeyEntry, Fatal> {
        let role = match self.role.to_ascii_lowercase().as_str() {
            "ksk" => KeyRole::Ksk,
            "zsk" => KeyRole::Zsk,
            "csk" => KeyRole::Csk,
            other => {
                return Err(Fatal::Configuration(format!(
                    "dnssec-policy '{policy_name}': unrecognized key role '{other}'"
                )))
            }
        };
        let algorithm: Algorithm = self.algorithm.parse().map_err(|e| {
            Fatal::Configuration(format!("dnssec-policy '{policy_name}': {e}"))
        })?;
        let lifetime_seconds = match &self.lifetime {
            Some(span) => span.as_secs_u32()?,
            None => 0,
        };
        Ok(PolicyKeyEntry {
            role,
            algorithm,
            key_size_bits: self.size,
            lifetime_seconds,
            keystore_handle: self.keystore.clone(),
        })
    }
}

impl TimingSpec {
    fn resolve(&self) -> Result<Timing, Fatal> {
        Ok(Timing {
            propagation: self.propagation.as_secs_u32()?,
            publish_safety: self.publish_safety.as_secs_u32()?,
            retire_safety: self.retire_safety.as_secs_u32()?,
            sign_delay: self.sign_delay.as_secs_u32()?,
            dnskey_ttl: self.dnskey_ttl.as_secs_u32()?,
            max_zone_ttl: self.max_zone_ttl.as_secs_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        [example]
        keys = [
            { role = "ksk", algorithm = "ECDSAP256SHA256" },
            { role = "zsk", algorithm = "ECDSAP256SHA256", lifetime = "90d" },
        ]

        [example.timing]
        propagation = "1h"
        publish_safety = "1h"
        retire_safety = "1h"
        sign_delay = "1d"
        dnskey_ttl = "1h"
        max_zone_ttl = "1d"
    "#;

    fn write_doc(dir: &tempfile::TempDir, text: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("policy.toml")).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn loads_named_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(&dir, DOC);
        let zone = ZoneName::parse("example.com").unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().join("keys")).unwrap();

        let policy = load(&path, "example", zone, key_dir).unwrap();
        assert_eq!(policy.keys().len(), 2);
        assert_eq!(policy.timing().propagation, 3600);
        assert_eq!(policy.keys()[1].lifetime_seconds, 90 * 24 * 3600);
    }

    #[test]
    fn missing_policy_name_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(&dir, DOC);
        let zone = ZoneName::parse("example.com").unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().join("keys")).unwrap();

        let err = load(&path, "nonexistent", zone, key_dir).unwrap_err();
        assert!(matches!(err, Fatal::Configuration(_)));
    }

    #[test]
    fn empty_key_list_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            &dir,
            r#"
                [empty]
                keys = []
                [empty.timing]
                propagation = "1h"
                publish_safety = "1h"
                retire_safety = "1h"
                sign_delay = "1d"
                dnskey_ttl = "1h"
                max_zone_ttl = "1d"
            "#,
        );
        let zone = ZoneName::parse("example.com").unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().join("keys")).unwrap();

        let err = load(&path, "empty", zone, key_dir).unwrap_err();
        assert!(matches!(err, Fatal::Configuration(_)));
    }
}
