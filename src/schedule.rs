//! The `keygen` schedule planner: walks each ZSK-only policy entry from
//! `start` to `end`, reusing or generating a key at every lifetime
//! boundary, and writes the stem of each key touched to `out`.

use std::io::Write;

use crate::error::Fatal;
use crate::keys::backend::{KeyBackend, ProgressListener};
use crate::keys::generator::generate_or_reuse;
use crate::keys::inventory::Inventory;
use crate::policy::{KeyRole, Policy};
use crate::time::Instant;

#[allow(clippy::too_many_arguments)]
pub fn run_keygen(
    policy: &Policy,
    inventory: &mut Inventory,
    backend: &dyn KeyBackend,
    progress: Option<&dyn ProgressListener>,
    now: Instant,
    start: Instant,
    end: Instant,
    fips: bool,
    out: &mut dyn Write,
) -> Result<(), Fatal> {
    let mut any_zsk = false;

    for entry in policy.keys() {
        if entry.role != KeyRole::Zsk {
            continue;
        }
        any_zsk = true;

        let mut active = start;
        let mut k: u64 = 0;
        loop {
            let offset = entry
                .lifetime_seconds
                .checked_mul(u32::try_from(k).unwrap_or(u32::MAX))
                .ok_or_else(|| Fatal::Invariant("schedule offset overflows".into()))?;
            let inception = start
                .checked_add(offset)
                .ok_or_else(|| Fatal::Invariant("schedule inception overflows".into()))?;

            if entry.lifetime_seconds != 0 && inception.as_secs() >= end.as_secs() {
                break;
            }

            let (stem, next_active) = generate_or_reuse(
                policy, entry, inventory, backend, progress, now, inception, active, fips,
            )?;

            writeln!(out, "{stem}")?;
            out.flush()?;

            active = next_active;

            if entry.lifetime_seconds == 0 {
                break;
            }
            k += 1;
        }
    }

    if !any_zsk {
        return Err(Fatal::Configuration(format!(
            "dnssec-policy '{}' has no zsks",
            policy.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::backend::LocalKeyBackend;
    use crate::policy::{Algorithm, PolicyKeyEntry, Timing};
    use crate::zone::ZoneName;
    use camino::Utf8PathBuf;

    fn test_policy(key_dir: Utf8PathBuf, lifetime_seconds: u32) -> Policy {
        Policy::new(
            "test".to_string(),
            ZoneName::parse("example.com").unwrap(),
            "IN".to_string(),
            key_dir,
            vec![PolicyKeyEntry {
                role: KeyRole::Zsk,
                algorithm: Algorithm::Ed25519,
                key_size_bits: 0,
                lifetime_seconds,
                keystore_handle: None,
            }],
            Timing {
                propagation: 3600,
                publish_safety: 3600,
                retire_safety: 3600,
                sign_delay: 86400,
                dnskey_ttl: 3600,
                max_zone_ttl: 86400,
            },
        )
    }

    #[test]
    fn zero_lifetime_generates_exactly_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let policy = test_policy(key_dir, 0);
        let mut inventory = Inventory::empty();
        let backend = LocalKeyBackend;
        let now = Instant::new(1_700_000_000);
        let start = now;
        let end = now.checked_add(365 * 86400).unwrap();

        let mut out = Vec::new();
        run_keygen(
            &policy,
            &mut inventory,
            &backend,
            None,
            now,
            start,
            end,
            false,
            &mut out,
        )
        .unwrap();

        assert_eq!(inventory.records().len(), 1);
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn positive_lifetime_produces_consecutive_generations() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let lifetime = 30 * 86400;
        let policy = test_policy(key_dir, lifetime);
        let mut inventory = Inventory::empty();
        let backend = LocalKeyBackend;
        let now = Instant::new(1_700_000_000);
        let start = now;
        let end = now.checked_add(95 * 86400).unwrap();

        let mut out = Vec::new();
        run_keygen(
            &policy,
            &mut inventory,
            &backend,
            None,
            now,
            start,
            end,
            false,
            &mut out,
        )
        .unwrap();

        // Four 30-day generations fit in a 95-day window: 0, 30, 60, 90.
        assert_eq!(inventory.records().len(), 4);
    }

    #[test]
    fn policy_without_zsks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let policy = test_policy(key_dir, 0);
        let policy = Policy::new(
            policy.name.clone(),
            policy.zone.clone(),
            policy.class.clone(),
            policy.key_dir.clone(),
            vec![PolicyKeyEntry {
                role: KeyRole::Csk,
                algorithm: Algorithm::Ed25519,
                key_size_bits: 0,
                lifetime_seconds: 0,
                keystore_handle: None,
            }],
            policy.timing(),
        );
        let mut inventory = Inventory::empty();
        let backend = LocalKeyBackend;
        let now = Instant::new(1_700_000_000);
        let mut out = Vec::new();

        let err = run_keygen(
            &policy,
            &mut inventory,
            &backend,
            None,
            now,
            now,
            now.checked_add(86400).unwrap(),
            false,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, Fatal::Configuration(_)));
    }
}
