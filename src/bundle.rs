//! The `request` bundle emitter: walks from `start` to `end`, writing one
//! time-stamped DNSKEY bundle at every point the published key set changes
//! (the `publish`/`delete` timestamps, not `activate`/`inactive` — a
//! prepublished key appears in a bundle before it becomes active).

use std::io::Write;

use crate::error::Fatal;
use crate::keys::inventory::Inventory;
use crate::policy::Policy;
use crate::time::Instant;

pub fn run_request(
    policy: &Policy,
    inventory: &Inventory,
    start: Instant,
    end: Instant,
    out: &mut dyn Write,
) -> Result<(), Fatal> {
    let mut inception = start;
    loop {
        if inception.as_secs() > end.as_secs() {
            break;
        }

        writeln!(
            out,
            ";; KSR {} - bundle {} ({})",
            policy.zone,
            inception,
            inception.ctime_string()
        )?;

        let mut next = end.checked_add(1).unwrap_or(Instant::new(u32::MAX));

        for entry in policy.keys() {
            for record in inventory.matching(entry) {
                if let Some(publish) = record.publish {
                    if publish > inception && publish < next {
                        next = publish;
                    }
                }
                if let Some(delete) = record.delete {
                    if delete > inception && delete < next {
                        next = delete;
                    }
                }
            }

            let mut published = inventory
                .matching(entry)
                .filter(|r| r.published_at(inception))
                .peekable();

            if published.peek().is_none() {
                return Err(Fatal::Invariant(format!(
                    "no {} {} key pair found for bundle {inception}",
                    policy.zone, entry.algorithm
                )));
            }

            for record in published {
                writeln!(
                    out,
                    "{}",
                    record
                        .material
                        .to_dnskey_text(&policy.zone, policy.timing().dnskey_ttl, &policy.class)
                )?;
            }
        }

        out.flush()?;

        if next <= inception {
            break;
        }
        inception = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::backend::LocalKeyBackend;
    use crate::keys::generator::generate_or_reuse;
    use crate::policy::{Algorithm, KeyRole, PolicyKeyEntry, Timing};
    use crate::schedule::run_keygen;
    use crate::zone::ZoneName;
    use camino::Utf8PathBuf;

    fn test_policy(key_dir: Utf8PathBuf) -> Policy {
        Policy::new(
            "test".to_string(),
            ZoneName::parse("example.com").unwrap(),
            "IN".to_string(),
            key_dir,
            vec![
                PolicyKeyEntry {
                    role: KeyRole::Ksk,
                    algorithm: Algorithm::Ed25519,
                    key_size_bits: 0,
                    lifetime_seconds: 0,
                    keystore_handle: None,
                },
                PolicyKeyEntry {
                    role: KeyRole::Zsk,
                    algorithm: Algorithm::Ed25519,
                    key_size_bits: 0,
                    lifetime_seconds: 0,
                    keystore_handle: None,
                },
            ],
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
    fn single_bundle_for_unlimited_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let policy = test_policy(key_dir);
        let mut inventory = Inventory::empty();
        let backend = LocalKeyBackend;
        let now = Instant::new(1_700_000_000);

        // Seed a ZSK through the planner; the KSK is generated directly
        // since keygen skips KSK-only entries.
        run_keygen(
            &policy,
            &mut inventory,
            &backend,
            None,
            now,
            now,
            now.checked_add(86400).unwrap(),
            false,
            &mut Vec::new(),
        )
        .unwrap();

        generate_or_reuse(
            &policy,
            &policy.keys()[0],
            &mut inventory,
            &backend,
            None,
            now,
            now,
            now,
            false,
        )
        .unwrap();

        let mut out = Vec::new();
        run_request(&policy, &inventory, now, now, &mut out).unwrap();
        let text = std::str::from_utf8(&out).unwrap();

        assert_eq!(text.matches(";; KSR").count(), 1);
        assert_eq!(text.matches("DNSKEY").count(), 2);
    }

    #[test]
    fn missing_key_is_invariant_error() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let policy = test_policy(key_dir);
        let inventory = Inventory::empty();
        let now = Instant::new(1_700_000_000);

        let mut out = Vec::new();
        let err = run_request(&policy, &inventory, now, now, &mut out).unwrap_err();
        assert!(matches!(err, Fatal::Invariant(_)));
    }
}
