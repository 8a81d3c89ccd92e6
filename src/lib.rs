//! `ksr` — the policy-driven key scheduler behind a DNSSEC Key Signing
//! Request (KSR) workflow.
//!
//! Given a key and signing policy (KASP) and a time window, this crate
//! pre-generates the Zone Signing Keys (ZSKs) the window needs
//! ([`schedule`]) and projects the DNSKEY bundle timeline a Key Signing
//! Key holder signs offline ([`bundle`]). Everything outside that —
//! policy-file parsing aside from the shape [`policy`] needs, the
//! keystore's on-disk byte formats, the wire-format encoder, and the
//! cryptographic primitive itself — is kept behind narrow interfaces
//! ([`keys::backend`]) so a real HSM or KMIP backend can be substituted
//! without touching the scheduler.

pub mod args;
pub mod bundle;
pub mod error;
pub mod keys;
pub mod lock;
pub mod log;
pub mod policy;
pub mod schedule;
pub mod time;
pub mod zone;
