//! The parts of a KASP-style key and signing policy that `ksr` needs:
//! the ordered list of key slots and the timing knobs that derive
//! `prepub`/`retire`/`inactive`/`delete` offsets.

pub mod file;

use std::fmt;

use camino::Utf8PathBuf;

use crate::zone::ZoneName;

//----------- KeyRole --------------------------------------------------------

/// The role a [`PolicyKeyEntry`] or a generated key plays in a zone.
///
/// This replaces the pair of `is_ksk`/`is_zsk` booleans the original tool
/// threads through its key-generation routines with one tagged value; a
/// [`crate::keys::KeyRecord`] still stores the pair, since that is the
/// shape the on-disk state format and the matching predicate need, but
/// everywhere else a single `KeyRole` is clearer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRole {
    Ksk,
    Zsk,
    Csk,
}

impl KeyRole {
    pub fn is_ksk(self) -> bool {
        matches!(self, Self::Ksk | Self::Csk)
    }

    pub fn is_zsk(self) -> bool {
        matches!(self, Self::Zsk | Self::Csk)
    }

    pub fn from_flags(is_ksk: bool, is_zsk: bool) -> Option<Self> {
        match (is_ksk, is_zsk) {
            (true, false) => Some(Self::Ksk),
            (false, true) => Some(Self::Zsk),
            (true, true) => Some(Self::Csk),
            (false, false) => None,
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ksk => "ksk",
            Self::Zsk => "zsk",
            Self::Csk => "csk",
        })
    }
}

//----------- Algorithm ------------------------------------------------------

/// A DNSSEC signing algorithm, mirroring the `DST_ALG_*` constants the
/// original tool validates against.
///
/// Anything this tool doesn't recognize is kept as `Unsupported` rather
/// than rejected at parse time, matching `dst_algorithm_supported`, which
/// is a runtime check rather than part of the key-spec grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    RsaSha1,
    RsaSha256,
    RsaSha512,
    EcdsaP256Sha256,
    EcdsaP384Sha384,
    Ed25519,
    Ed448,
    Unsupported(u8),
}

impl Algorithm {
    /// The IANA DNSSEC algorithm number, used both in the on-disk file
    /// stem and in the DNSKEY presentation format.
    pub fn iana_number(self) -> u8 {
        match self {
            Self::RsaSha1 => 5,
            Self::RsaSha256 => 8,
            Self::RsaSha512 => 10,
            Self::EcdsaP256Sha256 => 13,
            Self::EcdsaP384Sha384 => 14,
            Self::Ed25519 => 15,
            Self::Ed448 => 16,
            Self::Unsupported(n) => n,
        }
    }

    pub fn from_iana_number(n: u8) -> Self {
        match n {
            5 => Self::RsaSha1,
            8 => Self::RsaSha256,
            10 => Self::RsaSha512,
            13 => Self::EcdsaP256Sha256,
            14 => Self::EcdsaP384Sha384,
            15 => Self::Ed25519,
            16 => Self::Ed448,
            other => Self::Unsupported(other),
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(self, Self::RsaSha1 | Self::RsaSha256 | Self::RsaSha512)
    }

    /// Elliptic-curve and Edwards-curve algorithms have a size fixed by
    /// the curve, which overrides whatever size a policy names.
    pub fn fixed_size_bits(self) -> Option<u32> {
        match self {
            Self::EcdsaP256Sha256 | Self::Ed25519 => Some(256),
            Self::EcdsaP384Sha384 => Some(384),
            Self::Ed448 => Some(456),
            Self::RsaSha1 | Self::RsaSha256 | Self::RsaSha512 | Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RsaSha1 => "RSASHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
            Self::Unsupported(n) => return write!(f, "{n}"),
        })
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "RSASHA1" => Self::RsaSha1,
            "RSASHA256" => Self::RsaSha256,
            "RSASHA512" => Self::RsaSha512,
            "ECDSAP256SHA256" => Self::EcdsaP256Sha256,
            "ECDSAP384SHA384" => Self::EcdsaP384Sha384,
            "ED25519" => Self::Ed25519,
            "ED448" => Self::Ed448,
            other => {
                if let Ok(n) = other.parse::<u8>() {
                    Self::Unsupported(n)
                } else {
                    return Err(format!("unrecognized algorithm mnemonic '{s}'"));
                }
            }
        })
    }
}

//----------- PolicyKeyEntry -------------------------------------------------

/// One key slot in a policy's ordered key list.
#[derive(Clone, Debug)]
pub struct PolicyKeyEntry {
    pub role: KeyRole,
    pub algorithm: Algorithm,
    /// `0` means "use the algorithm's default size"; fixed-size algorithms
    /// ignore this value entirely.
    pub key_size_bits: u32,
    /// `0` means unlimited lifetime: exactly one key is ever generated.
    pub lifetime_seconds: u32,
    pub keystore_handle: Option<String>,
}

//----------- Timing ----------------------------------------------------------

/// The zone-wide timing knobs a policy supplies, from which `prepub` and
/// `retire` offsets are derived.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub propagation: u32,
    pub publish_safety: u32,
    pub retire_safety: u32,
    pub sign_delay: u32,
    pub dnskey_ttl: u32,
    pub max_zone_ttl: u32,
}

impl Timing {
    /// `prepub = ttl + publish_safety + propagation`.
    pub fn prepub(&self) -> u32 {
        self.dnskey_ttl
            .saturating_add(self.publish_safety)
            .saturating_add(self.propagation)
    }

    /// `retire = ttlsig + propagation + retire_safety + sign_delay`.
    pub fn retire(&self) -> u32 {
        self.max_zone_ttl
            .saturating_add(self.propagation)
            .saturating_add(self.retire_safety)
            .saturating_add(self.sign_delay)
    }
}

//----------- Policy -----------------------------------------------------------

/// A fully resolved policy: the named policy's key list and timing,
/// combined with the zone, class and key directory the command line and
/// caller supply.
///
/// Immutable once built; `keygen` and `request` only ever read it.
#[derive(Clone, Debug)]
pub struct Policy {
    pub name: String,
    pub zone: ZoneName,
    pub class: String,
    pub key_dir: Utf8PathBuf,
    keys: Vec<PolicyKeyEntry>,
    timing: Timing,
}

impl Policy {
    pub fn keys(&self) -> &[PolicyKeyEntry] {
        &self.keys
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub(crate) fn new(
        name: String,
        zone: ZoneName,
        class: String,
        key_dir: Utf8PathBuf,
        keys: Vec<PolicyKeyEntry>,
        timing: Timing,
    ) -> Self {
        Self {
            name,
            zone,
            class,
            key_dir,
            keys,
            timing,
        }
    }
}
