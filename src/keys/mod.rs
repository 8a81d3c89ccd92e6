//! Key material, key tags, and the three-file-per-key on-disk layout.

pub mod backend;
pub mod generator;
pub mod inventory;

use std::fmt;

use base64::Engine;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::Fatal;
use crate::policy::{Algorithm, KeyRole, PolicyKeyEntry};
use crate::time::Instant;
use crate::zone::ZoneName;

/// The zone-key bit, RFC 4034 §2.1.1 bit 7 of the flags octet pair.
pub const FLAG_ZONE_KEY: u16 = 0x0100;
/// The Secure Entry Point bit, RFC 4034 §2.1.1 bit 15.
pub const FLAG_SEP: u16 = 0x0001;
/// The REVOKE bit, RFC 5011 §3, bit 8.
pub const FLAG_REVOKE: u16 = 0x0080;

//----------- KeyTag -----------------------------------------------------------

/// The RFC 2535 Appendix C key tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyTag(pub u16);

impl fmt::Display for KeyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

/// The RFC 2535 Appendix C checksum, computed over the DNSKEY RDATA: the
/// flags word, the protocol octet (always 3), the algorithm octet, and
/// the raw public key.
pub fn compute_key_tag(flags: u16, algorithm: u8, public_key: &[u8]) -> KeyTag {
    let mut rdata = Vec::with_capacity(4 + public_key.len());
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(3);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);

    let mut ac: u32 = 0;
    for (i, byte) in rdata.iter().enumerate() {
        if i & 1 != 0 {
            ac += u32::from(*byte);
        } else {
            ac += u32::from(*byte) << 8;
        }
    }
    ac += (ac >> 16) & 0xffff;
    KeyTag((ac & 0xffff) as u16)
}

//----------- KeyMaterial -------------------------------------------------------

/// An algorithm, a flags word, and the raw key bytes: everything needed
/// to compute a key tag and a presentation-format DNSKEY line without
/// the wire-format encoder this crate deliberately does not depend on.
#[derive(Clone, Debug)]
pub struct KeyMaterial {
    pub algorithm: Algorithm,
    pub flags: u16,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        for byte in self.private_key.iter_mut() {
            *byte = 0;
        }
    }
}

impl KeyMaterial {
    pub fn tag(&self) -> KeyTag {
        compute_key_tag(self.flags, self.algorithm.iana_number(), &self.public_key)
    }

    /// The key tag the same key would have if its REVOKE bit were set;
    /// used to reject a freshly generated key whose revoked form would
    /// collide with an existing one.
    pub fn revoked_tag(&self) -> KeyTag {
        compute_key_tag(
            self.flags | FLAG_REVOKE,
            self.algorithm.iana_number(),
            &self.public_key,
        )
    }

    pub fn to_dnskey_text(&self, owner: impl fmt::Display, ttl: u32, class: &str) -> String {
        format!(
            "{owner} {ttl} {class} DNSKEY {flags} 3 {alg} {key}",
            owner = owner,
            ttl = ttl,
            class = class,
            flags = self.flags,
            alg = self.algorithm.iana_number(),
            key = base64::engine::general_purpose::STANDARD.encode(&self.public_key),
        )
    }
}

//----------- KeyRecord ---------------------------------------------------------

/// A key found in the inventory, or one just generated and persisted.
#[derive(Clone, Debug)]
pub struct KeyRecord {
    pub stem: String,
    pub is_ksk: bool,
    pub is_zsk: bool,
    pub algorithm: Algorithm,
    pub key_size_bits: u32,
    pub lifetime_seconds: u32,
    pub material: KeyMaterial,
    pub created: Option<Instant>,
    pub publish: Option<Instant>,
    pub activate: Option<Instant>,
    pub inactive: Option<Instant>,
    pub delete: Option<Instant>,
    pub ttl: u32,
}

impl KeyRecord {
    pub fn tag(&self) -> KeyTag {
        self.material.tag()
    }

    pub fn role(&self) -> Option<KeyRole> {
        KeyRole::from_flags(self.is_ksk, self.is_zsk)
    }

    /// True when this record's algorithm and role exactly match a policy
    /// entry's. A CSK only matches a CSK entry, not a KSK or ZSK one.
    pub fn matches(&self, entry: &PolicyKeyEntry) -> bool {
        if self.algorithm != entry.algorithm {
            return false;
        }
        match entry.role {
            KeyRole::Ksk => self.is_ksk && !self.is_zsk,
            KeyRole::Zsk => self.is_zsk && !self.is_ksk,
            KeyRole::Csk => self.is_ksk && self.is_zsk,
        }
    }

    /// True when the key is active at `t`: its activate time has passed
    /// and, if it has an inactive time at all, `t` precedes it.
    pub fn eligible_at(&self, t: Instant) -> bool {
        match self.activate {
            Some(activate) if activate <= t => match self.inactive {
                Some(inactive) => t < inactive,
                None => true,
            },
            _ => false,
        }
    }

    /// True when the key is published at `t`: its publish time has passed
    /// and, if it has a delete time at all, `t` precedes it. Wider than
    /// [`KeyRecord::eligible_at`] — a prepublished key is published, and so
    /// belongs in a DNSKEY bundle, before it becomes active.
    pub fn published_at(&self, t: Instant) -> bool {
        match self.publish {
            Some(publish) if publish <= t => match self.delete {
                Some(delete) => t < delete,
                None => true,
            },
            _ => false,
        }
    }
}

//----------- stem & persistence -------------------------------------------------

/// The canonical file stem, `K<zone>+<alg3>+<keytag5>`.
pub fn stem_for(zone: &ZoneName, algorithm: Algorithm, tag: KeyTag) -> String {
    format!(
        "K{zone}+{alg:03}+{tag}",
        zone = zone,
        alg = algorithm.iana_number(),
        tag = tag
    )
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    is_ksk: bool,
    is_zsk: bool,
    algorithm: u8,
    key_size_bits: u32,
    lifetime_seconds: u32,
    created: Option<u32>,
    publish: Option<u32>,
    activate: Option<u32>,
    inactive: Option<u32>,
    delete: Option<u32>,
    ttl: u32,
}

#[derive(Serialize, Deserialize)]
struct PrivateFile {
    algorithm: u8,
    flags: u16,
    private_key_base64: String,
}

/// Atomically writes the three files a [`KeyRecord`] is made of: `.private`
/// (opaque, our own stand-in format for the external keystore's), `.key`
/// (the public DNSKEY RR, in presentation format) and `.state` (timing
/// metadata and role flags).
pub fn persist(key_dir: &Utf8Path, record: &KeyRecord) -> Result<(), Fatal> {
    std::fs::create_dir_all(key_dir)?;

    let private = PrivateFile {
        algorithm: record.algorithm.iana_number(),
        flags: record.material.flags,
        private_key_base64: base64::engine::general_purpose::STANDARD
            .encode(&record.material.private_key),
    };
    write_atomic(
        key_dir,
        &format!("{}.private", record.stem),
        toml::to_string_pretty(&private)
            .map_err(|e| Fatal::Io(format!("unable to encode '{}.private': {e}", record.stem)))?
            .as_bytes(),
    )?;

    let key_line = record
        .material
        .to_dnskey_text(&zone_of(&record.stem), record.ttl, "IN");
    write_atomic(
        key_dir,
        &format!("{}.key", record.stem),
        format!("{key_line}\n").as_bytes(),
    )?;

    let state = StateFile {
        is_ksk: record.is_ksk,
        is_zsk: record.is_zsk,
        algorithm: record.algorithm.iana_number(),
        key_size_bits: record.key_size_bits,
        lifetime_seconds: record.lifetime_seconds,
        created: record.created.map(Instant::as_secs),
        publish: record.publish.map(Instant::as_secs),
        activate: record.activate.map(Instant::as_secs),
        inactive: record.inactive.map(Instant::as_secs),
        delete: record.delete.map(Instant::as_secs),
        ttl: record.ttl,
    };
    write_atomic(
        key_dir,
        &format!("{}.state", record.stem),
        toml::to_string_pretty(&state)
            .map_err(|e| Fatal::Io(format!("unable to encode '{}.state': {e}", record.stem)))?
            .as_bytes(),
    )?;

    Ok(())
}

/// Reconstructs a [`KeyRecord`] from the three files named by `stem` in
/// `key_dir`.
pub fn load(key_dir: &Utf8Path, stem: &str) -> Result<KeyRecord, Fatal> {
    let state_text = std::fs::read_to_string(key_dir.join(format!("{stem}.state")))?;
    let state: StateFile = toml::from_str(&state_text)
        .map_err(|e| Fatal::Io(format!("unable to parse '{stem}.state': {e}")))?;

    let private_text = std::fs::read_to_string(key_dir.join(format!("{stem}.private")))?;
    let private: PrivateFile = toml::from_str(&private_text)
        .map_err(|e| Fatal::Io(format!("unable to parse '{stem}.private': {e}")))?;

    let key_text = std::fs::read_to_string(key_dir.join(format!("{stem}.key")))?;
    let (flags, algorithm_num, public_key) = parse_dnskey_line(key_text.trim())
        .map_err(|e| Fatal::Io(format!("unable to parse '{stem}.key': {e}")))?;
    let _ = algorithm_num;

    let private_key = base64::engine::general_purpose::STANDARD
        .decode(private.private_key_base64.as_bytes())
        .map_err(|e| Fatal::Io(format!("unable to decode '{stem}.private': {e}")))?;

    let material = KeyMaterial {
        algorithm: Algorithm::from_iana_number(private.algorithm),
        flags,
        public_key,
        private_key,
    };

    Ok(KeyRecord {
        stem: stem.to_string(),
        is_ksk: state.is_ksk,
        is_zsk: state.is_zsk,
        algorithm: Algorithm::from_iana_number(state.algorithm),
        key_size_bits: state.key_size_bits,
        lifetime_seconds: state.lifetime_seconds,
        material,
        created: state.created.map(Instant::new),
        publish: state.publish.map(Instant::new),
        activate: state.activate.map(Instant::new),
        inactive: state.inactive.map(Instant::new),
        delete: state.delete.map(Instant::new),
        ttl: state.ttl,
    })
}

/// Parses a presentation-format DNSKEY RR line, returning its flags,
/// algorithm number, and raw public key bytes.
fn parse_dnskey_line(line: &str) -> Result<(u16, u8, Vec<u8>), String> {
    let mut fields = line.split_whitespace();
    let _owner = fields.next().ok_or("missing owner name")?;
    let _ttl = fields.next().ok_or("missing ttl")?;
    let _class = fields.next().ok_or("missing class")?;
    let rtype = fields.next().ok_or("missing type")?;
    if rtype != "DNSKEY" {
        return Err(format!("expected DNSKEY, found '{rtype}'"));
    }
    let flags: u16 = fields
        .next()
        .ok_or("missing flags")?
        .parse()
        .map_err(|_| "invalid flags".to_string())?;
    let _protocol = fields.next().ok_or("missing protocol")?;
    let algorithm: u8 = fields
        .next()
        .ok_or("missing algorithm")?
        .parse()
        .map_err(|_| "invalid algorithm".to_string())?;
    let rest: String = fields.collect::<Vec<_>>().join("");
    let public_key = base64::engine::general_purpose::STANDARD
        .decode(rest.as_bytes())
        .map_err(|e| format!("invalid base64: {e}"))?;
    Ok((flags, algorithm, public_key))
}

fn zone_of(stem: &str) -> DisplayStem {
    DisplayStem(stem)
}

/// A thin formatter that recovers the owner name from a file stem, so the
/// `.key` file can be written using only the information already on the
/// [`KeyRecord`]. The stem's `K<zone>+...` prefix is the owner name exactly
/// as `ZoneName::parse` would have rendered it; splitting it back out
/// avoids requiring the zone name just to persist a single key.
struct DisplayStem<'a>(&'a str);

impl fmt::Display for DisplayStem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest = self.0.strip_prefix('K').unwrap_or(self.0);
        let owner = rest.split("+").next().unwrap_or(rest);
        f.write_str(owner)
    }
}

fn write_atomic(dir: &Utf8Path, name: &str, contents: &[u8]) -> Result<(), Fatal> {
    use std::io::Write;

    let mut tmp = tempfile::Builder::new()
        .prefix(name)
        .tempfile_in(dir)
        .map_err(|e| Fatal::Io(format!("unable to create temporary file in '{dir}': {e}")))?;
    tmp.write_all(contents)
        .map_err(|e| Fatal::Io(format!("unable to write '{name}': {e}")))?;
    tmp.persist(dir.join(name))
        .map_err(|e| Fatal::Io(format!("unable to persist '{name}': {e}")))?;
    Ok(())
}
