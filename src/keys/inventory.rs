//! The set of keys already on disk for a zone.

use camino::Utf8Path;

use crate::error::Fatal;
use crate::keys::{self, KeyRecord, KeyTag};
use crate::policy::PolicyKeyEntry;
use crate::time::Instant;
use crate::zone::ZoneName;

/// Every [`KeyRecord`] found for a zone in a key directory, kept sorted
/// ascending by key tag.
///
/// A missing key directory is an empty inventory, not an error: a zone
/// that has never had `keygen` run against it has no keys yet.
#[derive(Default)]
pub struct Inventory {
    records: Vec<KeyRecord>,
}

impl Inventory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(key_dir: &Utf8Path, zone: &ZoneName) -> Result<Self, Fatal> {
        if !key_dir.is_dir() {
            return Ok(Self::empty());
        }

        let prefix = format!("K{zone}+");
        let mut records = Vec::new();
        for entry in std::fs::read_dir(key_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("state") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !stem.starts_with(&prefix) {
                continue;
            }
            match keys::load(key_dir, stem) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!("skipping key '{stem}': {err}");
                }
            }
        }
        records.sort_by_key(|r| r.tag());
        Ok(Self { records })
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    pub fn insert(&mut self, record: KeyRecord) {
        let idx = self.records.partition_point(|r| r.tag() < record.tag());
        self.records.insert(idx, record);
    }

    /// The first record matching `entry` that is eligible (active) at `t`.
    pub fn find_eligible(&self, entry: &PolicyKeyEntry, t: Instant) -> Option<&KeyRecord> {
        self.records
            .iter()
            .find(|r| r.matches(entry) && r.eligible_at(t))
    }

    /// All records matching `entry`, regardless of eligibility at any
    /// particular time; used by the bundle emitter to find the next
    /// publish/delete change point.
    pub fn matching<'a>(
        &'a self,
        entry: &'a PolicyKeyEntry,
    ) -> impl Iterator<Item = &'a KeyRecord> {
        self.records.iter().filter(move |r| r.matches(entry))
    }

    pub fn stem_exists(&self, stem: &str) -> bool {
        self.records.iter().any(|r| r.stem == stem)
    }

    /// True if any record's own tag, or the tag it would have revoked,
    /// equals `tag` — the collision check a freshly generated candidate
    /// must pass before it can be kept.
    pub fn tag_collides(&self, tag: KeyTag) -> bool {
        self.records
            .iter()
            .any(|r| r.tag() == tag || r.material.revoked_tag() == tag)
    }
}
