//! A best-effort advisory lock over a key directory.
//!
//! `keygen` is the only command that writes to the key directory, so it is
//! the only one that takes this lock; `request` only reads. Failing to
//! acquire it — because another `ksr keygen` already holds it — is not
//! fatal: it is logged and the run proceeds, matching the "if one is
//! available from the host environment" framing of the resource it
//! protects.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::Fatal;

const SENTINEL: &str = ".ksr.lock";

pub struct AdvisoryLock {
    sentinel: Option<Utf8PathBuf>,
}

impl AdvisoryLock {
    pub fn acquire(key_dir: &Utf8Path) -> Result<Self, Fatal> {
        fs::create_dir_all(key_dir)
            .map_err(|e| Fatal::Io(format!("unable to open directory '{key_dir}': {e}")))?;

        let sentinel = key_dir.join(SENTINEL);
        match fs::File::options()
            .write(true)
            .create_new(true)
            .open(&sentinel)
        {
            Ok(_) => Ok(Self {
                sentinel: Some(sentinel),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!(
                    "{sentinel}: lock already held by another 'ksr keygen' run; proceeding without it"
                );
                Ok(Self { sentinel: None })
            }
            Err(e) => Err(Fatal::Io(format!(
                "unable to acquire lock '{sentinel}': {e}"
            ))),
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Some(path) = &self.sentinel {
            let _ = fs::remove_file(path);
        }
    }
}
