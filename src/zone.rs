//! The zone name a policy applies to.
//!
//! Parsing and wire representation are delegated entirely to `domain`;
//! `ZoneName` only carries the one operation this crate needs from it,
//! `FromStr`, plus the `Display` bundle headers and DNSKEY lines use.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use domain::base::Name;

use crate::error::Fatal;

#[derive(Clone, Debug)]
pub struct ZoneName(Name<Bytes>);

impl ZoneName {
    pub fn parse(s: &str) -> Result<Self, Fatal> {
        Name::<Bytes>::from_str(s)
            .map(ZoneName)
            .map_err(|e| Fatal::Usage(format!("'{s}' is not a valid zone name: {e}")))
    }

    pub fn as_name(&self) -> &Name<Bytes> {
        &self.0
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
