//! The command-line surface: two subcommands, `keygen` and `request`,
//! sharing the options the original tool recognizes.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ksr", version, about = "Generate DNSSEC Key Signing Requests from a key and signing policy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pre-generate ZSKs for a zone's policy.
    Keygen(Options),
    /// Emit a time-ordered DNSKEY bundle stream for a zone.
    Request(Options),
}

#[derive(Debug, Args)]
pub struct Options {
    /// The zone the policy applies to.
    pub zone: String,

    /// The policy file to read.
    #[arg(short = 'l', value_name = "FILE")]
    pub policy_file: Utf8PathBuf,

    /// The name of the dnssec-policy within that file.
    #[arg(short = 'k', value_name = "NAME")]
    pub policy_name: String,

    /// The start of the window: an RFC 3339 timestamp, a bare epoch
    /// second count, or a `+`/`-` offset from now. Defaults to now.
    #[arg(short = 'i', value_name = "WHEN")]
    pub start: Option<String>,

    /// The end of the window, in the same syntax as `-i`.
    #[arg(short = 'e', value_name = "WHEN")]
    pub end: String,

    /// The directory keys are read from and, for `keygen`, written to.
    #[arg(short = 'K', value_name = "DIR", default_value = ".")]
    pub key_dir: Utf8PathBuf,

    /// The key generation engine to use (reserved; unused by the default
    /// local backend).
    #[arg(short = 'E', value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Restrict key generation to FIPS-approved algorithms and sizes.
    #[arg(short = 'F')]
    pub fips: bool,

    /// Verbosity level: 0 is quiet, higher numbers log more.
    #[arg(short = 'v', value_name = "LEVEL", default_value_t = 0)]
    pub verbosity: u8,
}
