use std::process::ExitCode;

use clap::Parser;

use ksr::args::{Cli, Command, Options};
use ksr::error::Fatal;
use ksr::keys::backend::{KeyBackend, LocalKeyBackend, ProgressListener, StderrProgress};
use ksr::keys::inventory::Inventory;
use ksr::lock::AdvisoryLock;
use ksr::policy;
use ksr::time::{parse_when, Instant};
use ksr::zone::ZoneName;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = match &cli.command {
        Command::Keygen(options) | Command::Request(options) => options.verbosity,
    };
    ksr::log::init(verbosity);

    match run(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command) -> Result<(), Fatal> {
    match command {
        Command::Keygen(options) => run_keygen(options),
        Command::Request(options) => run_request(options),
    }
}

/// Resolves the zone, policy, and `[start, end]` window shared by both
/// subcommands, failing before any key I/O if any of them is malformed.
fn resolve(
    options: &Options,
    now: Instant,
) -> Result<(ZoneName, policy::Policy, Instant, Instant), Fatal> {
    let zone = ZoneName::parse(&options.zone)?;
    let policy = policy::file::load(
        &options.policy_file,
        &options.policy_name,
        zone.clone(),
        options.key_dir.clone(),
    )?;

    let start = match &options.start {
        Some(s) => parse_when(s, now)?,
        None => now,
    };
    let end = parse_when(&options.end, now)?;

    Ok((zone, policy, start, end))
}

fn run_keygen(options: &Options) -> Result<(), Fatal> {
    let now = Instant::now()?;
    let (zone, policy, start, end) = resolve(options, now)?;

    // `request` only reads the key directory; only `keygen` needs to
    // serialize concurrent writers against it.
    let _lock = AdvisoryLock::acquire(&options.key_dir)?;
    let mut inventory = Inventory::load(&options.key_dir, &zone)?;

    let backend: &dyn KeyBackend = &LocalKeyBackend;
    let progress_listener = StderrProgress;
    let progress: Option<&dyn ProgressListener> = if options.verbosity > 0 {
        Some(&progress_listener)
    } else {
        None
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    ksr::schedule::run_keygen(
        &policy,
        &mut inventory,
        backend,
        progress,
        now,
        start,
        end,
        options.fips,
        &mut out,
    )
}

fn run_request(options: &Options) -> Result<(), Fatal> {
    let now = Instant::now()?;
    let (zone, policy, start, end) = resolve(options, now)?;

    let inventory = Inventory::load(&options.key_dir, &zone)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    ksr::bundle::run_request(&policy, &inventory, start, end, &mut out)
}
