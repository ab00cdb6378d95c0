use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;

use kgwlib::simulation::Simulator;
use kgwlib::source::{HeaderSnapshot, HeaderSource};
use kgwlib::util::Saveable;
use kgwlib::{CompactTarget, HashRate, HashUnit, NetworkParameters};

mod report;
mod util;

use util::{
    generate_config, generate_history, load_params,
    setup_panic_hook, setup_tracing,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Project future block times of a KGW chain at a given
/// network hash rate
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to daily rotated files in this directory
    /// instead of stderr
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate blocks on top of a header snapshot
    Run {
        /// CBOR header snapshot to start from
        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        /// Expected network hash rate
        #[arg(long, value_name = "RATE")]
        hash_rate: u128,

        /// Unit of the hash rate
        #[arg(short, long, value_enum, default_value_t = Unit::Gh)]
        unit: Unit,

        /// Number of blocks to simulate
        #[arg(
            short = 'n',
            long,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        blocks: u64,

        /// Override the difficulty bits (hex) of the first
        /// simulated block
        #[arg(short, long, value_name = "BITS", value_parser = parse_diff_bits)]
        diff: Option<CompactTarget>,

        /// Network parameters as TOML, defaults to Vertcoin
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Headers kept in the rolling window
        #[arg(
            long,
            default_value_t = kgwlib::DEFAULT_WINDOW_CAPACITY
        )]
        window: usize,
    },
    /// Write the built-in network parameters as TOML
    GenerateConfig {
        #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from("network.toml"))]
        output: PathBuf,
    },
    /// Write a snapshot of evenly spaced headers
    GenerateHistory {
        #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from("history.cbor"))]
        output: PathBuf,

        /// Height of the newest header
        #[arg(long)]
        tip: u64,

        /// Number of headers
        #[arg(long, default_value_t = kgwlib::DEFAULT_WINDOW_CAPACITY as u64)]
        count: u64,

        /// Difficulty bits (hex) of every header
        #[arg(long, default_value = "0x1c0ffff0")]
        bits: CompactTarget,

        /// Seconds between headers
        #[arg(long, default_value_t = kgwlib::TARGET_SPACING)]
        spacing: u64,

        /// Unix time of the newest header, defaults to now
        #[arg(long)]
        tip_time: Option<i64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Unit {
    H,
    Kh,
    Mh,
    Gh,
    Th,
    Ph,
}

impl From<Unit> for HashUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::H => HashUnit::Hash,
            Unit::Kh => HashUnit::Kilo,
            Unit::Mh => HashUnit::Mega,
            Unit::Gh => HashUnit::Giga,
            Unit::Th => HashUnit::Tera,
            Unit::Ph => HashUnit::Peta,
        }
    }
}

// override bits are a signed 32 bit hex value, so the top
// bit can never be set
fn parse_diff_bits(s: &str) -> Result<CompactTarget> {
    let bits: CompactTarget = s
        .parse()
        .with_context(|| format!("invalid hex bits: {}", s))?;
    if bits.to_u32() > i32::MAX as u32 {
        anyhow::bail!("bits {} do not fit a signed 32 bit value", s);
    }

    Ok(bits)
}

fn run(
    history: PathBuf,
    hash_rate: HashRate,
    blocks: u64,
    diff: Option<CompactTarget>,
    params: NetworkParameters,
    window: usize,
) -> Result<()> {
    info!("Loading header snapshot from: {:?}", history);
    let snapshot = HeaderSnapshot::load_from_file(&history)
        .with_context(|| {
            format!("failed to load {}", history.display())
        })?;

    let window = snapshot
        .fetch_window(window)
        .context("header snapshot cannot fill the window")?;
    debug!(
        headers = window.len(),
        tip = ?window.tip().map(|tip| tip.height),
        "window loaded"
    );

    let mut simulator =
        Simulator::new(window, params, hash_rate, diff)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::print_table_header(&mut out)?;

    // a closed stdout ends the simulation instead of
    // computing blocks nobody reads
    let mut write_error = None;
    let summary = simulator.run_with(blocks, |block| {
        match report::print_block(&mut out, block) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;
    if let Some(e) = write_error {
        return Err(e).context("failed to write projection");
    }

    report::print_summary(&mut out, &summary)?;
    out.flush()?;

    info!(
        blocks = summary.blocks,
        total_seconds = summary.total_seconds,
        "simulation finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.log_dir.as_deref())?;
    setup_panic_hook();

    match cli.command {
        Commands::Run {
            history,
            hash_rate,
            unit,
            blocks,
            diff,
            config,
            window,
        } => {
            let params = match config {
                Some(path) => load_params(&path)?,
                None => NetworkParameters::vertcoin(),
            };
            let unit = HashUnit::from(unit);
            let hash_rate = HashRate::scaled(hash_rate, unit)
                .context("hash rate is too large")?;
            info!(
                "Simulating {} blocks at {} ({})",
                blocks,
                hash_rate,
                unit.suffix()
            );

            run(history, hash_rate, blocks, diff, params, window)
        }
        Commands::GenerateConfig { output } => {
            debug!("Generating config at: {:?}", output);
            generate_config(&output)
        }
        Commands::GenerateHistory {
            output,
            tip,
            count,
            bits,
            spacing,
            tip_time,
        } => generate_history(
            &output, tip, count, bits, spacing, tip_time,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "simulator",
            "run",
            "--history",
            "chain.cbor",
            "--hash-rate",
            "1000",
            "-n",
            "10",
            "--diff",
            "1c0ffff0",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                hash_rate,
                unit,
                blocks,
                diff,
                window,
                ..
            } => {
                assert_eq!(hash_rate, 1000);
                assert!(matches!(unit, Unit::Gh));
                assert_eq!(blocks, 10);
                assert_eq!(diff, Some(CompactTarget::new(0x1c0f_fff0)));
                assert_eq!(window, 4200);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_rejects_zero_blocks_and_bad_bits() {
        assert!(Cli::try_parse_from([
            "simulator",
            "run",
            "--history",
            "chain.cbor",
            "--hash-rate",
            "1",
            "-n",
            "0",
        ])
        .is_err());

        assert!(Cli::try_parse_from([
            "simulator",
            "run",
            "--history",
            "chain.cbor",
            "--hash-rate",
            "1",
            "-n",
            "1",
            "--diff",
            "not-hex",
        ])
        .is_err());
    }

    #[test]
    fn test_diff_bits_must_fit_signed_32_bits() {
        let parse = |bits: &str| {
            Cli::try_parse_from([
                "simulator",
                "run",
                "--history",
                "chain.cbor",
                "--hash-rate",
                "1",
                "-n",
                "1",
                "--diff",
                bits,
            ])
        };

        assert!(parse("7fffffff").is_ok());
        assert!(parse("0x80000000").is_err());
        assert!(parse("ffffffff").is_err());
    }

    #[test]
    fn test_parse_units() {
        let cli = Cli::try_parse_from([
            "simulator",
            "run",
            "--history",
            "chain.cbor",
            "--hash-rate",
            "5",
            "--unit",
            "th",
            "-n",
            "1",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { unit, .. } => {
                assert_eq!(HashUnit::from(unit), HashUnit::Tera)
            }
            _ => panic!("expected run"),
        }
    }
}
