use std::io::{Result as IoResult, Write};

use kgwlib::simulation::{ProjectedBlock, SimulationSummary};

const SEPARATOR: &str =
    "|--------------------|--------------------|--------------------|";

/// Format seconds as minutes and zero-padded seconds,
/// e.g. `2m05s`
pub fn format_duration(seconds: u64) -> String {
    format!("{}m{:02}s", seconds / 60, seconds % 60)
}

pub fn print_table_header<W: Write>(out: &mut W) -> IoResult<()> {
    writeln!(
        out,
        "|{:>20}|{:>20}|{:>20}|",
        "Block Height", "Diff Bits", "Time to block"
    )?;
    writeln!(out, "{}", SEPARATOR)
}

pub fn print_block<W: Write>(
    out: &mut W,
    block: &ProjectedBlock,
) -> IoResult<()> {
    writeln!(
        out,
        "|{:>20}|{:>20x}|{:>20}",
        block.height,
        block.bits,
        format_duration(block.seconds)
    )
}

pub fn print_summary<W: Write>(
    out: &mut W,
    summary: &SimulationSummary,
) -> IoResult<()> {
    writeln!(
        out,
        "Totally mined {} blocks in {} seconds (~{} per block)",
        summary.blocks, summary.total_seconds, summary.average_seconds
    )
}
