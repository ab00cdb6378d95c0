//! Difficulty retargeting and mining time projection for
//! Kimoto Gravity Well chains.
//!
//! The library decodes compact difficulty bits into
//! arbitrary precision targets, estimates the work they
//! represent, runs the KGW retarget over a rolling window
//! of headers and drives a forward simulation of future
//! blocks at a fixed hash rate.

// blocks below which the chain is too young to retarget
pub const MIN_BLOCKS: u64 = 144;
// maximum number of headers scanned by one retarget
pub const MAX_BLOCKS: u64 = 4032;
// ideal block time in seconds
pub const TARGET_SPACING: u64 = 150;
// compact form of the easiest allowed target
pub const POW_LIMIT_BITS: u32 = 0x1e0f_ffff;
// bit length of the easiest allowed target, 2^236 - 1
pub const POW_LIMIT_BIT_LENGTH: u32 = 236;
// headers kept in the rolling window by default
pub const DEFAULT_WINDOW_CAPACITY: usize = 4200;

pub mod compact;
pub mod error;
pub mod kgw;
pub mod params;
pub mod simulation;
pub mod source;
pub mod types;
pub mod util;
pub mod work;

pub use compact::{CompactTarget, Target};
pub use error::{KgwError, Result};
pub use params::NetworkParameters;
pub use work::{HashRate, HashUnit, Work};
