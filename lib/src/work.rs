use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use static_init::dynamic;

use std::fmt;

use crate::compact::CompactTarget;
use crate::error::{KgwError, Result};

// 2^256, the size of the hash space
#[dynamic]
static ONE_LSH_256: BigInt = BigInt::one() << 256u32;

/// Expected number of hash attempts needed to find a block
/// at a given target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Work(BigInt);

impl Work {
    /// Work for a compact difficulty, `2^256 / (target + 1)`.
    ///
    /// Negative and zero targets carry no work. Valid blocks
    /// never encode them, but a malformed one could.
    pub fn from_compact(bits: CompactTarget) -> Self {
        let target = bits.to_target();
        if !target.is_positive() {
            return Work(BigInt::zero());
        }

        let denominator = target.into_inner() + 1;
        Work(&*ONE_LSH_256 / denominator)
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Seconds a miner with `hash_rate` needs on average,
    /// truncated toward zero.
    pub fn seconds_at(&self, hash_rate: HashRate) -> Result<u64> {
        if hash_rate.is_zero() {
            return Err(KgwError::ZeroHashRate);
        }

        (&self.0 / BigInt::from(hash_rate.hashes_per_second()))
            .to_u64()
            .ok_or(KgwError::BlockTimeOverflow)
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
)]
pub enum HashUnit {
    Hash,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
}

impl HashUnit {
    pub fn multiplier(self) -> u128 {
        match self {
            HashUnit::Hash => 1,
            HashUnit::Kilo => 1_000,
            HashUnit::Mega => 1_000_000,
            HashUnit::Giga => 1_000_000_000,
            HashUnit::Tera => 1_000_000_000_000,
            HashUnit::Peta => 1_000_000_000_000_000,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            HashUnit::Hash => "H/s",
            HashUnit::Kilo => "KH/s",
            HashUnit::Mega => "MH/s",
            HashUnit::Giga => "GH/s",
            HashUnit::Tera => "TH/s",
            HashUnit::Peta => "PH/s",
        }
    }
}

/// Network hash rate in hashes per second.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
)]
pub struct HashRate(u128);

impl HashRate {
    pub const fn from_hashes(hashes_per_second: u128) -> Self {
        HashRate(hashes_per_second)
    }

    // None if the scaled value does not fit
    pub fn scaled(value: u128, unit: HashUnit) -> Option<Self> {
        value.checked_mul(unit.multiplier()).map(HashRate)
    }

    pub fn hashes_per_second(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} H/s", self.0)
    }
}
