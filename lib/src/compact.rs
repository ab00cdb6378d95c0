//! Compact ("nBits") difficulty encoding.
//!
//! A compact value packs a target into 32 bits:
//!
//! | bits  | meaning                       |
//! |-------|-------------------------------|
//! | 31-24 | exponent, the length in bytes |
//! | 23    | sign                          |
//! | 22-0  | mantissa                      |
//!
//! `target = (-1^sign) * mantissa * 256^(exponent - 3)`
//!
//! The layout is consensus critical, so both directions
//! must match the historical encoding bit for bit,
//! including the redundant sign bit.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{KgwError, Result};

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = SIGN_BIT - 1;

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(into = "String", try_from = "String")]
pub struct CompactTarget(u32);

impl CompactTarget {
    pub const fn new(bits: u32) -> Self {
        CompactTarget(bits)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 & SIGN_BIT != 0
    }

    /// Expand the compact representation into a full target.
    pub fn to_target(self) -> Target {
        let mantissa = self.0 & MANTISSA_MASK;
        let exponent = self.0 >> 24;

        // the exponent counts bytes, so shift the mantissa
        // into place instead of multiplying
        let magnitude = if exponent <= 3 {
            BigInt::from(mantissa >> (8 * (3 - exponent)))
        } else {
            BigInt::from(mantissa) << (8 * (exponent - 3))
        };

        if self.is_negative() {
            Target(-magnitude)
        } else {
            Target(magnitude)
        }
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        CompactTarget(bits)
    }
}

impl From<CompactTarget> for u32 {
    fn from(bits: CompactTarget) -> Self {
        bits.0
    }
}

impl FromStr for CompactTarget {
    type Err = ParseIntError;

    // accepts hex with or without a 0x prefix
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        u32::from_str_radix(digits, 16).map(CompactTarget)
    }
}

impl TryFrom<String> for CompactTarget {
    type Error = ParseIntError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CompactTarget> for String {
    fn from(bits: CompactTarget) -> Self {
        format!("{:#010x}", bits.0)
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::LowerHex for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A difficulty target. Block hashes must not exceed it,
/// so a smaller target means a harder block.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Target(BigInt);

impl Target {
    pub fn zero() -> Self {
        Target(BigInt::zero())
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn into_inner(self) -> BigInt {
        self.0
    }

    /// Pack the target into its compact representation.
    ///
    /// Precision beyond the top three bytes is truncated.
    /// Fails only when the byte length does not fit the
    /// 8 bit exponent, which no clamped target can reach.
    pub fn to_compact(&self) -> Result<CompactTarget> {
        if self.0.is_zero() {
            return Ok(CompactTarget(0));
        }

        let bytes = self.0.magnitude().to_bytes_be();
        let mut exponent = bytes.len();

        // top three bytes, padded on the right for short
        // values
        let mut mantissa = bytes
            .iter()
            .take(3)
            .fold(0u32, |acc, byte| (acc << 8) | *byte as u32);
        if exponent < 3 {
            mantissa <<= 8 * (3 - exponent);
        }

        // a set top bit would read back as the sign, so
        // move one byte into the exponent
        if mantissa & SIGN_BIT != 0 {
            mantissa >>= 8;
            exponent += 1;
        }

        let exponent = u8::try_from(exponent)
            .map_err(|_| KgwError::CompactOverflow)?;

        let mut compact = ((exponent as u32) << 24) | mantissa;
        if self.0.is_negative() {
            compact |= SIGN_BIT;
        }

        Ok(CompactTarget(compact))
    }
}

impl From<BigInt> for Target {
    fn from(value: BigInt) -> Self {
        Target(value)
    }
}

impl From<u64> for Target {
    fn from(value: u64) -> Self {
        Target(BigInt::from(value))
    }
}

impl FromStr for Target {
    type Err = KgwError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let digits = digits
            .trim_start_matches("0x")
            .trim_start_matches("0X");

        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| {
                KgwError::InvalidParameters(format!(
                    "invalid hex target: {}",
                    s
                ))
            })?;

        Ok(Target(if negative { -magnitude } else { magnitude }))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

// targets are stored as hex strings, which keeps
// 256 bit values readable in TOML
impl Serialize for Target {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let hex = if self.0.is_negative() {
            format!("-0x{:x}", self.0.magnitude())
        } else {
            format!("0x{:x}", self.0)
        };
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
