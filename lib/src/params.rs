use num_bigint::BigInt;
use num_traits::One;
use serde::{Deserialize, Serialize};

use crate::compact::{CompactTarget, Target};
use crate::error::{KgwError, Result};

/// Consensus constants of a network. Built once at startup
/// and never mutated afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NetworkParameters {
    /// Human readable network name
    pub name: String,
    /// Easiest allowed target
    pub pow_limit: Target,
    /// Easiest allowed target in compact form
    pub pow_limit_bits: CompactTarget,
    /// Ideal seconds between blocks
    pub target_spacing: u64,
    /// Shortest retarget window, also the chain age below
    /// which no retarget happens
    pub min_blocks: u64,
    /// Longest retarget window
    pub max_blocks: u64,
}

impl NetworkParameters {
    /// Vertcoin main network, which retargets with KGW.
    pub fn vertcoin() -> Self {
        NetworkParameters {
            name: "vtc".to_string(),
            pow_limit: Target::from(
                (BigInt::one() << crate::POW_LIMIT_BIT_LENGTH) - 1,
            ),
            pow_limit_bits: CompactTarget::new(
                crate::POW_LIMIT_BITS,
            ),
            target_spacing: crate::TARGET_SPACING,
            min_blocks: crate::MIN_BLOCKS,
            max_blocks: crate::MAX_BLOCKS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_spacing == 0 {
            return Err(KgwError::InvalidParameters(
                "target spacing must be positive".to_string(),
            ));
        }

        if self.min_blocks == 0 {
            return Err(KgwError::InvalidParameters(
                "min_blocks must be positive".to_string(),
            ));
        }

        if self.max_blocks < self.min_blocks {
            return Err(KgwError::InvalidParameters(format!(
                "max_blocks ({}) is below min_blocks ({})",
                self.max_blocks, self.min_blocks
            )));
        }

        if !self.pow_limit.is_positive() {
            return Err(KgwError::InvalidParameters(
                "pow limit must be positive".to_string(),
            ));
        }

        // the longest scan must not overflow its ideal time
        if self
            .target_spacing
            .checked_mul(self.max_blocks)
            .is_none()
        {
            return Err(KgwError::InvalidParameters(format!(
                "target spacing {} times max_blocks {} overflows",
                self.target_spacing, self.max_blocks
            )));
        }

        // young chains get pow_limit_bits, clamped targets get
        // the encoded limit; both must be the same ceiling
        let encoded = self.pow_limit.to_compact()?;
        if encoded != self.pow_limit_bits {
            return Err(KgwError::InvalidParameters(format!(
                "pow_limit_bits {} does not encode pow_limit \
                 (expected {})",
                self.pow_limit_bits, encoded
            )));
        }

        Ok(())
    }
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self::vertcoin()
    }
}
