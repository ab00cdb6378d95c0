//! Forward simulation of future blocks.
//!
//! The simulator prices each block with the current
//! difficulty, fabricates a header found exactly when the
//! hash rate predicts, feeds it back into the window and
//! retargets. Identical inputs always produce identical
//! schedules.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use std::ops::ControlFlow;

use crate::compact::CompactTarget;
use crate::error::{KgwError, Result};
use crate::kgw;
use crate::params::NetworkParameters;
use crate::types::HeaderWindow;
use crate::work::{HashRate, Work};

/// One simulated block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectedBlock {
    pub height: u64,
    pub bits: CompactTarget,
    /// Expected seconds to find this block
    pub seconds: u64,
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq,
)]
pub struct SimulationSummary {
    pub blocks: u64,
    pub total_seconds: u64,
    pub average_seconds: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    pub blocks: Vec<ProjectedBlock>,
    pub summary: SimulationSummary,
}

pub struct Simulator {
    window: HeaderWindow,
    params: NetworkParameters,
    hash_rate: HashRate,
    // height of the next block to simulate
    height: u64,
    bits: CompactTarget,
    blocks: u64,
    total_seconds: u64,
}

impl Simulator {
    /// Start simulating right after the tip of `window`.
    ///
    /// The first block is priced at `override_bits` when
    /// given, otherwise at the difficulty KGW assigns it.
    pub fn new(
        window: HeaderWindow,
        params: NetworkParameters,
        hash_rate: HashRate,
        override_bits: Option<CompactTarget>,
    ) -> Result<Self> {
        params.validate()?;

        if hash_rate.is_zero() {
            return Err(KgwError::ZeroHashRate);
        }

        let required = params.max_blocks as usize;
        if window.capacity() < required {
            return Err(KgwError::WindowCapacity {
                capacity: window.capacity(),
                required,
            });
        }

        let height = window
            .tip()
            .map(|tip| tip.height + 1)
            .ok_or(KgwError::EmptyWindow)?;

        let bits = match override_bits {
            Some(bits) => bits,
            None => kgw::next_compact(&window, height, &params)?,
        };

        info!(
            network = %params.name,
            start_height = height,
            %bits,
            %hash_rate,
            "simulator ready"
        );

        Ok(Simulator {
            window,
            params,
            hash_rate,
            height,
            bits,
            blocks: 0,
            total_seconds: 0,
        })
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn bits(&self) -> CompactTarget {
        self.bits
    }

    pub fn hash_rate(&self) -> HashRate {
        self.hash_rate
    }

    pub fn window(&self) -> &HeaderWindow {
        &self.window
    }

    pub fn params(&self) -> &NetworkParameters {
        &self.params
    }

    /// Simulate a single block.
    pub fn step(&mut self) -> Result<ProjectedBlock> {
        let seconds =
            Work::from_compact(self.bits).seconds_at(self.hash_rate)?;
        let block = ProjectedBlock {
            height: self.height,
            bits: self.bits,
            seconds,
        };

        let tip = self.window.tip().ok_or(KgwError::EmptyWindow)?;
        let header = tip.next_synthetic(seconds, self.bits)?;
        self.window.push(header)?;

        self.total_seconds = self
            .total_seconds
            .checked_add(seconds)
            .ok_or(KgwError::BlockTimeOverflow)?;
        self.blocks += 1;
        self.height += 1;
        self.bits =
            kgw::next_compact(&self.window, self.height, &self.params)?;

        debug!(
            height = block.height,
            bits = %block.bits,
            seconds,
            next_bits = %self.bits,
            "simulated block"
        );

        Ok(block)
    }

    /// Simulate `count` blocks and collect them.
    pub fn run(&mut self, count: u64) -> Result<Projection> {
        let mut blocks = Vec::new();
        let summary = self.run_with(count, |block| {
            blocks.push(*block);
            ControlFlow::Continue(())
        })?;

        Ok(Projection { blocks, summary })
    }

    /// Simulate up to `count` blocks, handing each one to
    /// `on_block`. Returning `ControlFlow::Break` stops the
    /// simulation after that block.
    pub fn run_with<F>(
        &mut self,
        count: u64,
        mut on_block: F,
    ) -> Result<SimulationSummary>
    where
        F: FnMut(&ProjectedBlock) -> ControlFlow<()>,
    {
        for _ in 0..count {
            let block = self.step()?;
            if on_block(&block).is_break() {
                info!(height = block.height, "simulation stopped early");
                break;
            }
        }

        Ok(self.summary())
    }

    /// Totals over every block simulated so far.
    pub fn summary(&self) -> SimulationSummary {
        let average_seconds = self
            .total_seconds
            .checked_div(self.blocks)
            .unwrap_or(0);

        SimulationSummary {
            blocks: self.blocks,
            total_seconds: self.total_seconds,
            average_seconds,
        }
    }
}
