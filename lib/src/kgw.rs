//! Kimoto Gravity Well difficulty retargeting.
//!
//! KGW walks backwards from the newest header, keeping a
//! cumulative average of the targets it passes. The walk
//! stops early once the observed block rate leaves the
//! "event horizon", a tolerance band that narrows as more
//! blocks are scanned. The average is then scaled by how
//! far the observed rate is from the ideal one.

use num_bigint::BigInt;
use num_integer::Integer;
use tracing::debug;

use std::ops::ControlFlow;

use crate::compact::{CompactTarget, Target};
use crate::error::{KgwError, Result};
use crate::params::NetworkParameters;
use crate::types::{BlockHeader, HeaderWindow};

const EVENT_HORIZON_FACTOR: f64 = 0.7084;
const EVENT_HORIZON_EXPONENT: f64 = -1.228;

/// Upper bound of the event horizon after `scanned` blocks.
/// The lower bound is its reciprocal.
pub fn event_horizon_deviation(scanned: u64, min_blocks: u64) -> f64 {
    1.0 + EVENT_HORIZON_FACTOR
        * (scanned as f64 / min_blocks as f64)
            .powf(EVENT_HORIZON_EXPONENT)
}

// running state of the backward scan
#[derive(Debug, Default)]
struct Scan {
    scanned: u64,
    average: BigInt,
    actual_rate: u64,
    target_rate: u64,
}

impl Scan {
    fn absorb(
        self,
        newest: &BlockHeader,
        header: &BlockHeader,
        params: &NetworkParameters,
    ) -> Scan {
        let scanned = self.scanned + 1;
        let target = header.target().into_inner();

        // every sample weighs 1/scanned in the average
        let average = if scanned == 1 {
            target
        } else {
            let delta =
                div_floor(target - &self.average, scanned);
            self.average + delta
        };

        let actual_rate =
            newest.seconds_since(header).max(0) as u64;

        Scan {
            scanned,
            average,
            actual_rate,
            target_rate: params.target_spacing * scanned,
        }
    }

    fn has_rates(&self) -> bool {
        self.actual_rate != 0 && self.target_rate != 0
    }

    fn rate_adjustment_ratio(&self) -> f64 {
        if self.has_rates() {
            self.target_rate as f64 / self.actual_rate as f64
        } else {
            1.0
        }
    }

    fn beyond_event_horizon(&self, min_blocks: u64) -> bool {
        if self.scanned < min_blocks {
            return false;
        }

        let fast = event_horizon_deviation(self.scanned, min_blocks);
        let slow = 1.0 / fast;
        let ratio = self.rate_adjustment_ratio();

        ratio <= slow || ratio >= fast
    }

    fn retarget(self) -> BigInt {
        if self.has_rates() {
            div_floor(self.average * self.actual_rate, self.target_rate)
        } else {
            self.average
        }
    }
}

// floored division; the average may dip below zero on
// malformed bits and must round the same way then
fn div_floor(numerator: BigInt, divisor: u64) -> BigInt {
    Integer::div_floor(&numerator, &BigInt::from(divisor))
}

/// Compute the compact difficulty for the block at `height`.
///
/// `window` has to end at `height - 1` and reach back far
/// enough for the longest possible scan, which is
/// `min(max_blocks, height - 1)` headers. Chains younger
/// than `min_blocks` always get the easiest difficulty.
pub fn next_compact(
    window: &HeaderWindow,
    height: u64,
    params: &NetworkParameters,
) -> Result<CompactTarget> {
    params.validate()?;

    let last_height = match height.checked_sub(1) {
        Some(last) if last >= params.min_blocks => last,
        _ => return Ok(params.pow_limit_bits),
    };

    let horizon = params.max_blocks.min(last_height);
    let available = window.len() as u64;
    if available < horizon {
        return Err(KgwError::InsufficientHistory {
            required: horizon,
            available,
        });
    }

    let newest = window.tip().ok_or(KgwError::EmptyWindow)?;
    if newest.height != last_height {
        return Err(KgwError::HeightMismatch {
            expected: last_height,
            found: newest.height,
        });
    }

    let scan = window.iter().rev().take(horizon as usize).try_fold(
        Scan::default(),
        |scan, header| {
            let scan = scan.absorb(newest, header, params);
            if scan.beyond_event_horizon(params.min_blocks) {
                ControlFlow::Break(scan)
            } else {
                ControlFlow::Continue(scan)
            }
        },
    );
    let scan = match scan {
        ControlFlow::Break(scan) | ControlFlow::Continue(scan) => scan,
    };

    debug!(
        height,
        scanned = scan.scanned,
        actual_rate = scan.actual_rate,
        target_rate = scan.target_rate,
        "retarget window closed"
    );

    let mut target = Target::from(scan.retarget());
    if target > params.pow_limit {
        target = params.pow_limit.clone();
    }

    target.to_compact()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HeaderSnapshot;
    use chrono::{TimeZone, Utc};

    const BITS: CompactTarget = CompactTarget::new(0x1c0f_fff0);

    fn steady(tip: u64, count: u64, spacing: u64) -> HeaderWindow {
        let tip_time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let snapshot =
            HeaderSnapshot::steady(tip, count, BITS, spacing, tip_time)
                .unwrap();
        HeaderWindow::from_headers(
            crate::DEFAULT_WINDOW_CAPACITY,
            snapshot.headers().iter().cloned(),
        )
        .unwrap()
    }

    #[test]
    fn test_young_chain_gets_pow_limit() {
        let params = NetworkParameters::vertcoin();
        let empty = HeaderWindow::new(10);
        for height in [0, 1, 100, 144] {
            assert_eq!(
                next_compact(&empty, height, &params).unwrap(),
                params.pow_limit_bits
            );
        }

        let window = steady(143, 143, 1);
        assert_eq!(
            next_compact(&window, 144, &params).unwrap(),
            params.pow_limit_bits
        );
    }

    #[test]
    fn test_steady_chain_scans_full_window() {
        let params = NetworkParameters::vertcoin();
        let window = steady(10_000, 4200, 150);

        // the rate never leaves the envelope, so all 4032
        // samples are used and only 4031 intervals elapsed
        assert_eq!(
            next_compact(&window, 10_001, &params).unwrap(),
            CompactTarget::new(0x1c0f_feeb)
        );
    }

    #[test]
    fn test_slow_blocks_loosen_difficulty() {
        let params = NetworkParameters::vertcoin();
        let window = steady(10_000, 4200, 300);
        let next = next_compact(&window, 10_001, &params).unwrap();
        assert!(next.to_target() > BITS.to_target());
        assert_eq!(next, CompactTarget::new(0x1c1f_c6fc));
    }

    #[test]
    fn test_fast_blocks_close_window_early() {
        let params = NetworkParameters::vertcoin();
        let window = steady(10_000, 4200, 15);
        let next = next_compact(&window, 10_001, &params).unwrap();

        // the envelope is left at the first eligible sample,
        // so the full 10x speedup is applied
        let expected = Target::from(
            BITS.to_target().into_inner() * 143u64 * 15u64
                / (144u64 * 150u64),
        )
        .to_compact()
        .unwrap();
        assert_eq!(next, expected);
    }

    #[test]
    fn test_clamps_to_pow_limit() {
        let params = NetworkParameters::vertcoin();
        let tip_time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let snapshot = HeaderSnapshot::steady(
            5_000,
            4200,
            params.pow_limit_bits,
            1500,
            tip_time,
        )
        .unwrap();
        let window = HeaderWindow::from_headers(
            4200,
            snapshot.headers().iter().cloned(),
        )
        .unwrap();

        let next = next_compact(&window, 5_001, &params).unwrap();
        assert_eq!(next, params.pow_limit_bits);
        assert_eq!(
            next.to_target(),
            params.pow_limit.to_compact().unwrap().to_target()
        );
    }

    #[test]
    fn test_backwards_timestamps_clamp_to_zero() {
        let params = NetworkParameters::vertcoin();
        let tip_time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut headers = HeaderSnapshot::steady(
            2_000, 2_000, BITS, 150, tip_time,
        )
        .unwrap()
        .headers()
        .to_vec();
        // newest header claims to be older than all others
        if let Some(last) = headers.last_mut() {
            last.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        }
        let window =
            HeaderWindow::from_headers(4200, headers).unwrap();

        // no elapsed time means no rate, so only the average
        // of the scanned targets is left
        let next = next_compact(&window, 2_001, &params).unwrap();
        assert_eq!(next, BITS);
    }

    #[test]
    fn test_insufficient_history() {
        let params = NetworkParameters::vertcoin();
        let window = steady(999, 500, 150);
        assert!(matches!(
            next_compact(&window, 1_000, &params),
            Err(KgwError::InsufficientHistory {
                required: 999,
                available: 500
            })
        ));

        let window = steady(50_000, 4031, 150);
        assert!(matches!(
            next_compact(&window, 50_001, &params),
            Err(KgwError::InsufficientHistory {
                required: 4032,
                available: 4031
            })
        ));
    }

    #[test]
    fn test_height_mismatch() {
        let params = NetworkParameters::vertcoin();
        let window = steady(10_000, 4200, 150);
        assert!(matches!(
            next_compact(&window, 10_002, &params),
            Err(KgwError::HeightMismatch {
                expected: 10_001,
                found: 10_000
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let window = steady(10_000, 4200, 150);

        let mut params = NetworkParameters::vertcoin();
        params.target_spacing = i64::MAX as u64;
        assert!(matches!(
            next_compact(&window, 10_001, &params),
            Err(KgwError::InvalidParameters(_))
        ));

        // a floor that disagrees with the clamp ceiling
        let mut params = NetworkParameters::vertcoin();
        params.pow_limit = Target::from(0xffffu64);
        assert!(matches!(
            next_compact(&HeaderWindow::new(10), 50, &params),
            Err(KgwError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let params = NetworkParameters::vertcoin();
        let window = steady(10_000, 4200, 97);
        assert_eq!(
            next_compact(&window, 10_001, &params).unwrap(),
            next_compact(&window, 10_001, &params).unwrap()
        );
    }

    #[test]
    fn test_event_horizon_narrows() {
        let first = event_horizon_deviation(144, 144);
        assert!((first - 1.7084).abs() < 1e-12);
        assert!(event_horizon_deviation(4032, 144) < first);
        assert!(event_horizon_deviation(4032, 144) > 1.0);
    }

    #[test]
    fn test_div_floor() {
        assert_eq!(div_floor(BigInt::from(7), 2), BigInt::from(3));
        assert_eq!(div_floor(BigInt::from(-7), 2), BigInt::from(-4));
        assert_eq!(div_floor(BigInt::from(-8), 2), BigInt::from(-4));
    }
}
