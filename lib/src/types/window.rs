use std::collections::VecDeque;

use super::BlockHeader;
use crate::error::{KgwError, Result};

/// A fixed-capacity, gap-free run of headers ordered by
/// height. Appending at capacity evicts the oldest header.
#[derive(Clone, Debug)]
pub struct HeaderWindow {
    headers: VecDeque<BlockHeader>,
    capacity: usize,
}

impl HeaderWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HeaderWindow {
            headers: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a window from headers ordered oldest first.
    /// Only the newest `capacity` headers are kept.
    pub fn from_headers<I>(capacity: usize, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = BlockHeader>,
    {
        let mut window = HeaderWindow::new(capacity);
        for header in headers {
            window.push(header)?;
        }

        Ok(window)
    }

    /// Append the newest header, returning the evicted one
    /// if the window was full.
    pub fn push(
        &mut self,
        header: BlockHeader,
    ) -> Result<Option<BlockHeader>> {
        if let Some(tip) = self.headers.back() {
            if header.height != tip.height + 1 {
                return Err(KgwError::NonContiguousHeaders {
                    expected: tip.height + 1,
                    found: header.height,
                });
            }
        }

        let evicted = if self.headers.len() == self.capacity {
            self.headers.pop_front()
        } else {
            None
        };
        self.headers.push_back(header);

        Ok(evicted)
    }

    // newest header
    pub fn tip(&self) -> Option<&BlockHeader> {
        self.headers.back()
    }

    // oldest header
    pub fn first(&self) -> Option<&BlockHeader> {
        self.headers.front()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // oldest to newest
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = &BlockHeader>
           + ExactSizeIterator {
        self.headers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::CompactTarget;
    use chrono::{TimeZone, Utc};

    fn header(height: u64) -> BlockHeader {
        BlockHeader::new(
            height,
            Utc.timestamp_opt(1_600_000_000 + height as i64 * 150, 0)
                .unwrap(),
            CompactTarget::new(0x1c0f_fff0),
        )
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut window =
            HeaderWindow::from_headers(3, (1..=3).map(header))
                .unwrap();
        assert_eq!(window.len(), 3);

        let evicted = window.push(header(4)).unwrap();
        assert_eq!(evicted.map(|h| h.height), Some(1));
        assert_eq!(window.len(), 3);
        assert_eq!(window.first().unwrap().height, 2);
        assert_eq!(window.tip().unwrap().height, 4);
    }

    #[test]
    fn test_from_headers_keeps_newest() {
        let window =
            HeaderWindow::from_headers(5, (1..=20).map(header))
                .unwrap();
        let heights: Vec<u64> =
            window.iter().map(|h| h.height).collect();
        assert_eq!(heights, vec![16, 17, 18, 19, 20]);
    }

    #[test]
    fn test_rejects_gaps() {
        let mut window =
            HeaderWindow::from_headers(10, (1..=3).map(header))
                .unwrap();
        assert!(matches!(
            window.push(header(5)),
            Err(KgwError::NonContiguousHeaders {
                expected: 4,
                found: 5
            })
        ));
        assert!(window.push(header(3)).is_err());
        assert_eq!(window.tip().unwrap().height, 3);
    }
}
