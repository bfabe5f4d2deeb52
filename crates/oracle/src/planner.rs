//! Range planner: which source blocks are final enough to scan this cycle.

use crate::cursor::ScanCursor;

/// Inclusive block window for one cycle. Empty when `from_block > to_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub from_block: i64,
    pub to_block: i64,
}

impl ScanRange {
    pub fn is_empty(&self) -> bool {
        self.from_block > self.to_block
    }

    pub fn contains(&self, block: u64) -> bool {
        i64::try_from(block).map_or(false, |b| b >= self.from_block && b <= self.to_block)
    }

    /// `(from, to)` as block numbers, or `None` when there is nothing to scan.
    pub fn bounds(&self) -> Option<(u64, u64)> {
        if self.is_empty() {
            return None;
        }
        let from = u64::try_from(self.from_block).ok()?;
        let to = u64::try_from(self.to_block).ok()?;
        Some((from, to))
    }
}

/// Every block `<= to_block` has at least `required_confirmations` blocks on top of it at
/// `chain_head`. Pure; never fails. Signed arithmetic keeps a young chain (head below the
/// confirmation depth) an empty range instead of an underflow.
pub fn plan(cursor: ScanCursor, chain_head: u64, required_confirmations: u64) -> ScanRange {
    let head = i64::try_from(chain_head).unwrap_or(i64::MAX);
    let depth = i64::try_from(required_confirmations).unwrap_or(i64::MAX);
    ScanRange {
        from_block: cursor.last_scanned_block.saturating_add(1),
        to_block: head.saturating_sub(depth),
    }
}
