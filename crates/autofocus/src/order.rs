use std::fmt;

use crate::error::{Error, Result};

/// Explicit hints are shifted left by this many bits.
pub const HINT_SHIFT: u32 = 10;

/// Factor applied to explicit hints, leaving a gap of automatically sequenced
/// keys after each explicit checkpoint.
pub const HINT_SCALE: i64 = 1 << HINT_SHIFT;

/// The integer by which participants are totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OrderKey(pub i64);

impl OrderKey {
    /// The raw key value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderKey {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Computes order keys for newly registered participants.
///
/// Allocation is split into [`peek`](Self::peek) and [`commit`](Self::commit)
/// so that a registration can validate everything else before any state
/// changes. [`next_key`](Self::next_key) does both.
#[derive(Debug, Default, Clone)]
pub struct OrderAllocator {
    /// The most recently issued key.
    last: i64,
}

impl OrderAllocator {
    /// Construct an allocator with no keys issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently committed key, or zero.
    pub fn last(&self) -> i64 {
        self.last
    }

    /// Compute the key `hint` would receive, without changing state.
    ///
    /// `is_taken` reports whether a key is already held by another participant.
    /// An explicit hint that collides fails with
    /// [`Error::DuplicateOrderHint`]. Automatic keys step forward past taken
    /// keys.
    pub fn peek(&self, hint: Option<i64>, is_taken: impl Fn(OrderKey) -> bool) -> Result<OrderKey> {
        match hint {
            Some(hint) => {
                let key = hint
                    .checked_mul(HINT_SCALE)
                    .map(OrderKey)
                    .ok_or(Error::OrderOverflow)?;
                if is_taken(key) {
                    return Err(Error::DuplicateOrderHint { hint, key });
                }
                Ok(key)
            }
            None => {
                let mut key = self.last.checked_add(1).ok_or(Error::OrderOverflow)?;
                while is_taken(OrderKey(key)) {
                    key = key.checked_add(1).ok_or(Error::OrderOverflow)?;
                }
                Ok(OrderKey(key))
            }
        }
    }

    /// Record `key` as issued; automatic sequencing resumes after it.
    pub fn commit(&mut self, key: OrderKey) {
        self.last = key.0;
    }

    /// Compute and commit the next key.
    pub fn next_key(
        &mut self,
        hint: Option<i64>,
        is_taken: impl Fn(OrderKey) -> bool,
    ) -> Result<OrderKey> {
        let key = self.peek(hint, is_taken)?;
        self.commit(key);
        Ok(key)
    }
}
