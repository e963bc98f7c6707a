//! Range key definitions.
//!
//! A [`RangeKey`] is an inclusive byte interval. It is used both as the
//! identity of a cached entry and as a lookup query against the store.

use std::fmt;

use super::error::CacheError;

/// Inclusive byte interval `[start, end]`.
///
/// Equality and hashing are structural: two keys are equal only when both
/// endpoints match. Containment is a separate relation, see [`RangeKey::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeKey {
    start: u64,
    end: u64,
}

impl RangeKey {
    /// Build a key, rejecting `start > end` and an `end` of `u64::MAX`, whose
    /// inclusive length would not fit in a `u64`.
    pub fn new(start: u64, end: u64) -> Result<Self, CacheError> {
        if start > end || end == u64::MAX {
            return Err(CacheError::invalid_range(start, end));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by the interval.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: an inclusive interval covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when `self` fully covers `other`.
    pub fn contains(&self, other: &RangeKey) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// Offsets of `inner` relative to `self.start`, as a slice range.
    ///
    /// `None` unless `self` contains `inner` and the offsets fit in `usize`.
    pub(crate) fn relative_span(&self, inner: &RangeKey) -> Option<std::ops::Range<usize>> {
        if !self.contains(inner) {
            return None;
        }
        let from = usize::try_from(inner.start - self.start).ok()?;
        let to = usize::try_from(inner.end - self.start).ok()?.checked_add(1)?;
        Some(from..to)
    }

    /// Value for an HTTP `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(start: u64, end: u64) -> RangeKey {
        RangeKey::new(start, end).expect("valid range")
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(matches!(
            RangeKey::new(10, 9),
            Err(CacheError::InvalidRange { start: 10, end: 9 })
        ));
    }

    #[test]
    fn single_byte_range_has_len_one() {
        assert_eq!(key(7, 7).len(), 1);
        assert_eq!(key(0, 99).len(), 100);
    }

    #[test]
    fn containment_is_inclusive_on_both_ends() {
        let outer = key(50, 75);
        assert!(outer.contains(&key(50, 75)));
        assert!(outer.contains(&key(60, 70)));
        assert!(!outer.contains(&key(49, 75)));
        assert!(!outer.contains(&key(50, 76)));
    }

    #[test]
    fn relative_span_is_offset_from_container_start() {
        let outer = key(100, 199);
        assert_eq!(outer.relative_span(&key(150, 175)), Some(50..76));
        assert_eq!(outer.relative_span(&key(100, 100)), Some(0..1));
        assert_eq!(outer.relative_span(&key(99, 150)), None);
    }

    #[test]
    fn top_of_offset_space_is_rejected() {
        assert!(matches!(
            RangeKey::new(0, u64::MAX),
            Err(CacheError::InvalidRange {
                start: 0,
                end: u64::MAX
            })
        ));
        assert!(RangeKey::new(u64::MAX, u64::MAX).is_err());

        let widest = key(0, u64::MAX - 1);
        assert_eq!(widest.len(), u64::MAX);
        let tail = key(u64::MAX - 10, u64::MAX - 1);
        assert_eq!(tail.len(), 10);
        assert!(widest.contains(&tail));
    }

    #[test]
    fn header_value_uses_inclusive_bounds() {
        assert_eq!(key(0, 1023).header_value(), "bytes=0-1023");
    }
}
