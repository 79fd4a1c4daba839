//! Message identifiers and identifier sets.

use super::{SeqNum, Uid};
use std::fmt;

/// A single message identifier, either a sequence number or a UID.
///
/// Sequence numbers are positional and change across EXPUNGE; UIDs are
/// stable for the lifetime of a mailbox's UIDVALIDITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageIdentifier {
    /// A message sequence number.
    SequenceNumber(SeqNum),
    /// A message UID.
    Uid(Uid),
}

impl MessageIdentifier {
    /// Returns the raw `u32` value regardless of kind.
    #[must_use]
    pub fn value(self) -> u32 {
        match self {
            Self::SequenceNumber(s) => s.get(),
            Self::Uid(u) => u.get(),
        }
    }

    /// Returns true if this identifier is a UID.
    #[must_use]
    pub fn is_uid(self) -> bool {
        matches!(self, Self::Uid(_))
    }
}

/// A closed, inclusive range of raw identifier values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct ClosedRange {
    start: u32,
    end: u32,
}

impl ClosedRange {
    fn adjacent_or_overlapping(self, other: Self) -> bool {
        // Two ranges merge if they overlap or sit back-to-back (end+1 == start),
        // guarding against overflow at u32::MAX.
        if self.end < other.start {
            other.start - self.end <= 1
        } else if other.end < self.start {
            self.start - other.end <= 1
        } else {
            true
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Sentinel raw value standing for the IMAP `*` ("largest existing value")
/// wildcard, so a star can live inside an ordinary closed range.
const STAR: u32 = u32::MAX;

fn render_bound(value: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value == STAR {
        write!(f, "*")
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for ClosedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            render_bound(self.start, f)
        } else {
            render_bound(self.start, f)?;
            write!(f, ":")?;
            render_bound(self.end, f)
        }
    }
}

/// An ordered, non-overlapping union of closed ranges over a single
/// identifier kind (all sequence numbers, or all UIDs).
///
/// Maintains the invariant that `ranges` is sorted ascending and no two
/// ranges are adjacent or overlapping; every mutation re-normalizes via
/// [`Self::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageIdentifierSet<T> {
    ranges: Vec<ClosedRange>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> MessageIdentifierSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ranges: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns true if the set contains no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the total number of distinct identifier values in the set.
    #[must_use]
    pub fn cardinality(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| u64::from(r.end) - u64::from(r.start) + 1)
            .sum()
    }

    /// Returns true if `value` is contained in the set.
    #[must_use]
    pub fn contains_value(&self, value: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if value < r.start {
                    std::cmp::Ordering::Greater
                } else if value > r.end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    fn insert_range_raw(&mut self, start: u32, end: u32) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.ranges.push(ClosedRange { start, end });
        self.normalize();
    }

    fn normalize(&mut self) {
        self.ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<ClosedRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if last.adjacent_or_overlapping(range) => {
                    *last = last.merge(range);
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }

    /// Unions `other` into this set in place.
    pub fn union(&mut self, other: &Self) {
        self.ranges.extend_from_slice(&other.ranges);
        self.normalize();
    }

    /// Recasts this set to a different identifier kind, carrying the raw
    /// values over unchanged.
    ///
    /// The wire representation of a `MessageIdentifierSet` is just a union
    /// of ranges over raw `u32` values; whether those values are sequence
    /// numbers or UIDs is a caller-side convention carried by the `uid` flag
    /// on the command, not anything encoded in the set itself. This lets a
    /// UID set be handed to a command whose field happens to be typed for
    /// sequence numbers when `uid: true` is also set.
    #[must_use]
    pub fn recast<U>(self) -> MessageIdentifierSet<U> {
        MessageIdentifierSet {
            ranges: self.ranges,
            _marker: std::marker::PhantomData,
        }
    }
}

impl MessageIdentifierSet<SeqNum> {
    /// Inserts a single sequence number.
    pub fn insert(&mut self, value: SeqNum) {
        self.insert_range_raw(value.get(), value.get());
    }

    /// Inserts an inclusive range of sequence numbers.
    pub fn insert_range(&mut self, start: SeqNum, end: SeqNum) {
        self.insert_range_raw(start.get(), end.get());
    }

    /// Returns true if `value` is contained in the set.
    #[must_use]
    pub fn contains(&self, value: SeqNum) -> bool {
        self.contains_value(value.get())
    }
}

impl MessageIdentifierSet<Uid> {
    /// Inserts a single UID.
    pub fn insert(&mut self, value: Uid) {
        self.insert_range_raw(value.get(), value.get());
    }

    /// Inserts an inclusive range of UIDs.
    pub fn insert_range(&mut self, start: Uid, end: Uid) {
        self.insert_range_raw(start.get(), end.get());
    }

    /// Returns true if `value` is contained in the set.
    #[must_use]
    pub fn contains(&self, value: Uid) -> bool {
        self.contains_value(value.get())
    }
}

impl<T> fmt::Display for MessageIdentifierSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return write!(f, "");
        }
        let parts: Vec<String> = self.ranges.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    #[test]
    fn single_value_displays_bare() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert(seq(5));
        assert_eq!(set.to_string(), "5");
    }

    #[test]
    fn adjacent_ranges_merge() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert_range(seq(1), seq(3));
        set.insert_range(seq(4), seq(6));
        assert_eq!(set.to_string(), "1:6");
        assert_eq!(set.cardinality(), 6);
    }

    #[test]
    fn overlapping_ranges_merge() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert_range(seq(1), seq(10));
        set.insert_range(seq(5), seq(15));
        assert_eq!(set.to_string(), "1:15");
    }

    #[test]
    fn disjoint_ranges_stay_separate_and_sorted() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert(seq(20));
        set.insert_range(seq(1), seq(5));
        assert_eq!(set.to_string(), "1:5,20");
    }

    #[test]
    fn contains() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert_range(seq(1), seq(10));
        assert!(set.contains(seq(5)));
        assert!(!set.contains(seq(11)));
    }

    #[test]
    fn empty_set_displays_empty_and_has_zero_cardinality() {
        let set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        assert!(set.is_empty());
        assert_eq!(set.cardinality(), 0);
        assert_eq!(set.to_string(), "");
    }

    #[test]
    fn union_of_two_sets() {
        let mut a: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        a.insert_range(seq(1), seq(3));
        let mut b: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        b.insert_range(seq(4), seq(8));
        a.union(&b);
        assert_eq!(a.to_string(), "1:8");
    }

    #[test]
    fn message_identifier_value_and_kind() {
        let sid = MessageIdentifier::SequenceNumber(seq(3));
        let uid = MessageIdentifier::Uid(Uid::new(9).unwrap());
        assert_eq!(sid.value(), 3);
        assert!(!sid.is_uid());
        assert_eq!(uid.value(), 9);
        assert!(uid.is_uid());
    }
}
