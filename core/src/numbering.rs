//! Human-readable request numbers: `SAR-<year>-<seq>`.
//!
//! The sequence restarts every calendar year and is zero-padded to three digits
//! (`SAR-2025-004`). Wider sequences keep all their digits (`SAR-2025-1000`).
//! Allocation itself is done by the storage layer through
//! [`crate::store::AccessRequestStore::next_request_sequence`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Prefix of every request number.
pub const REQUEST_NUMBER_PREFIX: &str = "SAR";

/// A formatted, immutable request number.
///
/// Numbers order by `(year, sequence)`, so `SAR-2025-1000` follows `SAR-2025-999`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestNumber(String);

impl RequestNumber {
    /// Format the number for `sequence` within `year`.
    #[must_use]
    pub fn format(year: i32, sequence: u32) -> Self {
        Self(format!("{REQUEST_NUMBER_PREFIX}-{year}-{sequence:03}"))
    }

    /// Parse a stored number back into `(year, sequence)`.
    ///
    /// Returns `None` for anything not shaped like `SAR-<year>-<digits>`.
    #[must_use]
    pub fn parse(s: &str) -> Option<(i32, u32)> {
        let mut parts = s.splitn(3, '-');
        if parts.next()? != REQUEST_NUMBER_PREFIX {
            return None;
        }
        let year = parts.next()?;
        let sequence = parts.next()?;
        if year.len() != 4 || sequence.len() < 3 {
            return None;
        }
        if !year.bytes().all(|b| b.is_ascii_digit()) || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((year.parse().ok()?, sequence.parse().ok()?))
    }

    /// Wrap a number read back from storage.
    ///
    /// Returns `None` if it is not a valid request number.
    #[must_use]
    pub fn from_stored(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        Self::parse(&s).map(|_| Self(s))
    }

    /// The `SAR-<year>-` prefix shared by every number of that year.
    #[must_use]
    pub fn year_prefix(year: i32) -> String {
        format!("{REQUEST_NUMBER_PREFIX}-{year}-")
    }

    /// Borrow the formatted number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar year component.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        Self::parse(&self.0).map(|(year, _)| year)
    }

    /// Sequence component.
    #[must_use]
    pub fn sequence(&self) -> Option<u32> {
        Self::parse(&self.0).map(|(_, sequence)| sequence)
    }
}

impl Ord for RequestNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::parse(&self.0)
            .cmp(&Self::parse(&other.0))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RequestNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_to_three_digits() {
        assert_eq!(RequestNumber::format(2025, 4).as_str(), "SAR-2025-004");
        assert_eq!(RequestNumber::format(2025, 42).as_str(), "SAR-2025-042");
        assert_eq!(RequestNumber::format(2025, 1000).as_str(), "SAR-2025-1000");
    }

    #[test]
    fn parse_rejects_foreign_shapes() {
        assert_eq!(RequestNumber::parse("SAR-2025-004"), Some((2025, 4)));
        assert_eq!(RequestNumber::parse("REQ-2025-004"), None);
        assert_eq!(RequestNumber::parse("SAR-25-004"), None);
        assert_eq!(RequestNumber::parse("SAR-2025-04"), None);
        assert_eq!(RequestNumber::parse("SAR-2025-00a"), None);
        assert_eq!(RequestNumber::parse("SAR-2025"), None);
    }

    #[test]
    fn from_stored_validates() {
        assert!(RequestNumber::from_stored("SAR-2024-117").is_some());
        assert!(RequestNumber::from_stored("garbage").is_none());
    }

    #[test]
    fn wide_sequences_sort_after_padded_ones() {
        assert!(RequestNumber::format(2025, 1000) > RequestNumber::format(2025, 999));
        assert!(RequestNumber::format(2026, 1) > RequestNumber::format(2025, 1000));
    }

    #[test]
    fn year_prefix_matches_formatted_numbers() {
        let number = RequestNumber::format(2026, 7);
        assert!(number.as_str().starts_with(&RequestNumber::year_prefix(2026)));
    }

    proptest! {
        #[test]
        fn formatted_numbers_parse_back(year in 2000i32..=9999, sequence in 1u32..100_000) {
            let number = RequestNumber::format(year, sequence);
            prop_assert_eq!(number.year(), Some(year));
            prop_assert_eq!(number.sequence(), Some(sequence));
        }

        #[test]
        fn ordering_follows_sequence_within_year(a in 1u32..100_000, b in 1u32..100_000) {
            let left = RequestNumber::format(2025, a);
            let right = RequestNumber::format(2025, b);
            prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        }
    }
}
