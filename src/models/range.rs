use serde::{Deserialize, Serialize};

/// Declared numeric code range for a product
///
/// Bounds are kept as strings because their length carries the padding
/// width (`"001"..="120"` pads to three digits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRange {
    /// First code of the range
    pub start: String,
    /// Last code of the range
    pub end: String,
}

/// Range bounds parsed once per reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedRange {
    /// Numeric lower bound
    pub start: u64,
    /// Numeric upper bound (inclusive)
    pub end: u64,
    /// Zero-padding width for expected codes
    pub width: usize,
}

impl ParsedRange {
    /// Number of codes the range expects, saturating at `u64::MAX`
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// A parsed range always holds at least one code
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Zero-padded string for `value`
    pub fn format(&self, value: u64) -> String {
        format!("{:0width$}", value, width = self.width)
    }

    /// Whether `value` is within bounds
    pub fn contains(&self, value: u64) -> bool {
        (self.start..=self.end).contains(&value)
    }
}

impl ProductRange {
    /// Create a range from its bounds
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Padding width: the longer of the two bounds
    pub fn padding_width(&self) -> usize {
        self.start.trim().len().max(self.end.trim().len())
    }

    /// Parse the bounds; `None` means "no range configured"
    ///
    /// Bounds are unsigned digit strings that fit in a `u64`. Signs, blanks,
    /// and anything else are rejected and logged at debug level.
    pub fn parse(&self) -> Option<ParsedRange> {
        let start = parse_bound(&self.start)?;
        let end = parse_bound(&self.end)?;
        if start > end {
            tracing::debug!(start = %self.start, end = %self.end, "range start exceeds end");
            return None;
        }
        Some(ParsedRange {
            start,
            end,
            width: self.padding_width(),
        })
    }
}

fn parse_bound(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        tracing::debug!(bound = %raw, "range bound is not an unsigned integer");
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(bound = %raw, error = %err, "range bound out of range");
            None
        }
    }
}

/// Missing and excess codes for one product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Expected codes with no stored entry, ascending
    pub missing_codes: Vec<String>,
    /// Stored codes outside the range, non-numeric, or wrongly padded
    pub excess_codes: Vec<String>,
}

impl ReconciliationResult {
    /// True when any expected code is absent
    pub fn has_missing(&self) -> bool {
        !self.missing_codes.is_empty()
    }

    /// True when any stored code does not fit the range
    pub fn has_excess(&self) -> bool {
        !self.excess_codes.is_empty()
    }
}
