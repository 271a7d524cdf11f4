//! Range reconciliation: missing and excess codes for a declared range
//!
//! Every stored code lands in exactly one of two buckets, valid-in-range or
//! excess. Expected codes are the range values zero-padded to the padding
//! width: the longer bound, widened when most in-range codes were stored with
//! more zero padding than the bounds were declared with (`"1".."3"` over stored
//! `"001"` pads to three).

use crate::models::{ParsedRange, ProductRange, ReconciliationResult};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Compute missing and excess codes for `existing` against `start..=end`
///
/// Bounds that do not parse as non-negative integers, or `start > end`, mean
/// "no range configured" and yield an empty result.
pub fn reconcile<S: AsRef<str>>(existing: &[S], start: &str, end: &str) -> ReconciliationResult {
    match ProductRange::new(start, end).parse() {
        Some(range) => reconcile_parsed(existing, &range),
        None => ReconciliationResult::default(),
    }
}

/// Same as [`reconcile`] with bounds already parsed
pub fn reconcile_parsed<S: AsRef<str>>(existing: &[S], range: &ParsedRange) -> ReconciliationResult {
    let range = &effective_range(existing, range);
    let present: HashSet<&str> = existing.iter().map(|c| c.as_ref()).collect();

    let missing_codes = (range.start..=range.end)
        .map(|value| range.format(value))
        .filter(|code| !present.contains(code.as_str()))
        .collect();

    let mut seen = HashSet::with_capacity(existing.len());
    let excess_codes = existing
        .iter()
        .map(|c| c.as_ref())
        .filter(|code| seen.insert(*code))
        .filter(|code| !fits_range(code, range))
        .map(str::to_string)
        .collect();

    ReconciliationResult {
        missing_codes,
        excess_codes,
    }
}

/// Declared range with its width widened to the stored zero padding
///
/// The width is the most common length among distinct numeric codes whose
/// value lies inside the bounds, never narrower than the declared width. Ties
/// go to the narrower length, so one over-padded scan cannot move the width.
pub fn effective_range<S: AsRef<str>>(existing: &[S], declared: &ParsedRange) -> ParsedRange {
    let mut lengths: HashMap<usize, usize> = HashMap::new();
    existing
        .iter()
        .map(|c| c.as_ref())
        .filter(|code| crate::extract::is_usable(code))
        .filter(|code| code.parse::<u64>().is_ok_and(|v| declared.contains(v)))
        .collect::<HashSet<_>>()
        .into_iter()
        .for_each(|code| *lengths.entry(code.len()).or_default() += 1);
    let stored = lengths
        .into_iter()
        .max_by_key(|&(len, count)| (count, Reverse(len)))
        .map_or(0, |(len, _)| len);
    ParsedRange {
        width: declared.width.max(stored),
        ..*declared
    }
}

/// Padding width used to reconcile `existing` against `start..=end`
pub fn padding_width<S: AsRef<str>>(existing: &[S], start: &str, end: &str) -> Option<usize> {
    ProductRange::new(start, end)
        .parse()
        .map(|declared| effective_range(existing, &declared).width)
}

/// Numeric, correctly padded, and within bounds
pub fn fits_range(code: &str, range: &ParsedRange) -> bool {
    if code.len() != range.width || !crate::extract::is_usable(code) {
        return false;
    }
    // digit strings too long for u64 are necessarily out of range
    code.parse::<u64>().is_ok_and(|value| range.contains(value))
}

/// Distinct stored codes that are valid and in range
pub fn count_valid<S: AsRef<str>>(existing: &[S], range: &ParsedRange) -> usize {
    let range = &effective_range(existing, range);
    existing
        .iter()
        .map(|c| c.as_ref())
        .filter(|code| fits_range(code, range))
        .collect::<HashSet<_>>()
        .len()
}

/// `min(100, round(100 * matched / required))`, 0 when nothing is required
pub fn completion_rate(matched: usize, required: u64) -> u8 {
    if required == 0 {
        return 0;
    }
    let pct = (100.0 * matched as f64 / required as f64).round();
    pct.min(100.0) as u8
}

/// Reconciliation of one product, with the figures the quality summary needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReport {
    /// Product identifier
    pub product_id: String,
    /// Whether the product declares a parseable range
    pub range_configured: bool,
    /// Codes the range expects (0 when unconfigured)
    pub expected: u64,
    /// Distinct stored codes that are valid and in range
    pub valid: usize,
    /// Stored codes considered (after dedup)
    pub total_codes: usize,
    /// Target quantity; falls back to `expected` when zero
    pub required_quantity: u64,
    /// Missing and excess codes
    pub result: ReconciliationResult,
}

impl ProductReport {
    /// Reconcile a product's stored codes against its optional range
    pub fn build<S: AsRef<str>>(
        product_id: impl Into<String>,
        existing: &[S],
        range: Option<&ProductRange>,
        required_quantity: u64,
    ) -> Self {
        let parsed = range.and_then(ProductRange::parse);
        let total_codes = existing
            .iter()
            .map(|c| c.as_ref())
            .collect::<HashSet<_>>()
            .len();

        let (expected, valid, result) = match &parsed {
            Some(range) => (
                range.len(),
                count_valid(existing, range),
                reconcile_parsed(existing, range),
            ),
            None => (0, 0, ReconciliationResult::default()),
        };

        Self {
            product_id: product_id.into(),
            range_configured: parsed.is_some(),
            expected,
            valid,
            total_codes,
            required_quantity,
            result,
        }
    }

    /// Completion percentage against the required quantity (or the range size)
    pub fn completion_rate(&self) -> u8 {
        let required = if self.required_quantity > 0 {
            self.required_quantity
        } else {
            self.expected
        };
        completion_rate(self.valid, required)
    }
}

/// Coarse grade for a quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    /// score >= 90
    Excellent,
    /// score >= 70
    Good,
    /// score >= 50
    Fair,
    /// below 50
    Poor,
}

impl QualityGrade {
    /// Grade for a 0-100 score
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => QualityGrade::Excellent,
            70..=89 => QualityGrade::Good,
            50..=69 => QualityGrade::Fair,
            _ => QualityGrade::Poor,
        }
    }
}

/// Data-quality figures aggregated over many products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Products considered
    pub total_products: usize,
    /// Products with a configured range
    pub valid_products: usize,
    /// Sum of missing codes
    pub total_missing: usize,
    /// Sum of excess codes
    pub total_excess: usize,
    /// Products with at least one missing code
    pub products_with_missing: usize,
    /// Products with at least one excess code
    pub products_with_excess: usize,
    /// Mean completion rate over valid products, one decimal
    pub avg_completeness: f64,
    /// Excess codes as a percentage of all stored codes, one decimal
    pub excess_ratio: f64,
    /// Weighted score 0-100
    pub quality_score: u8,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl QualitySummary {
    /// Aggregate product reports
    pub fn from_reports(reports: &[ProductReport]) -> Self {
        let valid: Vec<&ProductReport> = reports.iter().filter(|r| r.range_configured).collect();
        let total_missing = reports.iter().map(|r| r.result.missing_codes.len()).sum();
        let total_excess: usize = reports.iter().map(|r| r.result.excess_codes.len()).sum();
        let total_codes: usize = reports.iter().map(|r| r.total_codes).sum();

        let avg_completeness = if valid.is_empty() {
            0.0
        } else {
            let sum: f64 = valid.iter().map(|r| r.completion_rate() as f64).sum();
            round1(sum / valid.len() as f64)
        };
        let excess_ratio = if total_codes == 0 {
            0.0
        } else {
            round1(100.0 * total_excess as f64 / total_codes as f64)
        };
        let score = avg_completeness * 0.7 + (100.0 - excess_ratio.min(100.0)) * 0.3;

        Self {
            total_products: reports.len(),
            valid_products: valid.len(),
            total_missing,
            total_excess,
            products_with_missing: reports.iter().filter(|r| r.result.has_missing()).count(),
            products_with_excess: reports.iter().filter(|r| r.result.has_excess()).count(),
            avg_completeness,
            excess_ratio,
            quality_score: score.round().clamp(0.0, 100.0) as u8,
        }
    }

    /// Grade of the quality score
    pub fn grade(&self) -> QualityGrade {
        QualityGrade::from_score(self.quality_score)
    }
}
