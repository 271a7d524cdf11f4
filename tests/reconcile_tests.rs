//! Reconciliation and extraction properties
//!
//! Randomized cases use a fixed-seed generator so failures reproduce.

use codescan::extract::{best_digit_run, extract, is_usable};
use codescan::models::ProductRange;
use codescan::reconcile::{
    ProductReport, QualityGrade, QualitySummary, completion_rate, count_valid, padding_width,
    reconcile,
};
use codescan::validate::{Validation, validate};
use std::collections::HashSet;

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// A messy stored-code list: padded, unpadded, out of range, garbage, repeats
fn random_codes(rng: &mut Lcg, start: u64, end: u64, width: usize) -> Vec<String> {
    let count = rng.below(40) as usize;
    (0..count)
        .map(|_| match rng.below(6) {
            0 => format!("{:0width$}", start + rng.below(end - start + 1)),
            1 => (start + rng.below(end - start + 1)).to_string(),
            2 => format!("{:0width$}", end + 1 + rng.below(50)),
            3 => format!("SN{}", rng.below(1000)),
            4 => String::new(),
            _ => format!("{:0w$}", start + rng.below(end - start + 1), w = width + 1),
        })
        .collect()
}

#[test]
fn reference_examples() {
    let result = reconcile(&["001", "003"], "1", "3");
    assert_eq!(result.missing_codes, vec!["002"]);
    assert!(result.excess_codes.is_empty());

    let result = reconcile(&["1", "2", "5"], "1", "3");
    assert_eq!(result.missing_codes, vec!["3"]);
    assert_eq!(result.excess_codes, vec!["5"]);
}

#[test]
fn one_over_padded_code_keeps_declared_width() {
    let result = reconcile(&["1", "2", "0003"], "1", "3");
    assert_eq!(result.missing_codes, vec!["3"]);
    assert_eq!(result.excess_codes, vec!["0003"]);
    assert_eq!(padding_width(&["1", "2", "0003"], "1", "3"), Some(1));

    // most stored codes padded wider: follow them
    let result = reconcile(&["001", "003", "2"], "1", "3");
    assert_eq!(result.missing_codes, vec!["002"]);
    assert_eq!(result.excess_codes, vec!["2"]);
}

#[test]
fn full_u64_range_does_not_overflow() {
    let range = ProductRange::new("0", u64::MAX.to_string()).parse().unwrap();
    assert_eq!(range.len(), u64::MAX);
    assert!(ProductRange::new("-1", "3").parse().is_none());
}

#[test]
fn unparsable_or_inverted_bounds_are_empty() {
    for (start, end) in [("a", "3"), ("1", ""), ("5", "1"), ("-1", "3"), ("1.5", "3")] {
        let result = reconcile(&["1", "2"], start, end);
        assert!(result.missing_codes.is_empty(), "{start}..{end}");
        assert!(result.excess_codes.is_empty(), "{start}..{end}");
    }
}

#[test]
fn single_value_range() {
    let result = reconcile::<&str>(&[], "0007", "0007");
    assert_eq!(result.missing_codes, vec!["0007"]);
    assert_eq!(reconcile(&["0007"], "0007", "0007").missing_codes.len(), 0);
}

#[test]
fn completeness_and_partition_hold_for_random_inputs() {
    let mut rng = Lcg(0x5eed);
    for _ in 0..300 {
        let start = rng.below(500);
        let end = start + rng.below(60);
        let width = rng.below(3) as usize + end.to_string().len();
        let (start_s, end_s) = (format!("{start:0width$}"), end.to_string());
        let existing = random_codes(&mut rng, start, end, width);

        let result = reconcile(&existing, &start_s, &end_s);
        let range = ProductRange::new(&start_s, &end_s).parse().unwrap();
        let valid = count_valid(&existing, &range);

        // missing + valid covers the range exactly once
        assert_eq!(
            result.missing_codes.len() + valid,
            (end - start + 1) as usize,
            "existing={existing:?} range={start_s}..{end_s}"
        );

        // missing never intersects what is stored
        let stored: HashSet<&str> = existing.iter().map(String::as_str).collect();
        assert!(result.missing_codes.iter().all(|m| !stored.contains(m.as_str())));

        // each distinct stored code is valid or excess, never both
        let excess: HashSet<&str> = result.excess_codes.iter().map(String::as_str).collect();
        assert_eq!(excess.len(), result.excess_codes.len(), "excess has duplicates");
        assert_eq!(excess.len() + valid, stored.len());

        // all missing codes share one width
        let width = padding_width(&existing, &start_s, &end_s).unwrap();
        assert!(result.missing_codes.iter().all(|m| m.len() == width));
        assert!(result.missing_codes.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(reconcile(&existing, &start_s, &end_s), result);
    }
}

#[test]
fn excess_keeps_input_order() {
    let result = reconcile(&["9", "x", "1", "9", "0"], "1", "3");
    assert_eq!(result.excess_codes, vec!["9", "x", "0"]);
    assert_eq!(result.missing_codes, vec!["2", "3"]);
}

#[test]
fn completion_rate_bounds() {
    assert_eq!(completion_rate(0, 0), 0);
    assert_eq!(completion_rate(5, 0), 0);
    assert_eq!(completion_rate(1, 3), 33);
    assert_eq!(completion_rate(2, 3), 67);
    assert_eq!(completion_rate(10, 3), 100);
}

#[test]
fn quality_summary_over_products() {
    let complete = ProductReport::build("a", &["1", "2", "3"], Some(&ProductRange::new("1", "3")), 0);
    let partial = ProductReport::build("b", &["01", "99"], Some(&ProductRange::new("1", "4")), 0);
    let unconfigured = ProductReport::build("c", &["7"], None, 0);
    assert_eq!(complete.completion_rate(), 100);
    assert_eq!(partial.completion_rate(), 25);

    let summary = QualitySummary::from_reports(&[complete, partial, unconfigured]);
    assert_eq!(summary.total_products, 3);
    assert_eq!(summary.valid_products, 2);
    assert_eq!(summary.total_missing, 3);
    assert_eq!(summary.total_excess, 1);
    assert_eq!(summary.products_with_missing, 1);
    assert_eq!(summary.products_with_excess, 1);
    assert_eq!(summary.avg_completeness, 62.5);
    assert_eq!(summary.excess_ratio, 16.7);
    // 62.5 * 0.7 + 83.3 * 0.3 = 68.74
    assert_eq!(summary.quality_score, 69);
    assert_eq!(summary.grade(), QualityGrade::Fair);
}

#[test]
fn extract_examples() {
    assert_eq!(extract("HTSM1/3SN69801"), "69801");
    assert_eq!(extract("https://example.com/p?id=00123"), "00123");
    assert_eq!(extract("A1B2C"), "12");
    assert_eq!(extract("  no digits  "), "no digits");
    assert!(!is_usable(&extract("no digits")));
}

#[test]
fn extract_is_idempotent_on_digits() {
    let mut rng = Lcg(42);
    for _ in 0..200 {
        let len = rng.below(12) as usize + 1;
        let code: String = (0..len)
            .map(|_| char::from(b'0' + rng.below(10) as u8))
            .collect();
        assert_eq!(extract(&code), code);
        assert_eq!(extract(&extract(&code)), code);
    }
}

#[test]
fn text_recognition_picks_serial() {
    assert_eq!(best_digit_run("MODEL 12 SERIAL 004512", 3), Some("004512"));
    assert_eq!(best_digit_run("12 34", 3), None);
}

#[test]
fn duplicate_is_verbatim() {
    let existing = vec!["0042".to_string()];
    assert_eq!(validate("0042", &existing), Validation::DuplicateInProduct);
    assert_eq!(validate("42", &existing), Validation::Valid);
}
