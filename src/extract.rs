//! Code cleaning and extraction
//!
//! Decoded text arrives in many shapes: bare serials, URLs, labels such as
//! `HTSM1/3SN69801`. Codes are suffix-encoded, so a trailing run of digits
//! wins over concatenating every digit in the string.

/// Normalize raw decoded text into the canonical code form
///
/// 1. trailing digit run, if the text ends in one
/// 2. otherwise every digit, in order
/// 3. otherwise the trimmed input unchanged (no usable code)
pub fn extract(raw: &str) -> String {
    let trimmed = raw.trim();

    let tail_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    if let Some(start) = tail_start {
        return trimmed[start..].to_string();
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        trimmed.to_string()
    } else {
        digits
    }
}

/// Whether a cleaned value is a usable code (non-empty, digits only)
pub fn is_usable(cleaned: &str) -> bool {
    !cleaned.is_empty() && cleaned.bytes().all(|b| b.is_ascii_digit())
}

/// Strip everything but ASCII digits (manual entry path)
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Maximal runs of ASCII digits, in order of appearance
pub fn digit_runs(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}

/// Best serial candidate in free-form recognized text
///
/// Longest digit run of at least `min_len`; on a tie the later run wins,
/// matching the suffix preference of [`extract`].
pub fn best_digit_run(text: &str, min_len: usize) -> Option<&str> {
    digit_runs(text)
        .into_iter()
        .filter(|run| run.len() >= min_len.max(1))
        .fold(None, |best: Option<&str>, run| match best {
            Some(b) if b.len() > run.len() => Some(b),
            _ => Some(run),
        })
}
