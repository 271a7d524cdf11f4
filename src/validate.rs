//! Business check of a cleaned code against the product's stored codes

/// Outcome of [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Not yet stored for this product
    Valid,
    /// Already stored verbatim for this product
    DuplicateInProduct,
}

/// DuplicateInProduct iff `code` is present verbatim in `existing`
pub fn validate<S: AsRef<str>>(code: &str, existing: &[S]) -> Validation {
    if existing.iter().any(|c| c.as_ref() == code) {
        Validation::DuplicateInProduct
    } else {
        Validation::Valid
    }
}
