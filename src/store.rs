//! Persistence collaborator seam
//!
//! The engine only ever reads a snapshot of a product's codes; adding,
//! restoring and deleting are the caller's business and go through this
//! trait. [`MemoryCodeStore`] is the reference implementation used by the CLI
//! and the tests.

use crate::error::StoreError;
use crate::extract::digits_only;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Outcome of [`CodeStore::add_code`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored as a new code
    Accepted,
    /// Was in the recycle bin and has been restored
    Restored,
    /// Refused
    Rejected(RejectReason),
}

/// Why a code was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An active code with the same value exists
    DuplicateCode,
    /// Nothing left after cleaning
    EmptyCode,
}

/// Code storage for products
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Active codes of a product
    async fn existing_codes(&self, product: &str) -> Result<Vec<String>, StoreError>;

    /// Store a code (digits only), restoring it if soft-deleted
    async fn add_code(&self, product: &str, code: &str) -> Result<AddOutcome, StoreError>;

    /// Move a code to the recycle bin
    async fn soft_delete_code(&self, product: &str, code: &str) -> Result<(), StoreError>;

    /// Bring a soft-deleted code back
    async fn restore_code(&self, product: &str, code: &str) -> Result<(), StoreError>;

    /// Remove a soft-deleted code for good
    async fn purge_code(&self, product: &str, code: &str) -> Result<(), StoreError>;

    /// Codes currently in the recycle bin
    async fn deleted_codes(&self, product: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
struct ProductCodes {
    active: Vec<String>,
    deleted: Vec<String>,
}

/// In-memory store keyed by product id
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    products: Mutex<HashMap<String, ProductCodes>>,
}

impl MemoryCodeStore {
    /// Empty store with no products
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product (no-op if it exists)
    pub fn add_product(&self, product: impl Into<String>) {
        self.with_products(|products| {
            products.entry(product.into()).or_default();
        });
    }

    /// Register a product with initial active codes, stored verbatim
    pub fn with_codes<I, S>(self, product: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_products(|products| {
            let entry = products.entry(product.into()).or_default();
            entry.active.extend(codes.into_iter().map(Into::into));
        });
        self
    }

    fn with_products<R>(&self, f: impl FnOnce(&mut HashMap<String, ProductCodes>) -> R) -> R {
        // a poisoned lock only means another thread panicked mid-update of a Vec
        let mut guard = self
            .products
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn with_product<R>(
        &self,
        product: &str,
        f: impl FnOnce(&mut ProductCodes) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.with_products(|products| match products.get_mut(product) {
            Some(codes) => f(codes),
            None => Err(StoreError::UnknownProduct(product.to_string())),
        })
    }
}

fn take(list: &mut Vec<String>, code: &str) -> Option<String> {
    let idx = list.iter().position(|c| c == code)?;
    Some(list.remove(idx))
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn existing_codes(&self, product: &str) -> Result<Vec<String>, StoreError> {
        self.with_product(product, |codes| Ok(codes.active.clone()))
    }

    async fn add_code(&self, product: &str, code: &str) -> Result<AddOutcome, StoreError> {
        let code = digits_only(code);
        self.with_product(product, |codes| {
            if code.is_empty() {
                return Ok(AddOutcome::Rejected(RejectReason::EmptyCode));
            }
            if codes.active.contains(&code) {
                return Ok(AddOutcome::Rejected(RejectReason::DuplicateCode));
            }
            if let Some(restored) = take(&mut codes.deleted, &code) {
                codes.active.push(restored);
                return Ok(AddOutcome::Restored);
            }
            codes.active.push(code);
            Ok(AddOutcome::Accepted)
        })
    }

    async fn soft_delete_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.with_product(product, |codes| {
            let removed =
                take(&mut codes.active, code).ok_or_else(|| StoreError::UnknownCode(code.to_string()))?;
            codes.deleted.push(removed);
            Ok(())
        })
    }

    async fn restore_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.with_product(product, |codes| {
            let restored =
                take(&mut codes.deleted, code).ok_or_else(|| StoreError::UnknownCode(code.to_string()))?;
            codes.active.push(restored);
            Ok(())
        })
    }

    async fn purge_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.with_product(product, |codes| {
            take(&mut codes.deleted, code)
                .map(|_| ())
                .ok_or_else(|| StoreError::UnknownCode(code.to_string()))
        })
    }

    async fn deleted_codes(&self, product: &str) -> Result<Vec<String>, StoreError> {
        self.with_product(product, |codes| Ok(codes.deleted.clone()))
    }
}
