//! Aggregation of independent failures.
//!
//! Batch workflows (publish/unpublish link lists) continue past individual
//! failures and return everything that went wrong at the end. `MultiError`
//! keeps the individual errors addressable instead of flattening them into
//! a joined string, so callers can still branch on error kind.

use std::error::Error;
use std::fmt;

/// A growable list of independent failures.
///
/// An empty `MultiError` is not an error; use [`MultiError::into_result`]
/// to collapse it at the end of a batch.
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

impl<E> MultiError<E> {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, err: E) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.errors.iter()
    }

    /// `Ok(())` if nothing was collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn into_inner(self) -> Vec<E> {
        self.errors
    }
}

impl<E> Default for MultiError<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> From<Vec<E>> for MultiError<E> {
    fn from(errors: Vec<E>) -> Self {
        Self { errors }
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl<E: fmt::Display + fmt::Debug> Error for MultiError<E> {}
