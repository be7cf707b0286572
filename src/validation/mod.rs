//! Post-expansion validation.
//!
//! Runs on the fully expanded program, before evaluation. Findings are
//! collected into a [`ValidationResult`] so a caller can see all of them;
//! the pipeline stops at the first one.

pub mod names;

pub use names::validate_names;

use crate::errors::QuillError;

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<QuillError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: QuillError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first finding, if any.
    pub fn into_result(self) -> Result<(), QuillError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
