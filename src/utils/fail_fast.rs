//! Fail-fast step runner with a finalize step that always runs
//!
//! Phase one runs fallible steps until the first one fails; later steps are
//! skipped. Phase two runs exactly one finalize step regardless of phase one.
//! The first error seen across both phases is returned.

pub struct FailFast<E> {
    first_err: Option<E>,
}

impl<E> FailFast<E> {
    pub fn new() -> Self {
        Self { first_err: None }
    }

    /// Run `step` unless an earlier step already failed
    pub fn step<F>(&mut self, step: F)
    where
        F: FnOnce() -> Result<(), E>,
    {
        if self.first_err.is_some() {
            return;
        }
        if let Err(e) = step() {
            self.first_err = Some(e);
        }
    }

    pub fn has_failed(&self) -> bool {
        self.first_err.is_some()
    }

    /// Run the finalize step and return the first error of the whole sequence
    pub fn finish<F>(self, finalize: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let finalized = finalize();
        match self.first_err {
            Some(e) => Err(e),
            None => finalized,
        }
    }
}

impl<E> Default for FailFast<E> {
    fn default() -> Self {
        Self::new()
    }
}
