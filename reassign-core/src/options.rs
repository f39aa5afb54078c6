//! Tunables for one reassignment invocation.

/// Configuration for [`crate::driver::reassign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// When `true`, prior state for an operator absent from the new topology
    /// is skipped (and recorded as a [`reassign_model::Diagnostic`]) instead
    /// of aborting the whole reassignment.
    pub allow_non_restored_state: bool,
    /// Initial capacity hint for the diagnostics buffer. Purely an
    /// allocation efficiency hint; has no effect on behavior.
    pub diagnostics_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_non_restored_state: false,
            diagnostics_capacity: 16,
        }
    }
}
