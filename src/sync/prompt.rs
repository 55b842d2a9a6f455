use crate::error::Result;

/// Answers yes/no questions the engine asks before creating or deleting
/// remote assets.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Says yes to everything (`-auto-approve`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Says no to everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Confirm for DenyAll {
    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(false)
    }
}
