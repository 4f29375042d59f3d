//! Process-wide write-protection context (§4.A, §9 "Global state").
//!
//! The flag is not a hidden singleton: every component that can reach a
//! mutating Notion call is constructed with a [`WriteProtection`] handle and
//! consults it itself.

use cortex_domain::DomainError;

#[derive(Debug, Clone, Copy)]
pub struct WriteProtection {
    enabled: bool,
}

impl WriteProtection {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled() -> Self {
        Self::new(true)
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Vetoes the named mutating call when write-protection is on.
    pub fn guard(&self, call: &str) -> Result<(), DomainError> {
        if self.enabled {
            Err(DomainError::WriteProtected(call.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_vetoes_when_enabled() {
        let wp = WriteProtection::enabled();
        assert!(wp.guard("notion.update_page").is_err());
    }

    #[test]
    fn test_guard_allows_when_disabled() {
        let wp = WriteProtection::disabled();
        assert!(wp.guard("notion.update_page").is_ok());
    }
}
