//! Domain types for funnelcast-io.

use std::fmt;

use crate::IoError;

/// A validated run name used as the prefix of every output file.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunName(String);

impl RunName {
    /// Parse and validate a run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidRunName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidRunName { name });
        }
        Ok(Self(name))
    }

    /// Return the run name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_name_valid() {
        let name = RunName::new("q3-referral_test").unwrap();
        assert_eq!(name.as_str(), "q3-referral_test");
        assert_eq!(name.to_string(), "q3-referral_test");
    }

    #[test]
    fn run_name_rejects_empty() {
        assert!(matches!(RunName::new(""), Err(IoError::InvalidRunName { .. })));
    }

    #[test]
    fn run_name_rejects_special_chars() {
        assert!(matches!(
            RunName::new("../escape"),
            Err(IoError::InvalidRunName { .. })
        ));
        assert!(matches!(
            RunName::new("with space"),
            Err(IoError::InvalidRunName { .. })
        ));
    }
}
