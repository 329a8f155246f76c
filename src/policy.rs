//! Migration policy.

use crate::config::ConfigError;

/// Whether gradual migration is on, and what share of eligible requests the
/// new backend receives.
///
/// Built once at startup and read by every request without synchronisation.
/// A disabled policy always reports `percent() == 0`, whatever value was
/// configured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MigrationPolicy {
    enabled: bool,
    percent: u8,
}

impl MigrationPolicy {
    /// Migration off: every eligible request stays on the legacy backend.
    pub const fn disabled() -> Self {
        Self { enabled: false, percent: 0 }
    }

    /// Migration on, sending `percent`% of eligible requests to the new backend.
    pub fn enabled(percent: u8) -> Result<Self, ConfigError> {
        if percent > 100 {
            return Err(ConfigError::InvalidPercent(percent.to_string()));
        }
        Ok(Self { enabled: true, percent })
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn percent(&self) -> u8 {
        if self.enabled { self.percent } else { 0 }
    }
}

impl Default for MigrationPolicy {
    fn default() -> Self { Self::disabled() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_reports_zero() {
        let p = MigrationPolicy::disabled();
        assert!(!p.is_enabled());
        assert_eq!(p.percent(), 0);
    }

    #[test]
    fn enabled_accepts_inclusive_bounds() {
        assert_eq!(MigrationPolicy::enabled(0).unwrap().percent(), 0);
        assert_eq!(MigrationPolicy::enabled(100).unwrap().percent(), 100);
    }

    #[test]
    fn enabled_rejects_over_one_hundred() {
        assert!(matches!(
            MigrationPolicy::enabled(101),
            Err(ConfigError::InvalidPercent(v)) if v == "101"
        ));
    }
}
