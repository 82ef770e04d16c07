//! Engine configuration.

/// Configuration for the coordination engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When true, a join from a connection with no resolved identity mints an
    /// ephemeral guest user. When false such joins fail with
    /// `UNAUTHENTICATED`. Room creation never falls back to a guest.
    pub allow_anonymous_join: bool,
    /// Messages retained per room after a janitor sweep. Appends may exceed
    /// this between sweeps (bounded-but-not-strict ceiling).
    pub retention_limit: usize,
    /// Maximum concurrent connections; surplus connections are closed at
    /// accept.
    pub max_connections: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { allow_anonymous_join: true, retention_limit: 1000, max_connections: 10_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_system() {
        let config = EngineConfig::default();
        assert!(config.allow_anonymous_join);
        assert_eq!(config.retention_limit, 1000);
    }
}
