//! Active environment resolution
//!
//! The client only cares whether it runs in the `local` environment: there,
//! TLS verification is disabled and fixtures may replace failed requests.

use std::env;

/// Name of the local development environment
pub const LOCAL_ENVIRONMENT: &str = "local";

/// Default variable read by `EnvVarEnvironment`
pub const DEFAULT_ENVIRONMENT_VAR: &str = "APP_ENV";

/// Resolves the name of the environment the client runs in
pub trait EnvironmentResolver: Send + Sync {
    fn active_environment_name(&self) -> String;

    fn is_local(&self) -> bool {
        self.active_environment_name() == LOCAL_ENVIRONMENT
    }
}

/// An environment name fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEnvironment(String);

impl StaticEnvironment {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn local() -> Self {
        Self::new(LOCAL_ENVIRONMENT)
    }
}

impl EnvironmentResolver for StaticEnvironment {
    fn active_environment_name(&self) -> String {
        self.0.clone()
    }
}

/// Reads the environment name from a process environment variable
///
/// The variable is read on every call, falling back to `default` when it is
/// unset or empty.
#[derive(Debug, Clone)]
pub struct EnvVarEnvironment {
    var: String,
    default: String,
}

impl EnvVarEnvironment {
    pub fn new(var: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            default: default.into(),
        }
    }
}

impl Default for EnvVarEnvironment {
    fn default() -> Self {
        Self::new(DEFAULT_ENVIRONMENT_VAR, "prod")
    }
}

impl EnvironmentResolver for EnvVarEnvironment {
    fn active_environment_name(&self) -> String {
        match env::var(&self.var) {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_environment_local() {
        let resolver = StaticEnvironment::local();
        assert_eq!(resolver.active_environment_name(), "local");
        assert!(resolver.is_local());
        assert!(!StaticEnvironment::new("prod").is_local());
    }

    #[test]
    fn test_env_var_environment_reads_variable() {
        let var = "APIFETCH_TEST_ENV_READS";
        env::set_var(var, "local");
        let resolver = EnvVarEnvironment::new(var, "prod");
        assert!(resolver.is_local());
        env::remove_var(var);
    }

    #[test]
    fn test_env_var_environment_falls_back_to_default() {
        let var = "APIFETCH_TEST_ENV_UNSET";
        env::remove_var(var);
        let resolver = EnvVarEnvironment::new(var, "staging");
        assert_eq!(resolver.active_environment_name(), "staging");

        env::set_var(var, "   ");
        assert_eq!(resolver.active_environment_name(), "staging");
        env::remove_var(var);
    }
}
