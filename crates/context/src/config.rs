//! Context configuration.
//!
//! Defaults are fine for tests. Processes usually call
//! [`ContextConfig::from_env`], which reads:
//!
//! | variable | values | default |
//! |---|---|---|
//! | `FAULTLINE_CONTEXT_LABEL` | any string | `context` |
//! | `FAULTLINE_REMOTE_CHANGES` | `invalidate`, `refresh` | `invalidate` |
//! | `FAULTLINE_PRUNE_ON_SAVE` | `true`, `false` | `false` |

use core::str::FromStr;

use thiserror::Error;

pub const LABEL_VAR: &str = "FAULTLINE_CONTEXT_LABEL";
pub const REMOTE_CHANGES_VAR: &str = "FAULTLINE_REMOTE_CHANGES";
pub const PRUNE_ON_SAVE_VAR: &str = "FAULTLINE_PRUNE_ON_SAVE";

/// How a context reacts to a change another context committed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum RemoteChangePolicy {
    /// Turn the local copy back into a fault; unsaved local edits are lost.
    #[default]
    Invalidate,
    /// Re-fetch immediately and replay unsaved local edits on top.
    Refresh,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown remote change policy '{0}' (expected 'invalidate' or 'refresh')")]
pub struct UnknownPolicy(pub String);

impl FromStr for RemoteChangePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalidate" => Ok(RemoteChangePolicy::Invalidate),
            "refresh" => Ok(RemoteChangePolicy::Refresh),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Name used in log events.
    pub label: String,
    pub remote_changes: RemoteChangePolicy,
    /// Release clean, unreferenced entities after every save.
    pub prune_on_save: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            label: "context".to_string(),
            remote_changes: RemoteChangePolicy::default(),
            prune_on_save: false,
        }
    }
}

impl ContextConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key → value source. Unparseable values
    /// fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let label = lookup(LABEL_VAR)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(defaults.label);

        let remote_changes = match lookup(REMOTE_CHANGES_VAR) {
            None => defaults.remote_changes,
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(variable = REMOTE_CHANGES_VAR, "{err}, using default");
                defaults.remote_changes
            }),
        };

        let prune_on_save = match lookup(PRUNE_ON_SAVE_VAR) {
            None => defaults.prune_on_save,
            Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(
                    variable = PRUNE_ON_SAVE_VAR,
                    value = %raw,
                    "not a bool, using default"
                );
                defaults.prune_on_save
            }),
        };

        Self {
            label,
            remote_changes,
            prune_on_save,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_remote_changes(mut self, policy: RemoteChangePolicy) -> Self {
        self.remote_changes = policy;
        self
    }

    pub fn with_prune_on_save(mut self, prune: bool) -> Self {
        self.prune_on_save = prune;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(ContextConfig::from_lookup(lookup(&[])), ContextConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = ContextConfig::from_lookup(lookup(&[
            (LABEL_VAR, "people"),
            (REMOTE_CHANGES_VAR, " Refresh "),
            (PRUNE_ON_SAVE_VAR, "true"),
        ]));

        assert_eq!(config.label, "people");
        assert_eq!(config.remote_changes, RemoteChangePolicy::Refresh);
        assert!(config.prune_on_save);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let config = ContextConfig::from_lookup(lookup(&[
            (LABEL_VAR, "   "),
            (REMOTE_CHANGES_VAR, "merge"),
            (PRUNE_ON_SAVE_VAR, "yes"),
        ]));

        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn policy_parse_error_names_the_value() {
        let err = "merge".parse::<RemoteChangePolicy>().unwrap_err();
        assert_eq!(err, UnknownPolicy("merge".to_string()));
        assert!(err.to_string().contains("'merge'"));
    }
}
