//! Run configuration and security policy selection.
//!
//! A [`RunConfig`] can be loaded from a YAML file; command-line flags are
//! merged over it by the caller. The [`SecurityPolicy`] selects the
//! image allow-list / profile-attachment pair composed into the coordinator;
//! the synthesis algorithm itself is shared between policies.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SecportError};
use crate::profile::{NoProfile, ProfileAttachment, RestrictedSeccompProfile};

/// Security posture for generated environments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityPolicy {
    /// Broad runtime allow-list, no sandboxing profile attachments.
    #[default]
    Simple,
    /// Restricted allow-list plus a materialized syscall-allowlist profile.
    Customized,
}

impl SecurityPolicy {
    /// Runtimes this policy permits as base images.
    pub fn allowed_runtimes(&self) -> &'static [&'static str] {
        match self {
            SecurityPolicy::Simple => &[
                "ubuntu", "python", "ruby", "haskell", "java", "golang", "php", "node", "rust",
                "bash", "swipl",
            ],
            SecurityPolicy::Customized => &["ubuntu"],
        }
    }

    /// Policy-pinned image version for a runtime, if any.
    pub fn pinned_version(&self, runtime: &str) -> Option<&'static str> {
        match (self, runtime) {
            (SecurityPolicy::Simple, "php") => Some("7.4-cli"),
            _ => None,
        }
    }

    /// The sandboxing profile attached to builds under this policy.
    pub fn attachment(&self) -> Box<dyn ProfileAttachment> {
        match self {
            SecurityPolicy::Simple => Box::new(NoProfile),
            SecurityPolicy::Customized => Box::new(RestrictedSeccompProfile),
        }
    }

    /// Parse from a CLI-supplied name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "simple" => Ok(SecurityPolicy::Simple),
            "customized" => Ok(SecurityPolicy::Customized),
            other => Err(SecportError::InvalidConfig {
                reason: format!("unknown security policy '{other}' (expected simple|customized)"),
            }),
        }
    }
}

/// Configuration for one coordinator run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Hard bound on simultaneously running external build/provision
    /// processes; targets are processed in groups of this size.
    pub max_concurrent: usize,
    /// Security posture selecting allow-list and profile attachments.
    pub security: SecurityPolicy,
    /// Skip pruning images/containers and destroying VMs during cleanup.
    pub keep_artifacts: bool,
    /// Skip the VM provisioning phase entirely.
    pub skip_vms: bool,
    /// Suppress streamed third-party tool output.
    pub quiet: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            security: SecurityPolicy::Simple,
            keep_artifacts: false,
            skip_vms: false,
            quiet: false,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SecportError::io(path, e))?;
        serde_yaml::from_str(&raw).map_err(|e| SecportError::InvalidConfig {
            reason: format!("{}: {e}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.security, SecurityPolicy::Simple);
        assert!(!config.skip_vms);
    }

    #[test]
    fn test_policy_allow_lists_differ() {
        assert!(SecurityPolicy::Simple.allowed_runtimes().contains(&"python"));
        assert_eq!(SecurityPolicy::Customized.allowed_runtimes(), &["ubuntu"]);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(SecurityPolicy::parse("Simple").unwrap(), SecurityPolicy::Simple);
        assert_eq!(SecurityPolicy::parse("customized").unwrap(), SecurityPolicy::Customized);
        assert!(SecurityPolicy::parse("hardened").is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let parsed: RunConfig =
            serde_yaml::from_str("max_concurrent: 4\nsecurity: customized\n").unwrap();
        assert_eq!(parsed.max_concurrent, 4);
        assert_eq!(parsed.security, SecurityPolicy::Customized);
        // unset fields fall back to defaults
        assert!(!parsed.quiet);
    }
}
