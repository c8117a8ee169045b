//! Pluggable sandboxing profile attachments.
//!
//! A profile attachment is an independently creatable artifact attached to a
//! build: under the base policy it is a no-op, under the hardened policy it
//! materializes a restricted syscall-allowlist document into the target
//! directory before the build starts and contributes the runtime flags that
//! reference it.

use std::path::Path;

use crate::error::{Result, SecportError};
use crate::templates;

/// File name of the materialized syscall-allowlist document.
pub const SECCOMP_PROFILE_FILE: &str = "seccomp.json";

/// A sandboxing profile attached to one build.
pub trait ProfileAttachment: Send + Sync {
    /// Write any profile documents into the target directory. Runs before
    /// the build starts; idempotent.
    fn materialize(&self, dir: &Path) -> Result<()>;

    /// Extra arguments passed to the container instantiation step so the
    /// materialized profile is applied.
    fn run_arguments(&self, dir: &Path) -> Vec<String>;
}

/// The base policy attachment: attaches nothing.
pub struct NoProfile;

impl ProfileAttachment for NoProfile {
    fn materialize(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn run_arguments(&self, _dir: &Path) -> Vec<String> {
        Vec::new()
    }
}

/// Hardened policy attachment: a seccomp allowlist without networking
/// syscalls, written next to the generated build files.
pub struct RestrictedSeccompProfile;

impl ProfileAttachment for RestrictedSeccompProfile {
    fn materialize(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SECCOMP_PROFILE_FILE);
        std::fs::write(&path, templates::RESTRICTED_SECCOMP_PROFILE)
            .map_err(|e| SecportError::io(path, e))
    }

    fn run_arguments(&self, dir: &Path) -> Vec<String> {
        vec![
            "--security-opt".to_string(),
            format!("seccomp={}", dir.join(SECCOMP_PROFILE_FILE).display()),
        ]
    }
}
