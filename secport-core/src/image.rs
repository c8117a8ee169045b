//! Base image resolution for generated build files.
//!
//! Maps a runtime identifier (e.g. "ubuntu", "python") to a concrete `FROM`
//! line, the package manager of that image family, and the language-specific
//! package installer, if any. Resolution is gated by a policy-supplied
//! allow-list; a disallowed runtime is a configuration-time error for that
//! target only.

use crate::error::{Result, SecportError};

/// OS-level package manager of an image family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Apk,
    Dnf,
    Yum,
}

impl PackageManager {
    /// The command invoked inside the image.
    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Apk => "apk",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }
}

/// Language-ecosystem package installer, where the runtime ships one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageInstaller {
    Pip,
    Npm,
    Composer,
    Gem,
    Stack,
}

/// A resolved base image: the `FROM` line plus inferred tooling.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// Complete `FROM <image>:<tag>` line.
    pub from_line: String,
    /// Package manager of the image family; `None` for runtimes that need none.
    pub package_manager: Option<PackageManager>,
    /// Language-specific installer shipped with the runtime, if any.
    pub installer: Option<LanguageInstaller>,
}

/// Infer the package manager and language installer for a runtime identifier.
///
/// Total over all identifiers: unrecognized runtimes simply carry no package
/// manager, which is valid (some images need none).
pub fn infer_tooling(runtime: &str) -> (Option<PackageManager>, Option<LanguageInstaller>) {
    match runtime {
        "ubuntu" | "debian" => (Some(PackageManager::Apt), None),
        "centos" => (Some(PackageManager::Yum), None),
        "fedora" => (Some(PackageManager::Dnf), None),
        "python" => (Some(PackageManager::Apk), Some(LanguageInstaller::Pip)),
        "java" => (Some(PackageManager::Apk), None),
        "haskell" => (Some(PackageManager::Apt), Some(LanguageInstaller::Stack)),
        "node" => (Some(PackageManager::Apt), Some(LanguageInstaller::Npm)),
        "php" => (Some(PackageManager::Apt), Some(LanguageInstaller::Composer)),
        "ruby" => (Some(PackageManager::Apk), Some(LanguageInstaller::Gem)),
        _ => (None, None),
    }
}

/// Resolve a runtime identifier against an allow-list into a base image.
///
/// With an explicit `version` the tag is `<runtime>:<version>`; otherwise the
/// default minimal variant of the image family is chosen, mirroring how each
/// family publishes its base images.
pub fn resolve_image(
    runtime: &str,
    allowed: &[&str],
    version: Option<&str>,
) -> Result<ResolvedImage> {
    if runtime.is_empty() || !allowed.contains(&runtime) {
        return Err(SecportError::UnsupportedRuntime {
            runtime: runtime.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        });
    }

    let (package_manager, installer) = infer_tooling(runtime);

    let tag = if let Some(version) = version {
        format!("{runtime}:{version}")
    } else {
        match package_manager {
            Some(PackageManager::Apk) if runtime != "alpine" => format!("{runtime}:alpine"),
            Some(PackageManager::Apt) if runtime != "debian" && runtime != "ubuntu" => {
                format!("{runtime}:buster")
            }
            Some(PackageManager::Yum) if runtime != "centos" => format!("{runtime}:centos"),
            Some(PackageManager::Dnf) if runtime != "fedora" => format!("{runtime}:fedora"),
            _ => format!("{runtime}:latest"),
        }
    };

    Ok(ResolvedImage { from_line: format!("FROM {tag}"), package_manager, installer })
}
