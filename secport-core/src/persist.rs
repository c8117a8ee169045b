//! Materialization of generated build and provisioning files.
//!
//! Writes the rendered instruction set, the VM definition and any
//! language-specific package manifests into the target directory, verifying
//! each write by reading it back. Deletion is the inverse and tolerates
//! files that were never created.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::discovery::Target;
use crate::error::{Result, SecportError};
use crate::instruction::BuildInstructionSet;
use crate::profile::SECCOMP_PROFILE_FILE;
use crate::runtime::Language;
use crate::templates;

pub const DOCKERFILE: &str = "Dockerfile";
pub const VAGRANTFILE: &str = "Vagrantfile";
/// Directory synced out of the VM where provisioning results land.
pub const VM_RESULT_DIR: &str = "vagrant_result";

/// Package manifest file names that may be generated next to the build file.
const MANIFEST_FILES: &[&str] =
    &["requirements.txt", "Gemfile", "composer.json", ".eslintrc.json", "build.properties"];

fn write_verified(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| SecportError::io(path, e))?;
    let read_back = fs::read_to_string(path).map_err(|e| SecportError::io(path, e))?;
    if read_back != content {
        return Err(SecportError::PersistenceMismatch { path: path.to_path_buf() });
    }
    Ok(())
}

/// The package manifest for a target's language, if its ecosystem installer
/// consumes one.
fn manifest_for(target: &Target) -> Option<(&'static str, String)> {
    let profile = target.language.profile();
    match target.language {
        Language::Python => Some(("requirements.txt", templates::REQUIREMENTS_TXT.to_string())),
        Language::Ruby => {
            let gems: Vec<&str> = profile.specific_tools.iter().map(|(name, _)| *name).collect();
            Some(("Gemfile", templates::gemfile(&gems)))
        }
        Language::Php => Some(("composer.json", templates::composer_json(profile.specific_tools))),
        Language::JavaScript => Some((".eslintrc.json", templates::ESLINT_RC.to_string())),
        Language::Java | Language::Kotlin => {
            Some(("build.properties", templates::GRADLE_BUILD_PROPERTIES.to_string()))
        }
        _ => None,
    }
}

/// Write every generated file for one target: the rendered build
/// instructions, the language's package manifest, the VM definition and the
/// result directory.
pub fn write_build_files(target: &Target, instructions: &BuildInstructionSet) -> Result<()> {
    write_verified(&target.dir.join(DOCKERFILE), &instructions.render())?;

    if let Some((name, content)) = manifest_for(target) {
        write_verified(&target.dir.join(name), &content)?;
    }

    let profile = target.language.profile();
    let sync_folder = fs::canonicalize(&target.dir).unwrap_or_else(|_| target.dir.clone());
    let provision_tool = profile.host_tools.first().copied().unwrap_or_default();
    let vagrantfile = templates::vagrantfile(
        &sync_folder.display().to_string(),
        &target.vm_name(),
        &profile.host_tools.join(" "),
        &templates::provision_commands(provision_tool, &target.source_files),
    );
    write_verified(&target.dir.join(VAGRANTFILE), &vagrantfile)?;

    let result_dir = target.dir.join(VM_RESULT_DIR);
    if !result_dir.exists() {
        fs::create_dir(&result_dir).map_err(|e| SecportError::io(result_dir, e))?;
    }
    debug!(tag = %target.tag, dir = %target.dir.display(), "build files written");
    Ok(())
}

fn remove_if_present(path: PathBuf) -> Result<()> {
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SecportError::io(path, e)),
    }
}

/// Delete every file [`write_build_files`] may have created for a target.
pub fn delete_build_files(target: &Target) -> Result<()> {
    remove_if_present(target.dir.join(DOCKERFILE))?;
    remove_if_present(target.dir.join(VAGRANTFILE))?;
    remove_if_present(target.dir.join(SECCOMP_PROFILE_FILE))?;
    for name in MANIFEST_FILES {
        remove_if_present(target.dir.join(name))?;
    }
    let result_dir = target.dir.join(VM_RESULT_DIR);
    if result_dir.exists() {
        fs::remove_dir_all(&result_dir).map_err(|e| SecportError::io(result_dir, e))?;
    }
    Ok(())
}
