//! Target discovery: mapping input paths to per-language build targets.
//!
//! Walks the input files/directories, claims each source file for the
//! language owning its extension, and produces at most one [`Target`] per
//! language. The target directory is where the generated build files are
//! written and is used as the container build context and VM sync folder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SecportError};
use crate::runtime::Language;

/// Directory created by the VM tool inside a target; never scanned.
const VM_STATE_DIR: &str = ".vagrant";

/// One per-language build/test target.
#[derive(Debug, Clone)]
pub struct Target {
    pub language: Language,
    /// Directory holding the sources; build files are generated here.
    pub dir: PathBuf,
    /// Image/container tag, also the key in the live-process registry.
    pub tag: String,
    /// Source file names relative to `dir`, in discovery order.
    pub source_files: Vec<String>,
}

impl Target {
    fn new(language: Language, dir: PathBuf, source_files: Vec<String>) -> Self {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "secport".to_string());
        let tag = sanitize_tag(&format!("secport-{dir_name}-{language}"));
        Self { language, dir, tag, source_files }
    }

    /// Name of the portability VM for this target.
    pub fn vm_name(&self) -> String {
        format!("secport-{}", self.language)
    }
}

/// Lowercase and strip characters the container runtime rejects in tags.
fn sanitize_tag(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .collect()
}

fn is_hidden_state(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == VM_STATE_DIR)
}

/// Resolve input files and directories into per-language targets.
///
/// Directories are walked recursively; each language claims the parent
/// directory of its first discovered source file, and every further matching
/// file anywhere under the inputs is attributed to that target. No matching
/// file in any input is an error.
pub fn resolve_targets(inputs: &[PathBuf]) -> Result<Vec<Target>> {
    let mut claimed: BTreeMap<Language, (PathBuf, Vec<String>)> = BTreeMap::new();

    for input in inputs {
        for entry in WalkDir::new(input).follow_links(false) {
            let entry = entry.map_err(|e| {
                SecportError::io(input.clone(), e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk loop")
                }))
            })?;
            if !entry.file_type().is_file() || is_hidden_state(entry.path()) {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some(language) = Language::from_extension(&ext.to_lowercase()) else {
                continue;
            };
            let file_name = entry.file_name().to_string_lossy().to_string();
            let parent = entry
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input.clone());
            claimed
                .entry(language)
                .or_insert_with(|| {
                    debug!(%language, dir = %parent.display(), "discovered target");
                    (parent, Vec::new())
                })
                .1
                .push(file_name);
        }
    }

    if claimed.is_empty() {
        return Err(SecportError::NoTargets);
    }

    Ok(claimed
        .into_iter()
        .map(|(language, (dir, source_files))| Target::new(language, dir, source_files))
        .collect())
}
