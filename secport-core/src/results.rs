//! Retrieval of analysis results from finished containers and VMs.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::discovery::Target;
use crate::persist::VM_RESULT_DIR;

/// Result artifacts the analysis instructions may have produced inside the
/// container's working directory.
const CONTAINER_ARTIFACTS: &[&str] = &["result.txt", "result.html", "result2.html", "result.json"];

/// Copy result artifacts out of a target's stopped container into the target
/// directory.
///
/// Best effort: which artifacts exist depends on the language's analyzers, so
/// a missing artifact is logged and skipped rather than treated as a failure.
pub async fn retrieve_container(target: &Target) {
    let Some(workdir) = target.language.profile().workdir() else {
        return;
    };
    for artifact in CONTAINER_ARTIFACTS {
        let source = format!("{}:{}/{}", target.tag, workdir, artifact);
        let status = Command::new("docker")
            .args(["cp", &source])
            .arg(&target.dir)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {
                info!(tag = %target.tag, artifact, "retrieved result");
            }
            Ok(_) => debug!(tag = %target.tag, artifact, "artifact not present"),
            Err(e) => debug!(tag = %target.tag, artifact, error = %e, "retrieval failed"),
        }
    }
}

/// Whether the VM synced any results back into the target's result directory.
pub fn has_vm_results(dir: &Path) -> bool {
    std::fs::read_dir(dir.join(VM_RESULT_DIR))
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_vm_results_detects_synced_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_vm_results(dir.path()));

        std::fs::create_dir(dir.path().join(VM_RESULT_DIR)).unwrap();
        assert!(!has_vm_results(dir.path()));

        std::fs::write(dir.path().join(VM_RESULT_DIR).join("result.txt"), "ok").unwrap();
        assert!(has_vm_results(dir.path()));
    }
}
