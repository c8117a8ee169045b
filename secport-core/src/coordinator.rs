//! Run coordination: synthesis, persistence, bounded-concurrency build and
//! provisioning phases, and cleanup choreography.
//!
//! The coordinator owns the full lifecycle of one run. A failing target never
//! aborts its siblings; failures are collected and the first one is reported
//! after cleanup has run. Cleanup always runs, whether the run finished,
//! failed or was cancelled.

use std::collections::HashSet;

use colored::Colorize;
use tracing::{error, info, instrument, warn};

use crate::config::RunConfig;
use crate::discovery::Target;
use crate::error::{Result, SecportError};
use crate::image;
use crate::instruction::BuildInstructionSet;
use crate::orchestrator::Supervisor;
use crate::persist;
use crate::results;
use crate::toolset;

/// Effective group size for the phased execution; a configured bound of zero
/// still processes one target at a time.
fn concurrency_bound(config: &RunConfig) -> usize {
    config.max_concurrent.max(1)
}

/// Spawn one task per entry and await the whole group before returning.
///
/// All tasks in a group start before any is awaited; the caller iterates
/// groups sequentially, which gives the hard bound on simultaneously live
/// tasks.
async fn await_group<K, Fut>(
    tasks: Vec<(K, Fut)>,
) -> Vec<(K, std::result::Result<Fut::Output, tokio::task::JoinError>)>
where
    Fut: std::future::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let handles: Vec<(K, tokio::task::JoinHandle<Fut::Output>)> =
        tasks.into_iter().map(|(key, fut)| (key, tokio::spawn(fut))).collect();
    let mut results = Vec::with_capacity(handles.len());
    for (key, handle) in handles {
        results.push((key, handle.await));
    }
    results
}

/// Coordinates one complete build/provision/cleanup run over a target set.
pub struct RunCoordinator {
    config: RunConfig,
    targets: Vec<Target>,
    supervisor: Supervisor,
}

impl RunCoordinator {
    pub fn new(config: RunConfig, targets: Vec<Target>) -> Self {
        let supervisor = Supervisor::new(config.quiet);
        Self { config, targets, supervisor }
    }

    /// Synthesize and persist the build files for one target.
    ///
    /// VM-only languages get an empty instruction set; their VM definition is
    /// still written. A runtime outside the policy allow-list fails this
    /// target only.
    fn prepare_target(&self, target: &Target) -> Result<()> {
        let profile = target.language.profile();
        let instructions = match profile.runtime {
            Some(runtime) => {
                let resolved = image::resolve_image(
                    runtime,
                    self.config.security.allowed_runtimes(),
                    self.config.security.pinned_version(runtime),
                )?;
                let from = BuildInstructionSet::from_fragments([resolved.from_line.as_str()]);
                from.append(&toolset::synthesize(
                    resolved.package_manager,
                    resolved.installer,
                    profile.os_tools,
                    profile.specific_tools,
                    profile.trailing,
                ))
            }
            None => BuildInstructionSet::empty(),
        };
        self.config.security.attachment().materialize(&target.dir)?;
        persist::write_build_files(target, &instructions)
    }

    /// Build images and instantiate containers in bounded groups.
    ///
    /// Within a group all builds run concurrently; a failure marks its own
    /// target only. Result retrieval for the group's successes runs
    /// sequentially before the next group starts.
    async fn build_phase(
        &self,
        excluded: &HashSet<String>,
        failures: &mut Vec<SecportError>,
    ) -> HashSet<String> {
        let mut failed = HashSet::new();
        let buildable: Vec<&Target> = self
            .targets
            .iter()
            .filter(|t| {
                !excluded.contains(&t.tag) && t.language.profile().runtime.is_some()
            })
            .collect();

        for group in buildable.chunks(concurrency_bound(&self.config)) {
            let mut tasks = Vec::with_capacity(group.len());
            for target in group {
                let supervisor = self.supervisor.clone();
                let target = (*target).clone();
                let profile_args =
                    self.config.security.attachment().run_arguments(&target.dir);
                let tag = target.tag.clone();
                tasks.push((tag, async move {
                    supervisor.build_image(&target).await?;
                    supervisor.create_container(&target, &profile_args).await
                }));
            }

            let mut succeeded = HashSet::new();
            for (tag, joined) in await_group(tasks).await {
                match joined {
                    Ok(Ok(())) => {
                        succeeded.insert(tag);
                    }
                    Ok(Err(e)) => {
                        error!(tag, error = %e, "build failed");
                        failed.insert(tag);
                        failures.push(e);
                    }
                    Err(e) => {
                        error!(tag = %tag, error = %e, "build task panicked");
                        failures.push(SecportError::BuildFailed {
                            target: tag.clone(),
                            reason: e.to_string(),
                        });
                        failed.insert(tag);
                    }
                }
            }

            for target in group {
                if succeeded.contains(&target.tag) {
                    results::retrieve_container(target).await;
                }
            }
        }
        failed
    }

    /// Provision portability VMs in bounded groups.
    ///
    /// Platform-portable languages are skipped with a notice; targets already
    /// failed during preparation or build are skipped silently.
    async fn provision_phase(
        &self,
        excluded: &HashSet<String>,
        failures: &mut Vec<SecportError>,
    ) {
        let mut provisionable = Vec::new();
        for target in &self.targets {
            if excluded.contains(&target.tag) {
                continue;
            }
            if target.language.profile().portable {
                if !self.config.quiet {
                    println!(
                        "{}",
                        format!("{} is platform portable, skipping VM provisioning", target.language)
                            .green()
                    );
                }
                info!(tag = %target.tag, "portable language, VM skipped");
                continue;
            }
            provisionable.push(target);
        }

        for group in provisionable.chunks(concurrency_bound(&self.config)) {
            let mut tasks = Vec::with_capacity(group.len());
            for target in group {
                let supervisor = self.supervisor.clone();
                let target = (*target).clone();
                let tag = target.tag.clone();
                tasks.push((tag, async move { supervisor.provision_vm(&target).await }));
            }
            for (tag, joined) in await_group(tasks).await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(tag, error = %e, "provisioning failed");
                        failures.push(e);
                    }
                    Err(e) => failures.push(SecportError::ProvisionFailed {
                        target: tag,
                        reason: e.to_string(),
                    }),
                }
            }
            for target in group {
                if results::has_vm_results(&target.dir) {
                    info!(tag = %target.tag, "VM results synced");
                }
            }
        }
    }

    async fn execute(&self) -> Result<()> {
        let mut failures: Vec<SecportError> = Vec::new();
        let mut excluded: HashSet<String> = HashSet::new();

        for target in &self.targets {
            if let Err(e) = self.prepare_target(target) {
                error!(tag = %target.tag, error = %e, "preparation failed");
                excluded.insert(target.tag.clone());
                failures.push(e);
            }
        }

        let failed = self.build_phase(&excluded, &mut failures).await;
        excluded.extend(failed);

        if self.config.skip_vms {
            info!("VM provisioning disabled");
        } else {
            self.provision_phase(&excluded, &mut failures).await;
        }

        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }

    /// Run the full pipeline. Cleanup runs regardless of the outcome; the
    /// first collected failure is returned after it.
    #[instrument(skip(self), fields(targets = self.targets.len()))]
    pub async fn run(&self) -> Result<()> {
        let outcome = self.execute().await;
        self.cleanup().await;
        outcome
    }

    /// Signal every live external process and clean up. Invoked on Ctrl-C.
    pub async fn cancel(&self) {
        warn!("cancellation requested");
        self.supervisor.cancel_all();
        self.cleanup().await;
    }

    /// Delete generated files, prune container leftovers and destroy VMs.
    async fn cleanup(&self) {
        for target in &self.targets {
            if let Err(e) = persist::delete_build_files(target) {
                warn!(tag = %target.tag, error = %e, "cleanup of generated files failed");
            }
        }
        if self.config.keep_artifacts {
            info!("keeping images, containers and VMs");
            return;
        }
        self.supervisor.prune().await;
        if !self.config.skip_vms {
            self.supervisor.destroy_vms(&self.targets).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityPolicy;
    use crate::discovery::resolve_targets;
    use crate::runtime::Language;
    use std::fs;
    use std::path::Path;

    fn quiet_config() -> RunConfig {
        RunConfig { quiet: true, ..RunConfig::default() }
    }

    fn targets_in(dir: &Path, files: &[&str]) -> Vec<Target> {
        for file in files {
            fs::write(dir.join(file), "").unwrap();
        }
        resolve_targets(&[dir.to_path_buf()]).unwrap()
    }

    #[test]
    fn test_zero_concurrency_still_makes_progress() {
        let config = RunConfig { max_concurrent: 0, ..RunConfig::default() };
        assert_eq!(concurrency_bound(&config), 1);
        assert_eq!(concurrency_bound(&RunConfig::default()), 2);
    }

    #[tokio::test]
    async fn test_grouped_execution_never_exceeds_bound() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let bound = 2;
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..7).collect();
        for group in items.chunks(bound) {
            let tasks: Vec<(usize, _)> = group
                .iter()
                .map(|i| {
                    let live = live.clone();
                    let peak = peak.clone();
                    let done = done.clone();
                    (*i, async move {
                        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        live.fetch_sub(1, Ordering::SeqCst);
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                })
                .collect();
            for (_, joined) in await_group(tasks).await {
                joined.unwrap();
            }
            // the whole group finished before the next one starts
            assert_eq!(live.load(Ordering::SeqCst), 0);
        }

        assert_eq!(done.load(Ordering::SeqCst), items.len());
        assert_eq!(peak.load(Ordering::SeqCst), bound);
    }

    #[test]
    fn test_prepare_writes_synthesized_build_file() {
        let dir = tempfile::tempdir().unwrap();
        let targets = targets_in(dir.path(), &["main.c"]);
        let coordinator = RunCoordinator::new(quiet_config(), targets);

        coordinator.prepare_target(&coordinator.targets[0]).unwrap();

        let dockerfile = fs::read_to_string(dir.path().join(persist::DOCKERFILE)).unwrap();
        assert!(dockerfile.starts_with("FROM ubuntu:latest\n"));
        assert!(dockerfile.contains("cppcheck"));
        assert!(dockerfile.contains("WORKDIR /home/c/app\nCOPY . .\n"));
    }

    #[test]
    fn test_prepare_rejects_runtime_outside_policy() {
        let dir = tempfile::tempdir().unwrap();
        // the restricted policy only allows the ubuntu base image
        let config = RunConfig {
            security: SecurityPolicy::Customized,
            quiet: true,
            ..RunConfig::default()
        };
        let targets = targets_in(dir.path(), &["app.py"]);
        let coordinator = RunCoordinator::new(config, targets);

        let err = coordinator.prepare_target(&coordinator.targets[0]).unwrap_err();
        assert!(matches!(err, SecportError::UnsupportedRuntime { .. }));
    }

    #[test]
    fn test_prepare_vm_only_language_writes_empty_build_file() {
        let dir = tempfile::tempdir().unwrap();
        let targets = targets_in(dir.path(), &["Program.cs"]);
        assert_eq!(targets[0].language, Language::CSharp);
        let coordinator = RunCoordinator::new(quiet_config(), targets);

        coordinator.prepare_target(&coordinator.targets[0]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(persist::DOCKERFILE)).unwrap(), "");
        assert!(dir.path().join(persist::VAGRANTFILE).exists());
    }

    #[test]
    fn test_restricted_policy_materializes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            security: SecurityPolicy::Customized,
            quiet: true,
            ..RunConfig::default()
        };
        let targets = targets_in(dir.path(), &["main.c"]);
        let coordinator = RunCoordinator::new(config, targets);

        coordinator.prepare_target(&coordinator.targets[0]).unwrap();
        assert!(dir.path().join(crate::profile::SECCOMP_PROFILE_FILE).exists());
    }
}
