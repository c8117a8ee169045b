//! Supervision of external build and provisioning processes.
//!
//! The [`Supervisor`] spawns container/VM tool processes with piped output,
//! streams their lines to the terminal, and classifies the accumulated text
//! against the marker tables in [`markers`]. Every spawned process is entered
//! into a shared live-process registry so a cancellation request can signal
//! all of them, including grandchildren, through their process groups.

pub mod markers;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::discovery::Target;
use crate::error::{Result, SecportError};
use markers::{classify, MarkerRule, Outcome, BUILD_RULES, PROVISION_RULES};

/// Reason reported when a process exits without emitting any known marker.
const NO_MARKER_REASON: &str = "process exited without a recognized completion marker";

/// Everything needed to spawn one external process.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
            env: Vec::new(),
        }
    }

    fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Terminal classification of one supervised process.
#[derive(Debug, Clone, Copy)]
pub struct Verdict {
    pub outcome: Outcome,
    pub reason: &'static str,
}

/// Spawns and tracks external processes for one coordinator run.
///
/// Clone-cheap; the live-process registry is shared between clones so
/// cancellation from one handle reaches processes spawned through another.
#[derive(Clone)]
pub struct Supervisor {
    live: Arc<Mutex<HashMap<String, u32>>>,
    quiet: bool,
}

impl Supervisor {
    pub fn new(quiet: bool) -> Self {
        Self { live: Arc::new(Mutex::new(HashMap::new())), quiet }
    }

    fn spawn(&self, key: &str, spec: &CommandSpec) -> Result<tokio::process::Child> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (name, value) in &spec.env {
            command.env(name, value);
        }
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| SecportError::SpawnFailed {
            command: spec.display(),
            source: e,
        })?;
        if let Some(pid) = child.id() {
            self.live.lock().unwrap().insert(key.to_string(), pid);
        }
        debug!(key, command = %spec.display(), "spawned");
        Ok(child)
    }

    fn unregister(&self, key: &str) {
        self.live.lock().unwrap().remove(key);
    }

    /// Run a process to a marker verdict.
    ///
    /// Both output streams are read line by line; each appended line is
    /// re-classified against `rules` and the first match settles the verdict.
    /// End of output on both streams without a match is a failure. On a
    /// failure verdict the process group is signalled so a wedged tool does
    /// not stall the run.
    async fn supervise(
        &self,
        key: &str,
        spec: CommandSpec,
        rules: &'static [MarkerRule],
    ) -> Result<Verdict> {
        let mut child = self.spawn(key, &spec)?;
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut stdout_acc = String::new();
        let mut stderr_acc = String::new();
        let mut verdict: Option<Verdict> = None;

        while verdict.is_none() && (stdout_open || stderr_open) {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        if !self.quiet {
                            println!("{line}");
                        }
                        stdout_acc.push_str(&line);
                        stdout_acc.push('\n');
                        verdict = classify(rules, &stdout_acc, &stderr_acc)
                            .map(|(outcome, reason)| Verdict { outcome, reason });
                    }
                    _ => stdout_open = false,
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        if !self.quiet {
                            eprintln!("{}", line.red());
                        }
                        stderr_acc.push_str(&line);
                        stderr_acc.push('\n');
                        verdict = classify(rules, &stdout_acc, &stderr_acc)
                            .map(|(outcome, reason)| Verdict { outcome, reason });
                    }
                    _ => stderr_open = false,
                },
            }
        }

        let verdict =
            verdict.unwrap_or(Verdict { outcome: Outcome::Failed, reason: NO_MARKER_REASON });

        if verdict.outcome == Outcome::Failed {
            if let Some(pid) = child.id() {
                signal_group(pid, nix_signal::SIGINT);
            }
        }
        // The verdict is settled, but the tool may keep writing (image builds
        // emit tagging/export lines after the success marker). Keep draining
        // both pipes to EOF while awaiting exit, otherwise a full pipe buffer
        // blocks the child and wait() never returns.
        let drain_stdout = async {
            while let Ok(Some(_)) = stdout_lines.next_line().await {}
        };
        let drain_stderr = async {
            while let Ok(Some(_)) = stderr_lines.next_line().await {}
        };
        let (_, _, _) = tokio::join!(drain_stdout, drain_stderr, child.wait());
        self.unregister(key);
        Ok(verdict)
    }

    /// Run a process to exit, returning whether it succeeded along with its
    /// collected stderr. Used for commands with a reliable exit status.
    async fn run_to_completion(&self, key: &str, spec: CommandSpec) -> Result<(bool, String)> {
        let mut child = self.spawn(key, &spec)?;
        let stderr = child.stderr.take().expect("stderr piped");
        let stdout = child.stdout.take().expect("stdout piped");
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_lines = BufReader::new(stdout).lines();

        // drain both pipes concurrently so neither fills up and stalls the child
        let drain_stdout = async {
            while let Ok(Some(line)) = stdout_lines.next_line().await {
                if !self.quiet {
                    println!("{line}");
                }
            }
        };
        let drain_stderr = async {
            let mut acc = String::new();
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                if !self.quiet {
                    eprintln!("{}", line.red());
                }
                acc.push_str(&line);
                acc.push('\n');
            }
            acc
        };
        let ((), stderr_acc) = tokio::join!(drain_stdout, drain_stderr);
        let status = child.wait().await.map_err(|e| SecportError::SpawnFailed {
            command: spec.display(),
            source: e,
        })?;
        self.unregister(key);
        Ok((status.success(), stderr_acc))
    }

    /// Build the container image for one target from its generated build file.
    #[instrument(skip(self, target), fields(tag = %target.tag))]
    pub async fn build_image(&self, target: &Target) -> Result<()> {
        info!(dir = %target.dir.display(), "building image");
        let mut spec = CommandSpec::new("docker", &["build", "-t", &target.tag, "."]);
        spec.cwd = Some(target.dir.clone());

        let verdict = self.supervise(&format!("build:{}", target.tag), spec, BUILD_RULES).await?;
        match verdict.outcome {
            Outcome::Succeeded => Ok(()),
            Outcome::Failed => Err(SecportError::BuildFailed {
                target: target.tag.clone(),
                reason: verdict.reason.to_string(),
            }),
        }
    }

    /// Instantiate a stopped container from a freshly built image, applying
    /// any sandboxing profile arguments.
    #[instrument(skip(self, target, profile_args), fields(tag = %target.tag))]
    pub async fn create_container(&self, target: &Target, profile_args: &[String]) -> Result<()> {
        let mut args: Vec<String> =
            vec!["create".into(), "--name".into(), target.tag.clone()];
        args.extend(profile_args.iter().cloned());
        args.push(target.tag.clone());
        let spec = CommandSpec {
            program: "docker".into(),
            args,
            cwd: None,
            env: Vec::new(),
        };

        let (ok, stderr) =
            self.run_to_completion(&format!("create:{}", target.tag), spec).await?;
        if ok && !stderr.contains("Error response from daemon:") {
            Ok(())
        } else {
            Err(SecportError::InstantiationFailed {
                tag: target.tag.clone(),
                reason: stderr.lines().last().unwrap_or("container creation failed").to_string(),
            })
        }
    }

    /// Bring up the portability VM for one target and wait for the ready
    /// banner.
    #[instrument(skip(self, target), fields(tag = %target.tag))]
    pub async fn provision_vm(&self, target: &Target) -> Result<()> {
        info!(dir = %target.dir.display(), "provisioning VM");
        let mut spec = CommandSpec::new("vagrant", &["up"]);
        spec.env.push(("VAGRANT_CWD".into(), target.dir.display().to_string()));

        let verdict =
            self.supervise(&format!("provision:{}", target.tag), spec, PROVISION_RULES).await?;
        match verdict.outcome {
            Outcome::Succeeded => Ok(()),
            Outcome::Failed => Err(SecportError::ProvisionFailed {
                target: target.tag.clone(),
                reason: verdict.reason.to_string(),
            }),
        }
    }

    /// Signal every live process group, first politely and then firmly.
    pub fn cancel_all(&self) {
        let drained: Vec<(String, u32)> = {
            let mut live = self.live.lock().unwrap();
            live.drain().collect()
        };
        for (key, pid) in drained {
            warn!(key, pid, "cancelling");
            signal_group(pid, nix_signal::SIGINT);
            signal_group(pid, nix_signal::SIGKILL);
        }
    }

    /// Remove stopped containers and dangling images.
    pub async fn prune(&self) {
        for args in [["container", "prune", "-f"], ["image", "prune", "-f"]] {
            let spec = CommandSpec::new("docker", &args);
            if let Err(e) = self.run_to_completion(&format!("prune:{}", args[0]), spec).await {
                warn!(error = %e, "prune failed");
            }
        }
    }

    /// Destroy every target's VM, then sweep stray VirtualBox machines left
    /// behind by interrupted runs.
    pub async fn destroy_vms(&self, targets: &[Target]) {
        for target in targets {
            let mut spec = CommandSpec::new("vagrant", &["destroy", "-f"]);
            spec.env.push(("VAGRANT_CWD".into(), target.dir.display().to_string()));
            if let Err(e) =
                self.run_to_completion(&format!("destroy:{}", target.tag), spec).await
            {
                warn!(tag = %target.tag, error = %e, "vagrant destroy failed");
            }
        }

        let list = Command::new("vboxmanage").args(["list", "runningvms"]).output().await;
        let names = match list {
            Ok(output) => parse_running_vms(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                debug!(error = %e, "vboxmanage unavailable, skipping VM sweep");
                return;
            }
        };
        for name in names {
            for args in [vec!["controlvm", &name, "poweroff"], vec!["unregistervm", &name, "--delete"]]
            {
                let spec = CommandSpec::new("vboxmanage", &args);
                if let Err(e) = self.run_to_completion(&format!("sweep:{name}"), spec).await {
                    warn!(vm = %name, error = %e, "VM sweep step failed");
                }
            }
        }
    }
}

/// Parse `vboxmanage list runningvms` output into the VM names owned by this
/// tool. Lines look like `"secport-python" {6c7e...}`.
pub fn parse_running_vms(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let start = line.find('"')? + 1;
            let end = line[start..].find('"')? + start;
            Some(line[start..end].to_string())
        })
        .filter(|name| name.starts_with("secport"))
        .collect()
}

#[cfg(unix)]
mod nix_signal {
    pub use nix::sys::signal::Signal::{SIGINT, SIGKILL};
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, %signal, error = %e, "signal delivery failed");
    }
}

#[cfg(not(unix))]
mod nix_signal {
    pub const SIGINT: () = ();
    pub const SIGKILL: () = ();
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: ()) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", &["-c", script])
    }

    #[test]
    fn test_parse_running_vms_filters_foreign_machines() {
        let output = "\"secport-python\" {1111}\n\"someone-else\" {2222}\n\"secport-c\" {3333}\n";
        assert_eq!(parse_running_vms(output), vec!["secport-python", "secport-c"]);
    }

    #[test]
    fn test_parse_running_vms_handles_empty_output() {
        assert!(parse_running_vms("").is_empty());
    }

    #[tokio::test]
    async fn test_supervise_matches_success_marker() {
        let supervisor = Supervisor::new(true);
        let verdict = supervisor
            .supervise("t", sh("echo 'Successfully built cafe'"), BUILD_RULES)
            .await
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::Succeeded);
        assert!(supervisor.live.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_supervise_matches_stderr_failure_marker() {
        let supervisor = Supervisor::new(true);
        let verdict = supervisor
            .supervise("t", sh("echo 'COPY failed: not found' >&2"), BUILD_RULES)
            .await
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::Failed);
        assert_eq!(verdict.reason, "COPY failed:");
    }

    #[tokio::test]
    async fn test_supervise_eof_without_marker_fails() {
        let supervisor = Supervisor::new(true);
        let verdict =
            supervisor.supervise("t", sh("echo 'nothing to see'"), BUILD_RULES).await.unwrap();
        assert_eq!(verdict.outcome, Outcome::Failed);
        assert_eq!(verdict.reason, NO_MARKER_REASON);
    }

    #[tokio::test]
    async fn test_supervise_marker_cuts_off_trailing_output() {
        let supervisor = Supervisor::new(true);
        let verdict = supervisor
            .supervise(
                "t",
                sh("echo 'Successfully built abc'; echo 'E: late failure'"),
                BUILD_RULES,
            )
            .await
            .unwrap();
        // the first matching line settles the verdict
        assert_eq!(verdict.outcome, Outcome::Succeeded);
    }

    #[tokio::test]
    async fn test_supervise_drains_output_written_after_marker() {
        let supervisor = Supervisor::new(true);
        // a build tool that keeps writing well past the pipe buffer size
        // after the success marker; supervise must still reach exit
        let script = "echo 'Successfully built abc'; \
                      i=0; while [ $i -lt 20000 ]; do echo 'tagged layer data'; i=$((i+1)); done";
        let verdict = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            supervisor.supervise("t", sh(script), BUILD_RULES),
        )
        .await
        .expect("supervise stalled on an undrained pipe")
        .unwrap();
        assert_eq!(verdict.outcome, Outcome::Succeeded);
        assert!(supervisor.live.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_to_completion_reports_exit_status() {
        let supervisor = Supervisor::new(true);
        let (ok, _) = supervisor.run_to_completion("t", sh("exit 0")).await.unwrap();
        assert!(ok);
        let (ok, stderr) =
            supervisor.run_to_completion("t", sh("echo boom >&2; exit 3")).await.unwrap();
        assert!(!ok);
        assert!(stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let supervisor = Supervisor::new(true);
        let err = supervisor
            .supervise("t", CommandSpec::new("secport-no-such-binary", &[]), BUILD_RULES)
            .await
            .unwrap_err();
        assert!(matches!(err, SecportError::SpawnFailed { .. }));
    }
}
