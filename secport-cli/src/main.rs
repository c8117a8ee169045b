use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use secport_core::{
    resolve_targets, RunConfig, RunCoordinator, SecportError, SecurityPolicy,
};

#[derive(Parser)]
#[command(name = "secport")]
#[command(about = "Security and portability testing in isolated environments", long_about = None)]
struct Cli {
    /// Input files or directories containing the code to evaluate
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Security policy (simple|customized)
    #[arg(short, long)]
    security: Option<String>,

    /// Maximum concurrently running build/provision processes
    #[arg(short, long)]
    max_concurrent: Option<usize>,

    /// Keep images, containers and VMs after the run
    #[arg(short, long)]
    keep_artifacts: bool,

    /// Skip the VM provisioning phase
    #[arg(long)]
    skip_vms: bool,

    /// Suppress streamed output of third-party tools
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Load the file configuration, then overlay the command-line flags.
    fn into_config(self) -> Result<(RunConfig, Vec<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(security) = &self.security {
            config.security = SecurityPolicy::parse(security)?;
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent = max_concurrent;
        }
        config.keep_artifacts |= self.keep_artifacts;
        config.skip_vms |= self.skip_vms;
        config.quiet |= self.quiet;
        Ok((config, self.input))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, inputs) = Cli::parse().into_config()?;
    let targets = resolve_targets(&inputs)?;
    info!(targets = targets.len(), "discovered targets");

    let coordinator = RunCoordinator::new(config, targets);
    tokio::select! {
        outcome = coordinator.run() => {
            match outcome {
                Ok(()) => {
                    println!("{}", "All environments finished.".green());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", e.to_string().red());
                    Err(e.into())
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            coordinator.cancel().await;
            Err(SecportError::Cancelled.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_overlay_defaults() {
        let cli = Cli::parse_from([
            "secport",
            "--input",
            "samples",
            "--security",
            "customized",
            "--max-concurrent",
            "4",
            "--quiet",
        ]);
        let (config, inputs) = cli.into_config().unwrap();
        assert_eq!(inputs, vec![PathBuf::from("samples")]);
        assert_eq!(config.security, SecurityPolicy::Customized);
        assert_eq!(config.max_concurrent, 4);
        assert!(config.quiet);
        assert!(!config.skip_vms);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["secport"]).is_err());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let cli = Cli::parse_from(["secport", "--input", "x", "--security", "paranoid"]);
        assert!(cli.into_config().is_err());
    }
}
