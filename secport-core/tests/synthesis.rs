//! End-to-end synthesis tests: discovery through rendered build files.

use std::fs;
use std::path::Path;

use secport_core::config::SecurityPolicy;
use secport_core::image::resolve_image;
use secport_core::instruction::BuildInstructionSet;
use secport_core::persist::{self, DOCKERFILE, VAGRANTFILE};
use secport_core::runtime::Language;
use secport_core::{resolve_targets, toolset, SecportError, Target};

fn synthesize_for(language: Language, policy: SecurityPolicy) -> Result<String, SecportError> {
    let profile = language.profile();
    let runtime = profile.runtime.expect("language has a container runtime");
    let resolved =
        resolve_image(runtime, policy.allowed_runtimes(), policy.pinned_version(runtime))?;
    let set = BuildInstructionSet::from_fragments([resolved.from_line.as_str()]).append(
        &toolset::synthesize(
            resolved.package_manager,
            resolved.installer,
            profile.os_tools,
            profile.specific_tools,
            profile.trailing,
        ),
    );
    Ok(set.render())
}

fn discover_one(dir: &Path, files: &[&str]) -> Target {
    for file in files {
        fs::write(dir.join(file), "").unwrap();
    }
    let mut targets = resolve_targets(&[dir.to_path_buf()]).unwrap();
    assert_eq!(targets.len(), 1);
    targets.remove(0)
}

#[test]
fn python_environment_renders_complete_build_file() {
    let rendered = synthesize_for(Language::Python, SecurityPolicy::Simple).unwrap();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "FROM python:alpine");
    assert_eq!(lines[1], "RUN apk update");
    assert_eq!(lines[2], "RUN apk add --no-cache py3-pip");
    assert_eq!(lines[3], "WORKDIR /usr/src/app");
    assert_eq!(lines[4], "COPY . .");
    assert!(lines.iter().any(|l| l.contains("bandit")));
}

#[test]
fn apt_based_environment_installs_and_cleans_on_one_pass() {
    let rendered = synthesize_for(Language::C, SecurityPolicy::Simple).unwrap();
    let install_lines: Vec<&str> =
        rendered.lines().filter(|l| l.contains("apt-get install")).collect();
    assert_eq!(install_lines.len(), 1);
    assert!(install_lines[0].contains("cppcheck"));
    assert!(install_lines[0].contains("apt-get clean"));
}

#[test]
fn php_version_is_pinned_by_the_default_policy() {
    let rendered = synthesize_for(Language::Php, SecurityPolicy::Simple).unwrap();
    assert!(rendered.starts_with("FROM php:7.4-cli\n"));
}

#[test]
fn every_container_language_synthesizes_under_the_default_policy() {
    for language in Language::ALL {
        if language.profile().runtime.is_none() {
            continue;
        }
        let rendered = synthesize_for(*language, SecurityPolicy::Simple)
            .unwrap_or_else(|e| panic!("{language}: {e}"));
        assert!(rendered.starts_with("FROM "), "{language} missing FROM line");
        // copy-sources directly follows any working-directory declaration
        let lines: Vec<&str> = rendered.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.starts_with("WORKDIR ") {
                assert_eq!(lines[i + 1], "COPY . .", "{language}");
            }
        }
    }
}

#[test]
fn restricted_policy_rejects_non_allow_listed_runtimes() {
    let err = synthesize_for(Language::Python, SecurityPolicy::Customized).unwrap_err();
    assert!(matches!(err, SecportError::UnsupportedRuntime { .. }));
    // ubuntu-based languages still synthesize
    synthesize_for(Language::C, SecurityPolicy::Customized).unwrap();
}

#[test]
fn generated_files_round_trip_through_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let target = discover_one(dir.path(), &["query.sql"]);
    let rendered = synthesize_for(Language::Sql, SecurityPolicy::Simple).unwrap();
    let instructions = rendered.lines().fold(BuildInstructionSet::empty(), |acc, line| {
        acc.append(&BuildInstructionSet::from_fragments([line]))
    });
    assert_eq!(instructions.render(), rendered);

    persist::write_build_files(&target, &instructions).unwrap();
    assert!(dir.path().join(DOCKERFILE).exists());
    let vagrantfile = fs::read_to_string(dir.path().join(VAGRANTFILE)).unwrap();
    assert!(vagrantfile.contains("ruby ./portability_testing/query.sql"));

    persist::delete_build_files(&target).unwrap();
    assert!(!dir.path().join(DOCKERFILE).exists());
    assert!(!dir.path().join(VAGRANTFILE).exists());
    assert!(dir.path().join("query.sql").exists());
}
