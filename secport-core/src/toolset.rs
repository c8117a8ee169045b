//! Synthesis of the tool-installation instruction block.
//!
//! Combines the resolved base image's package manager, the language's
//! ecosystem installer and the profile's static tool lists into one
//! [`BuildInstructionSet`] ready to render behind a `FROM` line.

use crate::image::{LanguageInstaller, PackageManager};
use crate::instruction::BuildInstructionSet;
use crate::runtime::WORKDIR_MARKER;

/// Instruction copying the target sources into the declared working
/// directory. Emitted immediately after any working-directory declaration.
const COPY_SOURCES: &str = "COPY . .";

fn update_instruction(pm: PackageManager) -> BuildInstructionSet {
    match pm {
        PackageManager::Apt => BuildInstructionSet::from_fragments(["RUN", "apt-get", "update", "-y"]),
        PackageManager::Apk => BuildInstructionSet::from_fragments(["RUN", "apk", "update"]),
        PackageManager::Dnf => BuildInstructionSet::from_fragments(["RUN", "dnf", "update", "-y"]),
        PackageManager::Yum => BuildInstructionSet::from_fragments(["RUN", "yum", "update", "-y"]),
    }
}

fn install_prefix(pm: PackageManager) -> BuildInstructionSet {
    match pm {
        PackageManager::Apt => BuildInstructionSet::from_fragments([
            "RUN",
            "apt-get",
            "install",
            "-y",
            "--no-install-recommends",
        ]),
        PackageManager::Apk => {
            BuildInstructionSet::from_fragments(["RUN", "apk", "add", "--no-cache"])
        }
        PackageManager::Dnf => BuildInstructionSet::from_fragments(["RUN", "dnf", "install", "-y"]),
        PackageManager::Yum => BuildInstructionSet::from_fragments(["RUN", "yum", "install", "-y"]),
    }
}

/// Synthesize the instruction block installing OS tools and ecosystem tools,
/// followed by the profile's trailing instructions.
///
/// - With no package manager the OS-tool section is omitted entirely.
/// - OS tools coalesce onto a single install instruction.
/// - Ecosystem tools are installed one instruction per tool, and only for
///   installers that take tools directly on the command line; the others
///   consume a package manifest written next to the build file instead.
/// - A working-directory declaration in the trailing instructions is
///   immediately followed by a synthesized copy-sources instruction.
pub fn synthesize(
    package_manager: Option<PackageManager>,
    installer: Option<LanguageInstaller>,
    os_tools: &[&str],
    specific_tools: &[(&str, Option<&str>)],
    trailing: &[&str],
) -> BuildInstructionSet {
    let mut set = BuildInstructionSet::empty();

    if let Some(pm) = package_manager {
        if !os_tools.is_empty() {
            set = set.append(&update_instruction(pm));
            let mut install = install_prefix(pm);
            for tool in os_tools {
                install.push(tool);
            }
            set = set.append(&install);
            if pm == PackageManager::Apt {
                set.push("&& apt-get clean && rm -rf /var/lib/apt/lists/*");
            }
        }
    }

    if installer == Some(LanguageInstaller::Npm) {
        for (tool, _version) in specific_tools {
            set = set.append(&BuildInstructionSet::from_fragments(["RUN", "npm", "install", tool]));
        }
    }

    for line in trailing {
        set = set.append(&BuildInstructionSet::from_fragments([*line]));
        if line.starts_with(WORKDIR_MARKER) {
            set = set.append(&BuildInstructionSet::from_fragments([COPY_SOURCES]));
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Language;

    #[test]
    fn test_apt_tools_coalesce_with_cleanup() {
        let set = synthesize(
            Some(PackageManager::Apt),
            None,
            &["cppcheck"],
            &[],
            &["WORKDIR /app"],
        );
        let rendered = set.render();
        assert_eq!(
            rendered,
            "RUN apt-get update -y\n\
             RUN apt-get install -y --no-install-recommends cppcheck \
             && apt-get clean && rm -rf /var/lib/apt/lists/*\n\
             WORKDIR /app\n\
             COPY . .\n"
        );
    }

    #[test]
    fn test_apk_tools_skip_cleanup() {
        let set = synthesize(Some(PackageManager::Apk), None, &["py3-pip"], &[], &[]);
        let rendered = set.render();
        assert!(rendered.contains("RUN apk update\n"));
        assert!(rendered.contains("RUN apk add --no-cache py3-pip\n"));
        assert!(!rendered.contains("clean"));
    }

    #[test]
    fn test_no_package_manager_omits_install_section() {
        let set = synthesize(None, None, &[], &[], &["WORKDIR /go/src/app", "RUN go vet ./..."]);
        assert_eq!(set.render(), "WORKDIR /go/src/app\nCOPY . .\nRUN go vet ./...\n");
    }

    #[test]
    fn test_npm_tools_install_one_per_line() {
        let set = synthesize(
            Some(PackageManager::Apt),
            Some(LanguageInstaller::Npm),
            &["git"],
            &[("-g jshint", None), ("eslint --save-dev", None)],
            &[],
        );
        let rendered = set.render();
        assert!(rendered.contains("RUN npm install -g jshint\n"));
        assert!(rendered.contains("RUN npm install eslint --save-dev\n"));
    }

    #[test]
    fn test_manifest_backed_installers_emit_no_tool_lines() {
        // pip/gem/composer tools arrive through a package manifest
        let set = synthesize(
            Some(PackageManager::Apk),
            Some(LanguageInstaller::Gem),
            &[],
            &[("brakeman", None), ("reek", None)],
            &["WORKDIR /usr/src/app", "RUN bundle install"],
        );
        let rendered = set.render();
        assert!(!rendered.contains("brakeman"));
        assert!(rendered.contains("RUN bundle install\n"));
    }

    #[test]
    fn test_full_profile_scenario() {
        let profile = Language::C.profile();
        let set = synthesize(
            Some(PackageManager::Apt),
            None,
            profile.os_tools,
            profile.specific_tools,
            profile.trailing,
        );
        let lines: Vec<&str> = set.lines().collect();
        // one coalesced install naming every tool
        let installs: Vec<&&str> =
            lines.iter().filter(|l| l.contains("apt-get install")).collect();
        assert_eq!(installs.len(), 1);
        assert!(installs[0].contains("cppcheck"));
        // copy-sources follows the working directory declaration
        let wd = lines.iter().position(|l| l.starts_with("WORKDIR")).unwrap();
        assert_eq!(lines[wd + 1], "COPY . .");
    }
}
