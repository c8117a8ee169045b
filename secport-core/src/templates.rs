//! Static templates for generated build and provisioning files.

use std::fmt::Write as _;

/// Banner printed by a fully provisioned VM; doubles as the provisioning
/// success marker watched by the orchestrator.
pub const PROVISION_READY_BANNER: &str = "Welcome to portability testing using secport.";

/// Render the VM definition file for one target.
///
/// The box provisions the host toolchain for the target's language and runs
/// the analysis commands inline; results land in the synced folder.
pub fn vagrantfile(sync_folder: &str, vm_name: &str, tools: &str, commands: &str) -> String {
    format!(
        r#"Vagrant.configure("2") do |config|
    config.vm.box = "centos/7"
    config.vm.hostname = "secportvm"
    config.vm.post_up_message = "{PROVISION_READY_BANNER}"
    config.vm.box_check_update = true
    # Change the address on collision with an existing private network.
    config.vm.network "private_network", ip: "172.168.67.89"

    # Synced folder where results are received.
    config.vm.synced_folder "{sync_folder}", "/home/vagrant/portability_testing"

    config.vm.provider "virtualbox" do |vb|
        vb.name = '{vm_name}'
        vb.memory = "2048"
        vb.cpus = "2"
    end
    config.vm.provision "shell", inline: <<-SHELL
        yum update -y
        yum install -y {tools}
{commands}
    SHELL
end
"#
    )
}

/// Provision command lines executed inside the VM, one per source file.
pub fn provision_commands(tool: &str, files: &[String]) -> String {
    let mut out = String::new();
    for file in files {
        let _ = writeln!(out, "        {tool} ./portability_testing/{file}");
    }
    out
}

/// Empty dependency manifest for Python targets; user requirements are
/// appended by the projects under test.
pub const REQUIREMENTS_TXT: &str = "\n";

/// Gemfile listing the gems to install for a Ruby target.
pub fn gemfile(gems: &[&str]) -> String {
    let mut body = String::new();
    for gem in gems {
        let _ = writeln!(body, "  gem '{gem}'");
    }
    format!("source 'https://rubygems.org' do\n{body}end\n")
}

/// composer.json requiring the configured PHP tools.
pub fn composer_json(tools: &[(&str, Option<&str>)]) -> String {
    let require: serde_json::Map<String, serde_json::Value> = tools
        .iter()
        .map(|(name, version)| {
            ((*name).to_string(), serde_json::Value::from(version.unwrap_or("@dev")))
        })
        .collect();
    let doc = serde_json::json!({ "require": require });
    // Pretty output keeps the file reviewable inside the target directory.
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

/// ESLint configuration materialized next to JavaScript targets.
pub const ESLINT_RC: &str = r#"{
  "parserOptions": {
    "ecmaVersion": 2020,
    "sourceType": "module"
  },
  "env": {
    "es6": true,
    "node": true
  },
  "plugins": ["import", "node", "promise", "standard"],
  "rules": {
    "accessor-pairs": "error",
    "camelcase": ["error", { "properties": "never" }],
    "constructor-super": "error",
    "curly": ["error", "multi-line"],
    "eqeqeq": ["error", "always", { "null": "ignore" }],
    "no-unused-vars": ["error", { "args": "none" }]
  }
}
"#;

/// Gradle bootstrap properties for Java/Kotlin targets.
pub const GRADLE_BUILD_PROPERTIES: &str = r#"buildscript {
    repositories {
        mavenCentral()
    }
}

plugins {
    id("io.gitlab.arturbosch.detekt").version("1.10.0")
}

repositories {
    mavenCentral()
}
"#;

/// Seccomp allowlist without networking syscalls, applied by the hardened
/// policy. Default action rejects everything not listed.
pub const RESTRICTED_SECCOMP_PROFILE: &str = r#"{
    "defaultAction": "SCMP_ACT_ERRNO",
    "architectures": [
        "SCMP_ARCH_X86_64",
        "SCMP_ARCH_X86",
        "SCMP_ARCH_X32"
    ],
    "syscalls": [
        { "name": "read", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "write", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "open", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "openat", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "close", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "stat", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "fstat", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "lstat", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "lseek", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "mmap", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "mprotect", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "munmap", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "brk", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "rt_sigaction", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "rt_sigprocmask", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "rt_sigreturn", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "ioctl", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "access", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "pipe", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "dup", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "dup2", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getpid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "fork", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "vfork", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "clone", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "execve", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "exit", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "exit_group", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "wait4", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "kill", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "fcntl", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getcwd", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "chdir", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "mkdir", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "rmdir", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "unlink", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "readlink", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "chmod", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getuid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getgid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "geteuid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getegid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getppid", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "arch_prctl", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "futex", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "set_tid_address", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "clock_gettime", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "nanosleep", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "getdents64", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "statfs", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "umask", "action": "SCMP_ACT_ALLOW", "args": [] },
        { "name": "prlimit64", "action": "SCMP_ACT_ALLOW", "args": [] }
    ]
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vagrantfile_carries_banner_and_tools() {
        let rendered = vagrantfile("/work/py", "secport-python", "python3", "");
        assert!(rendered.contains(PROVISION_READY_BANNER));
        assert!(rendered.contains("yum install -y python3"));
        assert!(rendered.contains("config.vm.synced_folder \"/work/py\""));
        assert!(rendered.contains("vb.name = 'secport-python'"));
    }

    #[test]
    fn test_provision_commands_prefix_synced_folder() {
        let cmds = provision_commands("python3", &["a.py".to_string(), "b.py".to_string()]);
        assert!(cmds.contains("python3 ./portability_testing/a.py"));
        assert!(cmds.contains("python3 ./portability_testing/b.py"));
    }

    #[test]
    fn test_composer_json_pins_versions() {
        let doc = composer_json(&[("phpstan/phpstan", Some("^0.12.37")), ("phan/phan", None)]);
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed["require"]["phpstan/phpstan"], "^0.12.37");
        assert_eq!(parsed["require"]["phan/phan"], "@dev");
    }

    #[test]
    fn test_gemfile_lists_gems() {
        let doc = gemfile(&["brakeman", "reek"]);
        assert!(doc.contains("gem 'brakeman'"));
        assert!(doc.contains("gem 'reek'"));
    }

    #[test]
    fn test_seccomp_profile_is_valid_json() {
        let parsed: serde_json::Value =
            serde_json::from_str(RESTRICTED_SECCOMP_PROFILE).unwrap();
        assert!(parsed["syscalls"].as_array().unwrap().len() > 40);
        // networking syscalls stay excluded
        assert!(!RESTRICTED_SECCOMP_PROFILE.contains("\"socket\""));
    }
}
