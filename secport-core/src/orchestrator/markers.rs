//! Output classification for supervised external processes.
//!
//! The external tools expose no structured completion protocol; success and
//! failure are recognized by matching known marker substrings against the
//! accumulated stdout/stderr text. Rules are ordered and first-match wins, so
//! classification is stable under interleaving of the two streams.

use crate::templates::PROVISION_READY_BANNER;

/// Which output stream a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Terminal classification of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// One ordered classification rule: a marker substring watched on one stream.
#[derive(Debug, Clone, Copy)]
pub struct MarkerRule {
    pub stream: StreamKind,
    pub marker: &'static str,
    pub outcome: Outcome,
}

/// Rules for image build / container creation processes. The success marker
/// is listed first so a build that both succeeds and emits a warning marker
/// still classifies as succeeded.
pub const BUILD_RULES: &[MarkerRule] = &[
    MarkerRule {
        stream: StreamKind::Stdout,
        marker: "Successfully built",
        outcome: Outcome::Succeeded,
    },
    MarkerRule { stream: StreamKind::Stdout, marker: "E: ", outcome: Outcome::Failed },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "returned a non-zero code:",
        outcome: Outcome::Failed,
    },
    MarkerRule { stream: StreamKind::Stderr, marker: "COPY failed:", outcome: Outcome::Failed },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "Error response from daemon:",
        outcome: Outcome::Failed,
    },
];

/// Rules for VM provisioning processes. The ready banner is configured as the
/// VM's post-up message, so seeing it on stdout means provisioning finished.
pub const PROVISION_RULES: &[MarkerRule] = &[
    MarkerRule {
        stream: StreamKind::Stdout,
        marker: PROVISION_READY_BANNER,
        outcome: Outcome::Succeeded,
    },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "VBoxManage --version",
        outcome: Outcome::Failed,
    },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "hostname set for the VM should only contain letters",
        outcome: Outcome::Failed,
    },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "The working directory for Vagrant doesn't exist!",
        outcome: Outcome::Failed,
    },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "There are errors in the configuration",
        outcome: Outcome::Failed,
    },
    MarkerRule {
        stream: StreamKind::Stderr,
        marker: "VirtualBox machine with the name",
        outcome: Outcome::Failed,
    },
];

/// Classify accumulated process output against an ordered rule table.
///
/// Returns the first rule whose marker appears in the accumulated text of its
/// stream, or `None` when no rule matches yet. Matching is monotone: once a
/// rule matches it keeps matching as more output accumulates, since text is
/// only ever appended.
pub fn classify(
    rules: &'static [MarkerRule],
    stdout_acc: &str,
    stderr_acc: &str,
) -> Option<(Outcome, &'static str)> {
    rules.iter().find_map(|rule| {
        let haystack = match rule.stream {
            StreamKind::Stdout => stdout_acc,
            StreamKind::Stderr => stderr_acc,
        };
        haystack.contains(rule.marker).then_some((rule.outcome, rule.marker))
    })
}
