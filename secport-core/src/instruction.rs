//! Ordered accumulation of build-file instructions.
//!
//! A [`BuildInstructionSet`] collects the directives that end up in a generated
//! build description file, one statement per line. The only wrinkle is the
//! coalescing rule: a package-install directive names all of its packages on a
//! single physical line, so raw tokens pushed onto an in-progress `RUN`
//! instruction extend that line instead of starting a new one.

/// Sentinel keyword marking a line that may accumulate further tokens.
const MULTI_TOKEN_SENTINEL: &str = "RUN";

/// An ordered, renderable sequence of build-tool directives for one target.
///
/// Pure text accumulation; owns no external resources. Lines are stored in
/// normalized form, which makes `append` associative and the empty set a
/// left/right identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInstructionSet {
    lines: Vec<String>,
}

impl BuildInstructionSet {
    /// An instruction set with no content.
    pub fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a single instruction line from whitespace-joined fragments.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = fragments
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        if line.is_empty() {
            Self::empty()
        } else {
            Self { lines: vec![line] }
        }
    }

    /// Whether this set contains any instructions.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of instruction lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Concatenate another instruction set after this one.
    ///
    /// Appending an empty set is a no-op.
    pub fn append(mut self, other: &BuildInstructionSet) -> Self {
        self.lines.extend(other.lines.iter().cloned());
        self
    }

    /// Append raw text.
    ///
    /// If the last accumulated line is an in-progress multi-token instruction
    /// (contains the `RUN` sentinel), the text is added as a further token on
    /// that line; otherwise it starts a new statement line.
    pub fn push(&mut self, token: &str) {
        match self.lines.last_mut() {
            Some(last) if last.contains(MULTI_TOKEN_SENTINEL) => {
                last.push(' ');
                last.push_str(token);
            }
            _ => self.lines.push(token.to_string()),
        }
    }

    /// Render the accumulated instructions, one statement per line.
    ///
    /// Every line is newline-terminated; the empty set renders to "".
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Iterate over the instruction lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
