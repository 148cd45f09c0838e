// src/types.rs

use std::fmt;

/// OS process identifier as reported at spawn time.
pub type ProcessId = u32;

/// Runner-local sequence number stamped on every invocation.
pub type RunId = u64;

/// Immutable request to run one external command.
///
/// Arguments are handed to the OS as-is: no shell is involved, so each entry
/// reaches the child as exactly one `argv` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    command: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new<C, I, S>(command: C, args: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

/// One fragment of the combined output stream of a process.
///
/// stdout and stderr share one pipe, so the concatenation of all chunks is
/// the interleaving the process actually produced. Chunk boundaries carry no
/// meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub text: String,
}

impl OutputChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
