//! Hook descriptor target index
//!
//! Hook activation asks one question of the project's `Makefile`: is a
//! named target declared? The matching rule is a line-anchored
//! `name:` declaration, specified here once so it is testable in
//! isolation from any shell invocation.

use crate::fs::FileSystem;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

fn target_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A target declaration, not a `VAR := value` assignment.
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9_./-]*)\s*:(?:[^=]|$)").unwrap())
}

/// Parsed set of target names declared in a Makefile-like descriptor.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    targets: BTreeSet<String>,
}

impl TargetIndex {
    pub fn parse(content: &str) -> Self {
        let mut targets = BTreeSet::new();
        for line in content.lines() {
            if let Some(captures) = target_line().captures(line) {
                targets.insert(captures[1].to_string());
            }
        }
        Self { targets }
    }

    /// Read and parse a descriptor. An absent or unreadable descriptor is
    /// `None`, never an error: activation treats it as "no targets".
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> Option<Self> {
        if !fs.is_file(path) {
            return None;
        }
        match fs.read_to_string(path) {
            Ok(content) => Some(Self::parse(&content)),
            Err(error) => {
                debug!(path = %path.display(), %error, "Hook descriptor unreadable, treating as empty");
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
