//! Activation Resolver
//!
//! Decides whether an optional stage runs. Predicates are explicit values
//! evaluated against the project-tree snapshot, the per-run capability
//! cache, and static config flags; evaluation performs no I/O beyond the
//! [`FileSystem`] trait and never fails the pipeline. An unreadable or
//! absent descriptor simply evaluates to false.

use crate::capability::Capabilities;
use crate::config::PipelineConfig;
use crate::descriptor::TargetIndex;
use crate::fs::FileSystem;
use std::fmt;
use std::path::{Path, PathBuf};

/// A boolean condition over (project tree, capabilities, config flags).
#[derive(Debug, Clone)]
pub enum Predicate {
    /// The path exists in the checked-out project tree.
    FileExists(PathBuf),
    /// A named target is declared in a build descriptor file.
    TargetDefined {
        descriptor: PathBuf,
        target: String,
    },
    /// The named external tool resolved at pipeline start.
    CapabilityAvailable(String),
    /// A boolean flag from the pipeline configuration.
    FlagEnabled(String),
    /// Conjunction: all sub-predicates must hold.
    All(Vec<Predicate>),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::FileExists(path) => write!(f, "file-exists({})", path.display()),
            Predicate::TargetDefined { descriptor, target } => {
                write!(f, "target-defined({}, {})", descriptor.display(), target)
            }
            Predicate::CapabilityAvailable(tool) => write!(f, "capability({})", tool),
            Predicate::FlagEnabled(key) => write!(f, "flag({})", key),
            Predicate::All(parts) => {
                f.write_str("all(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Evaluates predicates against one run's snapshot. Holds only shared
/// references: evaluation is a pure function of its inputs and the same
/// resolver answers identically for the same tree and config.
pub struct ActivationResolver<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
    capabilities: &'a Capabilities,
    config: &'a PipelineConfig,
}

impl<'a> ActivationResolver<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        root: &'a Path,
        capabilities: &'a Capabilities,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            fs,
            root,
            capabilities,
            config,
        }
    }

    pub fn should_run(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::FileExists(path) => self.fs.exists(&self.root.join(path)),
            Predicate::TargetDefined { descriptor, target } => {
                TargetIndex::from_file(self.fs, &self.root.join(descriptor))
                    .map(|index| index.contains(target))
                    .unwrap_or(false)
            }
            Predicate::CapabilityAvailable(tool) => self.capabilities.tool(tool),
            Predicate::FlagEnabled(key) => self.config.flag_enabled(key),
            Predicate::All(parts) => parts.iter().all(|p| self.should_run(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use yare::parameterized;

    fn fixture() -> (MockFileSystem, Capabilities, PipelineConfig) {
        let fs = MockFileSystem::new();
        fs.add_file("Makefile", "after-build:\n\techo hook\n");
        fs.add_file("pom.xml", "<project/>");

        let caps = Capabilities::preset(&[("make", true)], true);
        let config = PipelineConfig::new("git@example.com:acme/billing.git");

        (fs, caps, config)
    }

    #[test]
    fn test_file_exists() {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        assert!(resolver.should_run(&Predicate::FileExists(PathBuf::from("pom.xml"))));
        assert!(!resolver.should_run(&Predicate::FileExists(PathBuf::from("build.gradle"))));
    }

    #[parameterized(
        declared = { "after-build", true },
        undeclared = { "before-build", false },
    )]
    fn test_target_defined(target: &str, expected: bool) {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        let predicate = Predicate::TargetDefined {
            descriptor: PathBuf::from("Makefile"),
            target: target.to_string(),
        };
        assert_eq!(resolver.should_run(&predicate), expected);
    }

    #[test]
    fn test_missing_descriptor_is_false_not_error() {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        let predicate = Predicate::TargetDefined {
            descriptor: PathBuf::from("hooks.mk"),
            target: "after-build".to_string(),
        };
        assert!(!resolver.should_run(&predicate));
    }

    #[test]
    fn test_capability_lookup() {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        assert!(resolver.should_run(&Predicate::CapabilityAvailable("make".to_string())));
        assert!(!resolver.should_run(&Predicate::CapabilityAvailable("helm".to_string())));
    }

    #[test]
    fn test_flag_lookup() {
        let (fs, caps, mut config) = fixture();
        config.clean_cache_before_build = false;
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        assert!(!resolver.should_run(&Predicate::FlagEnabled(
            "clean-cache-before-build".to_string()
        )));
        assert!(resolver.should_run(&Predicate::FlagEnabled("skip-tests".to_string())));
    }

    #[test]
    fn test_conjunction_requires_all() {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        let hook = Predicate::All(vec![
            Predicate::FileExists(PathBuf::from("Makefile")),
            Predicate::TargetDefined {
                descriptor: PathBuf::from("Makefile"),
                target: "after-build".to_string(),
            },
            Predicate::CapabilityAvailable("make".to_string()),
        ]);
        assert!(resolver.should_run(&hook));

        let with_missing_tool = Predicate::All(vec![
            Predicate::FileExists(PathBuf::from("Makefile")),
            Predicate::CapabilityAvailable("helm".to_string()),
        ]);
        assert!(!resolver.should_run(&with_missing_tool));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let (fs, caps, config) = fixture();
        let resolver = ActivationResolver::new(&fs, Path::new("/mock"), &caps, &config);

        let predicate = Predicate::TargetDefined {
            descriptor: PathBuf::from("Makefile"),
            target: "after-build".to_string(),
        };

        let first = resolver.should_run(&predicate);
        let second = resolver.should_run(&predicate);
        assert_eq!(first, second);
    }

    #[test]
    fn test_predicate_display() {
        let predicate = Predicate::All(vec![
            Predicate::FileExists(PathBuf::from("Makefile")),
            Predicate::CapabilityAvailable("make".to_string()),
        ]);
        assert_eq!(
            predicate.to_string(),
            "all(file-exists(Makefile), capability(make))"
        );
    }
}
