//! Runtime capability probing
//!
//! External tool availability does not change mid-run, so every capability
//! is resolved once at pipeline start and cached in a per-run value that is
//! passed to the components that need it.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::debug;

const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Tools every run probes: the hook tool and the finalization tool.
pub const DEFAULT_PROBE_TOOLS: &[&str] = &["make", "git"];

/// Wider tool set surfaced by the doctor command.
pub const DOCTOR_TOOLS: &[&str] = &["make", "git", "mvn", "gradle", "npm"];

/// Per-run snapshot of external tool and container-backend availability.
#[derive(Debug, Clone)]
pub struct Capabilities {
    tools: HashMap<String, bool>,
    docker: bool,
}

impl Capabilities {
    /// Probe the given tools on PATH and the Docker backend, once.
    pub async fn probe(tools: &[&str]) -> Self {
        let mut resolved = HashMap::new();
        for tool in tools {
            let available = resolve_on_path(tool);
            debug!(tool, available, "Probed external tool");
            resolved.insert(tool.to_string(), available);
        }

        let docker = probe_docker().await;
        debug!(available = docker, "Probed container backend");

        Self {
            tools: resolved,
            docker,
        }
    }

    /// Fixed capability set, for tests and dry-run planning.
    pub fn preset(tools: &[(&str, bool)], docker: bool) -> Self {
        Self {
            tools: tools
                .iter()
                .map(|(name, available)| (name.to_string(), *available))
                .collect(),
            docker,
        }
    }

    /// Whether a named external tool resolved at pipeline start.
    pub fn tool(&self, name: &str) -> bool {
        self.tools.get(name).copied().unwrap_or(false)
    }

    pub fn docker(&self) -> bool {
        self.docker
    }

    pub fn tools(&self) -> impl Iterator<Item = (&str, bool)> {
        self.tools.iter().map(|(name, ok)| (name.as_str(), *ok))
    }
}

fn resolve_on_path(tool: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };

    env::split_paths(&paths).any(|dir| is_executable(&dir.join(tool)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Check the Docker daemon is reachable. Absence is a degraded capability,
/// not an error: stages that need isolation react per their own policy.
async fn probe_docker() -> bool {
    if !Path::new(DOCKER_SOCKET_PATH).exists() {
        debug!("Docker socket not found at {}", DOCKER_SOCKET_PATH);
        return false;
    }

    use bollard::Docker;

    let docker = match Docker::connect_with_local_defaults() {
        Ok(d) => d,
        Err(e) => {
            debug!("Failed to connect to Docker: {}", e);
            return false;
        }
    };

    match docker.version().await {
        Ok(_) => true,
        Err(e) => {
            debug!("Failed to get Docker version: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_preset_lookup() {
        let caps = Capabilities::preset(&[("make", true), ("git", false)], false);

        assert!(caps.tool("make"));
        assert!(!caps.tool("git"));
        assert!(!caps.tool("unprobed"));
        assert!(!caps.docker());
    }

    #[test]
    #[serial]
    fn test_resolve_finds_shell() {
        // Any unix environment running these tests has sh on PATH.
        assert!(resolve_on_path("sh"));
    }

    #[test]
    #[serial]
    fn test_resolve_unknown_tool() {
        assert!(!resolve_on_path("definitely-not-a-real-tool-2a6f"));
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_resolve_respects_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let tool = dir.path().join("fake-tool");
        std::fs::File::create(&tool)
            .unwrap()
            .write_all(b"#!/bin/sh\n")
            .unwrap();

        let old_path = env::var_os("PATH");
        env::set_var("PATH", dir.path());

        let without_exec_bit = resolve_on_path("fake-tool");

        let mut perms = std::fs::metadata(&tool).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tool, perms).unwrap();

        let with_exec_bit = resolve_on_path("fake-tool");

        match old_path {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }

        assert!(!without_exec_bit);
        assert!(with_exec_bit);
    }
}
