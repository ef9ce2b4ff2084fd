//! Project context: package manifest introspection and package-manager
//! detection for the tool facade.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::ProjectError;

pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 30_000;
pub const TEST_SCRIPT_TIMEOUT_MS: u64 = 60_000;
pub const E2E_SCRIPT_TIMEOUT_MS: u64 = 90_000;
pub const INSTALL_TIMEOUT_MS: u64 = 300_000;

const TEST_FRAMEWORKS: &[&str] = &["jest", "vitest", "mocha", "ava", "playwright", "cypress"];
const DEV_SERVERS: &[&str] = &["vite", "next", "webpack", "astro", "nuxt", "react-scripts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    /// Lockfile-based detection; npm is the fallback.
    pub fn detect(root: &Path) -> Self {
        if root.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if root.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if root.join("bun.lockb").exists() {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Argv for running a named script, extra arguments appended. npm needs
    /// the `--` sentinel before script arguments; the others pass through.
    pub fn run_args(self, script: &str, extra: &[String]) -> Vec<String> {
        let mut args = vec!["run".to_string(), script.to_string()];
        match self {
            PackageManager::Npm => {
                if !extra.is_empty() {
                    args.push("--".to_string());
                    args.extend(extra.iter().cloned());
                }
            }
            PackageManager::Pnpm | PackageManager::Yarn | PackageManager::Bun => {
                args.extend(extra.iter().cloned());
            }
        }
        args
    }

    /// Argv for installing the whole manifest or named packages.
    pub fn install_args(self, packages: &[String], dev: bool) -> Vec<String> {
        if packages.is_empty() {
            return vec!["install".to_string()];
        }
        let mut args = match self {
            PackageManager::Npm => {
                let mut args = vec!["install".to_string()];
                if dev {
                    args.push("--save-dev".to_string());
                }
                args
            }
            PackageManager::Pnpm => {
                let mut args = vec!["add".to_string()];
                if dev {
                    args.push("-D".to_string());
                }
                args
            }
            PackageManager::Yarn | PackageManager::Bun => {
                let mut args = vec!["add".to_string()];
                if dev {
                    args.push("--dev".to_string());
                }
                args
            }
        };
        args.extend(packages.iter().cloned());
        args
    }
}

/// Snapshot of a project directory, resolved from `package.json` and the
/// files next to it.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub package_manager: PackageManager,
    pub scripts: BTreeMap<String, String>,
    pub dependencies_installed: bool,
    pub test_framework: Option<&'static str>,
    pub dev_server: Option<&'static str>,
}

impl ProjectContext {
    pub fn load(root: &Path) -> Result<Self, ProjectError> {
        let manifest_path = root.join("package.json");
        if !manifest_path.exists() {
            return Err(ProjectError::ManifestMissing(root.to_path_buf()));
        }
        let raw = fs::read_to_string(&manifest_path).map_err(|source| {
            ProjectError::ManifestRead {
                path: manifest_path.clone(),
                source,
            }
        })?;
        let manifest: Value = serde_json::from_str(&raw).map_err(|source| {
            ProjectError::ManifestParse {
                path: manifest_path.clone(),
                source,
            }
        })?;

        let scripts = manifest
            .get("scripts")
            .and_then(Value::as_object)
            .map(|scripts| {
                scripts
                    .iter()
                    .filter_map(|(name, value)| {
                        value.as_str().map(|cmd| (name.clone(), cmd.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let declared = declared_dependencies(&manifest);
        let test_framework = TEST_FRAMEWORKS
            .iter()
            .find(|name| declared.contains(**name))
            .copied();
        let dev_server = DEV_SERVERS
            .iter()
            .find(|name| declared.contains(**name))
            .copied();

        Ok(Self {
            root: root.to_path_buf(),
            package_manager: PackageManager::detect(root),
            scripts,
            dependencies_installed: root.join("node_modules").is_dir(),
            test_framework,
            dev_server,
        })
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn script_names(&self) -> Vec<&str> {
        self.scripts.keys().map(String::as_str).collect()
    }
}

fn declared_dependencies(manifest: &Value) -> HashSet<String> {
    let mut declared = HashSet::new();
    for table in ["dependencies", "devDependencies"] {
        if let Some(deps) = manifest.get(table).and_then(Value::as_object) {
            declared.extend(deps.keys().cloned());
        }
    }
    declared
}

/// Foreground timeout for a named script: e2e suites get the longest budget,
/// other test scripts a medium one.
pub fn timeout_for_script(script: &str) -> u64 {
    let name = script.to_lowercase();
    if name.contains("e2e") {
        E2E_SCRIPT_TIMEOUT_MS
    } else if name.contains("test") {
        TEST_SCRIPT_TIMEOUT_MS
    } else {
        DEFAULT_SCRIPT_TIMEOUT_MS
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_manifest(dir: &Path, contents: &str) {
        fs::write(dir.join("package.json"), contents).expect("write package.json");
    }

    #[test]
    fn detects_package_manager_from_lockfiles() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);

        fs::write(dir.path().join("yarn.lock"), "").expect("write lockfile");
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Yarn);

        fs::write(dir.path().join("pnpm-lock.yaml"), "").expect("write lockfile");
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
    }

    #[test]
    fn npm_run_args_use_the_double_dash_sentinel() {
        let extra = vec!["--watch=false".to_string()];
        assert_eq!(
            PackageManager::Npm.run_args("test", &extra),
            vec!["run", "test", "--", "--watch=false"]
        );
        assert_eq!(
            PackageManager::Pnpm.run_args("test", &extra),
            vec!["run", "test", "--watch=false"]
        );
    }

    #[test]
    fn install_args_per_manager() {
        let packages = vec!["zod".to_string()];
        assert_eq!(
            PackageManager::Npm.install_args(&[], false),
            vec!["install"]
        );
        assert_eq!(
            PackageManager::Npm.install_args(&packages, true),
            vec!["install", "--save-dev", "zod"]
        );
        assert_eq!(
            PackageManager::Pnpm.install_args(&packages, true),
            vec!["add", "-D", "zod"]
        );
        assert_eq!(
            PackageManager::Yarn.install_args(&packages, false),
            vec!["add", "zod"]
        );
    }

    #[test]
    fn loads_scripts_and_frameworks_from_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            r#"{
                "name": "fixture",
                "scripts": {"dev": "vite", "test": "vitest run"},
                "dependencies": {"react": "^18.0.0"},
                "devDependencies": {"vitest": "^2.0.0", "vite": "^5.0.0"}
            }"#,
        );

        let context = ProjectContext::load(dir.path()).expect("load context");
        assert_eq!(context.script_names(), vec!["dev", "test"]);
        assert!(context.has_script("dev"));
        assert!(!context.has_script("build"));
        assert_eq!(context.test_framework, Some("vitest"));
        assert_eq!(context.dev_server, Some("vite"));
        assert!(!context.dependencies_installed);
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ProjectContext::load(dir.path()).expect_err("missing manifest");
        assert!(matches!(err, ProjectError::ManifestMissing(_)));
    }

    #[test]
    fn node_modules_marks_dependencies_installed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(dir.path(), r#"{"name": "fixture"}"#);
        fs::create_dir(dir.path().join("node_modules")).expect("create node_modules");
        let context = ProjectContext::load(dir.path()).expect("load context");
        assert!(context.dependencies_installed);
        assert!(context.scripts.is_empty());
    }

    #[test]
    fn script_timeouts_scale_with_suite_kind() {
        assert_eq!(timeout_for_script("build"), DEFAULT_SCRIPT_TIMEOUT_MS);
        assert_eq!(timeout_for_script("test"), TEST_SCRIPT_TIMEOUT_MS);
        assert_eq!(timeout_for_script("test:unit"), TEST_SCRIPT_TIMEOUT_MS);
        assert_eq!(timeout_for_script("e2e"), E2E_SCRIPT_TIMEOUT_MS);
        assert_eq!(timeout_for_script("test:e2e"), E2E_SCRIPT_TIMEOUT_MS);
    }
}
