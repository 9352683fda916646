//! Integration tests for CLI commands

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run stackfile in `dir`
fn stackfile(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_stackfile"))
        .args(args)
        .current_dir(dir)
        .env_remove("STACKFILE_FILE")
        .env_remove("STACKFILE_ENVIRONMENT")
        .env_remove("STACKFILE_EXPERIMENTAL")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute stackfile")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// A workspace with a root state, one nested state and a disabled release
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("apps")).unwrap();

    fs::write(
        dir.path().join("stackfile.yaml"),
        r#"
environments:
  default:
    values:
    - tracing:
        enabled: false
  production:
    values:
    - tracing:
        enabled: true

helmfiles:
- apps/stackfile.yaml

releases:
- name: logging
  namespace: infra
  chart: charts/logging
  labels:
    tier: infra
- name: tracing
  namespace: infra
  chart: charts/tracing
  condition: tracing.enabled
"#,
    )
    .unwrap();

    fs::write(
        dir.path().join("apps/stackfile.yaml"),
        r#"
environments:
  default:
  production:

releases:
- name: backend
  namespace: apps
  chart: charts/backend
  version: 1.2.0
  labels:
    tier: apps
  needs:
  - infra/logging
- name: frontend
  namespace: apps
  chart: charts/frontend
  labels:
    tier: apps
  needs:
  - backend
"#,
    )
    .unwrap();

    dir
}

mod list_command {
    use super::*;

    #[test]
    fn test_list_all_releases() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let out = stdout(&output);
        assert!(out.contains("ENABLED"));
        for name in ["backend", "frontend", "logging", "tracing"] {
            assert!(out.contains(name), "missing {} in\n{}", name, out);
        }
        let backend = out.lines().position(|l| l.starts_with("backend")).unwrap();
        let logging = out.lines().position(|l| l.starts_with("logging")).unwrap();
        assert!(backend < logging, "nested states come first");
    }

    #[test]
    fn test_list_shows_disabled_release() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list"]);

        let out = stdout(&output);
        let tracing = out.lines().find(|l| l.starts_with("tracing")).unwrap();
        assert!(tracing.contains("false"));
    }

    #[test]
    fn test_list_with_selector() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "-l", "tier=apps"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("backend"));
        assert!(out.contains("frontend"));
        assert!(!out.contains("logging"));
    }

    #[test]
    fn test_list_json() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "--json", "-l", "name=backend"]);

        assert!(output.status.success());
        let json: serde_json::Value =
            serde_json::from_str(&stdout(&output)).expect("Output should be valid JSON");
        let releases = json.as_array().unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0]["id"]["namespace"], "apps");
        assert_eq!(releases[0]["version"], "1.2.0");
    }

    #[test]
    fn test_list_environment_enables_condition() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "--json", "-e", "production"]);

        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        let tracing = json
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["id"]["name"] == "tracing")
            .unwrap();
        assert_eq!(tracing["enabled"], true);
    }
}

mod build_command {
    use super::*;

    #[test]
    fn test_build_prints_each_state() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["build"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let out = stdout(&output);
        assert_eq!(out.matches("# Source:").count(), 2);
        assert!(out.contains("name: default"));
        assert!(out.contains("chart: charts/frontend"));
    }

    #[test]
    fn test_build_with_state_values_set() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["build", "--state-values-set", "region=eu-west-1"]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("region: eu-west-1"));
    }
}

mod plan_command {
    use super::*;

    #[test]
    fn test_plan_levels() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["plan"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let out = stdout(&output);
        assert!(out.contains("Execution plan: 3 releases in 3 levels"));
        assert!(out.contains("Level 1: /infra/logging"));
        assert!(out.contains("Level 2: /apps/backend"));
        assert!(out.contains("Level 3: /apps/frontend"));
    }

    #[test]
    fn test_plan_unselected_dependency() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["plan", "-l", "name=frontend"]);

        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("which does not match the selectors"));
    }

    #[test]
    fn test_plan_include_transitive_needs() {
        let dir = fixture();
        let output = stackfile(
            dir.path(),
            &["plan", "-l", "name=frontend", "--include-transitive-needs"],
        );

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("Execution plan: 3 releases in 3 levels"));
    }

    #[test]
    fn test_plan_skip_needs() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["plan", "-l", "name=frontend", "--skip-needs"]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("Execution plan: 1 releases in 1 levels"));
    }

    #[test]
    fn test_plan_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stackfile.yaml"),
            "releases:\n- name: a\n  chart: c/a\n  needs: [b]\n- name: b\n  chart: c/b\n  needs: [a]\n",
        )
        .unwrap();

        let output = stackfile(dir.path(), &["plan"]);

        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("dependency cycle detected"));
    }
}

mod error_messages {
    use super::*;

    #[test]
    fn test_no_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = stackfile(dir.path(), &["list"]);

        assert_eq!(output.status.code(), Some(64));
        assert!(stderr(&output).contains("no state file found"));
    }

    #[test]
    fn test_malformed_selector() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "-l", "tier"]);

        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("malformed label: tier"));
    }

    #[test]
    fn test_no_releases_found() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "-l", "name=nothing"]);

        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains(
            "no releases found that matches specified selector([name=nothing]) and environment(default)"
        ));
    }

    #[test]
    fn test_undefined_environment_suggestion() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["list", "-e", "productoin"]);

        assert_eq!(output.status.code(), Some(4));
        let err = stderr(&output);
        assert!(err.contains("environment \"productoin\" is not defined"));
        assert!(err.contains("production"));
    }

    #[test]
    fn test_duplicate_release() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stackfile.yaml"),
            "releases:\n- name: a\n  chart: c/a\n- name: a\n  chart: c/a2\n",
        )
        .unwrap();

        let output = stackfile(dir.path(), &["plan"]);

        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("found 2 duplicate releases with ID \"//a\""));
    }

    #[test]
    fn test_conflicting_needs_flags() {
        let dir = fixture();
        let output = stackfile(dir.path(), &["plan", "--skip-needs", "--include-needs"]);

        assert_eq!(output.status.code(), Some(64));
    }
}
