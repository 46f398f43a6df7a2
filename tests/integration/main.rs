//! Integration tests for warmvol

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    const RUNNER_ENV: [&str; 11] = [
        "GITHUB_REPOSITORY",
        "GITHUB_REF",
        "WARMVOL_CONFIG",
        "WARMVOL_STATE_DIR",
        "WARMVOL_DEFAULT_BRANCH",
        "WARMVOL_INSTANCE_ID",
        "WARMVOL_AVAILABILITY_ZONE",
        "WARMVOL_IMDS_ENDPOINT",
        "RUNS_ON_CONFIG",
        "GITHUB_ACTIONS",
        "RUST_LOG",
    ];

    /// warmvol with a private config file and state dir, isolated from the runner env
    fn warmvol(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("warmvol");
        for var in RUNNER_ENV {
            cmd.env_remove(var);
        }
        cmd.arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--state-dir")
            .arg(temp.path().join("state"));
        cmd
    }

    fn job_flags() -> [&'static str; 8] {
        [
            "--repository",
            "acme/api",
            "--ref",
            "refs/heads/main",
            "--instance-id",
            "i-0123456789abcdef0",
            "--availability-zone",
            "us-east-1a",
        ]
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("restore"))
            .stdout(predicate::str::contains("snapshot"))
            .stdout(predicate::str::contains("locate"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("warmvol"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[volume]"))
            .stdout(predicate::str::contains("size_gib = 40"))
            .stdout(predicate::str::contains("format_version = \"v1\""));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .args(["config", "set", "volume.size_gib", "80"])
            .assert()
            .success();

        warmvol(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("size_gib = 80"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .args(["config", "set", "volume.color", "red"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").exists());

        warmvol(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn warnings_become_workflow_annotations_under_github_actions() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp).args(["config", "init"]).assert().success();

        warmvol(&temp)
            .env("GITHUB_ACTIONS", "true")
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("::warning title=warmvol::Config already exists"));
    }

    #[test]
    fn invalid_config_file_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[volume]\nsize_gib = \"big\"\n").unwrap();

        warmvol(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn restore_without_repository_fails_fast() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .args(["restore", "--ref", "refs/heads/main"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITHUB_REPOSITORY"));
    }

    #[test]
    fn restore_rejects_malformed_tag() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .arg("restore")
            .args(job_flags())
            .args(["--tag", "no-equals-sign"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("KEY=VALUE"));
    }

    #[test]
    fn snapshot_without_restore_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        warmvol(&temp)
            .arg("snapshot")
            .args(job_flags())
            .arg("/var/lib/docker")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No volume info for /var/lib/docker"))
            .stderr(predicate::str::contains("warmvol restore"));
    }
}
