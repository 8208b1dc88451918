//! Integration tests for charmcraft-pack

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn charmcraft_pack() -> Command {
        let mut cmd = cargo_bin_cmd!("charmcraft-pack");
        for var in [
            "GITHUB_OUTPUT",
            "GITHUB_RUN_ID",
            "GITHUB_RUN_ATTEMPT",
            "GITHUB_RUN_NUMBER",
            "GITHUB_JOB",
            "INPUT_PATH",
            "INPUT_REVISION",
            "INPUT_CHARMCRAFT-CHANNEL",
            "INPUT_VERBOSITY",
            "INPUT_CACHE-PACKAGES",
            "INPUT_GITHUB_CONTEXT",
            "CHARMCRAFT_PACK_CONFIG",
            "ACTIONS_RUNTIME_TOKEN",
            "ACTIONS_RESULTS_URL",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        charmcraft_pack()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Build Charms with charmcraft in CI"));
    }

    #[test]
    fn version_displays() {
        charmcraft_pack()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("charmcraft-pack"));
    }

    #[test]
    fn invalid_verbosity_fails_before_provisioning() {
        charmcraft_pack()
            .args(["pack", "--path", ".", "--verbosity", "fake-verbosity"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid verbosity \"fake-verbosity\""))
            .stdout(predicate::str::contains("::error::"))
            .stdout(predicate::str::contains("::group::").not());
    }

    #[test]
    fn invalid_verbosity_from_action_input() {
        charmcraft_pack()
            .arg("pack")
            .env("INPUT_VERBOSITY", "loud")
            .assert()
            .failure()
            .stderr(predicate::str::contains("quiet, brief, verbose, debug, trace"));
    }

    #[test]
    fn restore_with_caching_disabled() {
        charmcraft_pack()
            .arg("restore")
            .assert()
            .success()
            .stdout(predicate::str::contains("Charmcraft package caching disabled"));
    }

    #[test]
    fn restore_miss_succeeds() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "[cache]\ndir = {:?}\nstore_dir = {:?}\n",
                temp.path().join("cache"),
                temp.path().join("store")
            ),
        )
        .unwrap();

        charmcraft_pack()
            .args(["restore", "--cache-packages", "true"])
            .arg("--config")
            .arg(&config)
            .env("GITHUB_RUN_ID", "42")
            .env("GITHUB_RUN_ATTEMPT", "1")
            .env("GITHUB_JOB", "pack")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Cache not found for input keys: craft-shared-cache-42-1-pack, craft-shared-cache",
            ));
    }

    #[test]
    fn invalid_config_file_fails() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[cache\n").unwrap();

        charmcraft_pack()
            .arg("restore")
            .arg("--config")
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn pack_help() {
        charmcraft_pack()
            .args(["pack", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--verbosity"))
            .stdout(predicate::str::contains("--cache-packages"));
    }
}
