//! Integration tests for actioncache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn actioncache() -> Command {
        cargo_bin_cmd!("actioncache")
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    const LAYERED: &str = r#"
        [content_addressable_storage.memory]

        [action_cache.completeness_checking.action_result_expiring]
        minimum_validity = "60s"
        maximum_validity_jitter = "30s"

        [action_cache.completeness_checking.action_result_expiring.backend.remote]
        address = "http://127.0.0.1:9"
    "#;

    #[test]
    fn help_displays() {
        actioncache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Action Cache"));
    }

    #[test]
    fn version_displays() {
        actioncache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("actioncache"));
    }

    #[test]
    fn check_reports_layered_pipeline() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, LAYERED);
        actioncache()
            .arg("--config")
            .arg(&config)
            .args(["check", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""backend": "completeness_checking""#))
            .stdout(predicate::str::contains(r#""digest_key_format": "with_instance""#))
            .stdout(predicate::str::contains(r#""digest_key_format": "without_instance""#));
    }

    #[test]
    fn check_text_output() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, LAYERED);
        actioncache()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"))
            .stdout(predicate::str::contains("completeness_checking"));
    }

    #[test]
    fn check_rejects_negative_validity() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            &dir,
            r#"
            [action_cache.action_result_expiring]
            minimum_validity = "-60s"
            maximum_validity_jitter = "0s"
            [action_cache.action_result_expiring.backend.memory]
            "#,
        );
        actioncache()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid minimum validity"));
    }

    #[test]
    fn check_rejects_remote_content_addressable_storage() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            &dir,
            r#"
            [content_addressable_storage.remote]
            address = "http://cache:8080"
            "#,
        );
        actioncache()
            .arg("--config")
            .arg(&config)
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to create Content Addressable Storage"));
    }

    #[test]
    fn get_misses_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "");
        actioncache()
            .arg("--config")
            .arg(&config)
            .args(["get", "8b1a9953c4611296a827abf8c47804d7", "123"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not found"));
    }

    #[test]
    fn get_rejects_malformed_digest() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "");
        actioncache()
            .arg("--config")
            .arg(&config)
            .args(["get", "not-a-hash", "123"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid digest hash"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        actioncache()
            .arg("--config")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        actioncache()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(path.exists());

        actioncache()
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"));
    }
}

mod pipeline_tests {
    use actioncache::blobstore::configuration::build_storage;
    use actioncache::config::Config;
    use actioncache::digest::{Digest, DigestKeyFormat, DigestRef};
    use actioncache::error::Code;
    use actioncache::messages::{self, ActionResult, OutputFile};
    use actioncache::remote::HttpClientFactory;
    use std::sync::Arc;

    const CONFIG: &str = r#"
        [content_addressable_storage.memory]

        [action_cache.completeness_checking.memory]
    "#;

    fn file(hash: &str) -> DigestRef {
        DigestRef {
            hash: hash.to_string(),
            size_bytes: 3,
        }
    }

    #[tokio::test]
    async fn completeness_checking_against_configured_cas() {
        let config: Config = toml::from_str(CONFIG).unwrap();
        let storage = build_storage(&config, Arc::new(HttpClientFactory::new(1 << 20))).unwrap();
        assert_eq!(storage.action_cache_backend, "completeness_checking");
        assert_eq!(
            storage.action_cache.digest_key_format,
            DigestKeyFormat::WithInstance
        );

        let action = Digest::new("main", "8b1a9953c4611296a827abf8c47804d7", 140).unwrap();
        let output = file("5d41402abc4b2a76b9719d911017c592");
        let result = ActionResult {
            output_files: vec![OutputFile {
                path: "out.txt".to_string(),
                digest: output.clone(),
                is_executable: false,
            }],
            ..Default::default()
        };
        let data = messages::encode(&result, 1 << 20).unwrap();
        storage
            .action_cache
            .blob_access
            .put(&action, data.clone())
            .await
            .unwrap();

        let err = storage.action_cache.blob_access.get(&action).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        storage
            .content_addressable_storage
            .blob_access
            .put(&action.derive(&output).unwrap(), b"abc".to_vec())
            .await
            .unwrap();
        assert_eq!(
            storage.action_cache.blob_access.get(&action).await.unwrap(),
            data
        );
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_pipeline() {
        let config: Config = toml::from_str(CONFIG).unwrap();
        let storage = build_storage(&config, Arc::new(HttpClientFactory::new(1 << 20))).unwrap();
        let action = Digest::new("main", "8b1a9953c4611296a827abf8c47804d7", 140).unwrap();
        let data = messages::encode(&ActionResult::default(), 1 << 20).unwrap();
        storage
            .action_cache
            .blob_access
            .put(&action, data.clone())
            .await
            .unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let ac = storage.action_cache.blob_access.clone();
            let action = action.clone();
            tasks.spawn(async move { ac.get(&action).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), data);
        }
    }
}
