//! Integration tests for Configuration System

use crate::integration::test_utils::with_isolated_env;
use remount::cli::{Commands, CommandOutput, RunContext};
use remount::config::{global_config_path, ConfigLoader, StoreBackend};

#[test]
fn test_global_config_path_follows_xdg() {
    with_isolated_env(|root| {
        assert_eq!(
            global_config_path().unwrap(),
            root.join("xdg").join("remount").join("config.toml")
        );
    });
}

#[test]
fn test_defaults_without_any_files() {
    with_isolated_env(|root| {
        let config = ConfigLoader::load(&root.join("workspace")).unwrap();
        assert_eq!(config.snapshot.max_concurrency, 64);
        assert_eq!(config.store.backend, StoreBackend::Sled);
        assert!(config.validate().is_ok());
    });
}

#[test]
fn test_env_specific_workspace_file_wins() {
    with_isolated_env(|root| {
        let workspace = root.join("workspace");
        let dir = workspace.join(".remount");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[snapshot]\nmax_concurrency = 10\n").unwrap();
        std::fs::write(dir.join("ci.toml"), "[snapshot]\nmax_concurrency = 2\n").unwrap();

        std::env::set_var("REMOUNT_ENV", "ci");
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.snapshot.max_concurrency, 2);
    });
}

#[test]
fn test_invalid_file_value_fails_validation() {
    with_isolated_env(|root| {
        let file = root.join("bad.toml");
        std::fs::write(&file, "[snapshot]\nmax_concurrency = 0\n").unwrap();

        let config = ConfigLoader::load_from_file(&file).unwrap();
        assert!(config.validate().is_err());
        assert!(RunContext::new(root.to_path_buf(), Some(file)).is_err());
    });
}

#[test]
fn test_config_command_prints_effective_toml() {
    with_isolated_env(|root| {
        let file = root.join("remount.toml");
        std::fs::write(&file, "[store]\nbackend = \"memory\"\n\n[snapshot]\nmax_concurrency = 5\n")
            .unwrap();

        let ctx = RunContext::new(root.to_path_buf(), Some(file)).unwrap();
        let CommandOutput::Text(text) = ctx.execute(&Commands::Config).unwrap() else {
            panic!("config prints text");
        };
        assert!(text.contains("backend = \"memory\""));
        assert!(text.contains("max_concurrency = 5"));
    });
}
