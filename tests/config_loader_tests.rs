use legend_engine_operator::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const KEYS: [&str; 12] = [
    "PROFILE",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "STATE_PATH",
    "WORKLOAD_ROOT",
    "RESTART_COMMAND",
    "UNIT_ADDRESS",
    "APP_NAME",
    "DEPLOYMENT_MODE",
    "SERVER_LOGGING_LEVEL",
    "SERVER_PAC4J_LOGGING_LEVEL",
    "ROOT_PATH",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for key in KEYS {
        unsafe {
            env::remove_var(format!("LEGEND_ENGINE_{key}"));
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.unit_address, "127.0.0.1");
    assert_eq!(cfg.app_name, "finos-legend-engine-k8s");
    assert_eq!(cfg.engine.server_log_level, "INFO");
    assert_eq!(cfg.engine.pac4j_log_level, "INFO");
    assert_eq!(cfg.engine.root_path, "/api");
    assert_eq!(cfg.engine.deployment_mode, "TEST_IGNORE_FUNCTION_MATCH");
    assert!(cfg.restart_command.is_none());
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "LEGEND_ENGINE_UNIT_ADDRESS=10.0.0.1\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "LEGEND_ENGINE_UNIT_ADDRESS=10.0.0.2\nLEGEND_ENGINE_SERVER_LOGGING_LEVEL=DEBUG\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "LEGEND_ENGINE_UNIT_ADDRESS=10.0.0.5\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "LEGEND_ENGINE_PROFILE=test\nLEGEND_ENGINE_UNIT_ADDRESS=10.0.0.3\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.unit_address, "10.0.0.5");
    assert_eq!(cfg.engine.server_log_level, "DEBUG");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "LEGEND_ENGINE_ROOT_PATH=/engine\nLEGEND_ENGINE_SERVER_PAC4J_LOGGING_LEVEL=TRACE\n",
    );

    unsafe {
        env::set_var("LEGEND_ENGINE_SERVER_PAC4J_LOGGING_LEVEL", "WARN");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.engine.root_path, "/engine");
    assert_eq!(cfg.engine.pac4j_log_level, "WARN");

    clear_env();
}

#[test]
fn invalid_log_levels_are_deferred_to_reconcile() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LEGEND_ENGINE_SERVER_LOGGING_LEVEL", "verbose");
    }
    let temp_dir = TempDir::new().unwrap();
    let cfg = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()))
        .load()
        .expect("log levels are not checked while loading");

    assert_eq!(cfg.engine.server_log_level, "verbose");
    assert!(cfg.engine.validate().is_err());
    clear_env();
}

#[test]
fn invalid_log_format_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LEGEND_ENGINE_LOG_FORMAT", "xml");
    }
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()))
        .load()
        .expect_err("unknown log format should fail");
    assert!(matches!(err, ConfigError::InvalidLogFormat { .. }));

    clear_env();
}

#[test]
fn root_path_must_be_absolute() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LEGEND_ENGINE_ROOT_PATH", "api");
    }
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()))
        .load()
        .expect_err("relative root path should fail");
    assert!(format!("{err}").contains("root path must start with '/'"));

    clear_env();
}

#[test]
fn restart_command_is_redacted() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LEGEND_ENGINE_RESTART_COMMAND", "systemctl restart engine --token s3cret");
    }
    let temp_dir = TempDir::new().unwrap();
    let cfg = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()))
        .load()
        .unwrap();

    let redacted = cfg.redacted_json().unwrap();
    assert!(!redacted.contains("s3cret"));
    assert!(cfg.restart_command.is_some());
    clear_env();
}
