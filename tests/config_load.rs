// tests/config_load.rs
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;

use zeitgeist::config::{Config, ENV_CONFIG_PATH};

const ENV_VARS: &[&str] = &[
    ENV_CONFIG_PATH,
    "GITHUB_ACTIONS",
    "ZEITGEIST_QUICK_TEST",
    "ZEITGEIST_OUTPUT_DIR",
    "ZEITGEIST_BATCH_SIZE",
];

fn clear_env() {
    for k in ENV_VARS {
        std::env::remove_var(k);
    }
}

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

#[test]
#[serial]
fn file_values_override_defaults() {
    clear_env();
    let f = write_config(
        r#"
[run]
output_dir = "out/reports"

[kalshi]
enabled = false

[polymarket]
page_size = 50
fast_exit = false

[classifier]
batch_size = 25
stagger_ms = 250
"#,
    );
    std::env::set_var(ENV_CONFIG_PATH, f.path());

    let cfg = Config::load_default().unwrap();
    assert_eq!(cfg.run.output_dir, PathBuf::from("out/reports"));
    assert!(!cfg.kalshi.enabled);
    assert_eq!(cfg.polymarket.page_size, 50);
    assert_eq!(cfg.polymarket.page_limit(cfg.run.quick_test()), None);
    assert_eq!(cfg.classifier.batch_size, 25);
    assert_eq!(cfg.classifier.stagger().as_millis(), 250);
    assert!(cfg.run.quick_test(), "local runs default to quick test");
    clear_env();
}

#[test]
#[serial]
fn env_overrides_apply_after_file() {
    clear_env();
    let f = write_config("[classifier]\nbatch_size = 25\n");
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var("ZEITGEIST_BATCH_SIZE", "7");
    std::env::set_var("ZEITGEIST_QUICK_TEST", "false");
    std::env::set_var("ZEITGEIST_OUTPUT_DIR", "/tmp/zeitgeist-out");

    let cfg = Config::load_default().unwrap();
    assert_eq!(cfg.classifier.batch_size, 7);
    assert!(!cfg.run.quick_test());
    assert_eq!(cfg.kalshi.page_limit(cfg.run.quick_test()), None);
    assert_eq!(cfg.run.output_dir, PathBuf::from("/tmp/zeitgeist-out"));
    clear_env();
}

#[test]
#[serial]
fn missing_config_path_is_an_error() {
    clear_env();
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let err = Config::load_default().unwrap_err();
    assert!(format!("{err:#}").contains("non-existent"));
    clear_env();
}

#[test]
#[serial]
fn production_forbids_quick_test() {
    clear_env();
    let f = write_config("[run]\nquick_test = true\n");
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var("GITHUB_ACTIONS", "true");
    assert!(Config::load_default().is_err());

    // Without an explicit flag, production runs go full length.
    let f = write_config("");
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    let cfg = Config::load_default().unwrap();
    assert!(cfg.run.is_prod);
    assert!(!cfg.run.quick_test());
    clear_env();
}

#[test]
#[serial]
fn bad_batch_size_override_is_rejected() {
    clear_env();
    let f = write_config("");
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var("ZEITGEIST_BATCH_SIZE", "lots");
    assert!(Config::load_default().is_err());

    std::env::set_var("ZEITGEIST_BATCH_SIZE", "0");
    assert!(Config::load_default().is_err());
    clear_env();
}
