//! Conversion options and logging driven by the config file.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use fusion_config::{ConfigError, FusionConfig};
use fusion_core::{ContinuationAffinity, EagerOperation, to_deferred};

use crate::common::{ANSWER, delay_and_return, init_tracing};

#[tokio::test]
async fn configured_options_drive_to_deferred() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[bridge]
continue_on_captured_context = false

[logging]
filter = "fusion_core=debug"
"#,
    )?;

    let config = FusionConfig::load_from(&path)?;
    let options = config.conversion_options();
    assert_eq!(options.affinity, ContinuationAffinity::AnyContext);
    assert_eq!(config.log_filter(), "fusion_core=debug");

    let operation = EagerOperation::spawn(delay_and_return())?;
    assert_eq!(to_deferred(operation, options).run().await?, ANSWER);
    Ok(())
}

#[tokio::test]
async fn missing_bridge_table_keeps_captured_context() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[logging]\n").unwrap();

    let config = FusionConfig::load_from(&path).unwrap();
    assert_eq!(
        config.conversion_options().affinity,
        ContinuationAffinity::CapturedContext
    );

    let operation = EagerOperation::spawn(delay_and_return()).unwrap();
    let computation = to_deferred(operation, config.conversion_options());
    assert_eq!(computation.run().await.unwrap(), ANSWER);
}

#[test]
fn unknown_keys_are_rejected_with_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[bridge]\nresume_inline = true\n").unwrap();

    let err = FusionConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), path.as_path());
}

#[test]
fn unreadable_config_reports_read_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = FusionConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
