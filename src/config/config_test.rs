use std::io::Write;

use serial_test::serial;

use super::*;

fn cleanup_all_autorail_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("AUTORAIL__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
fn default_config_should_initialize_with_hardcoded_values() {
    let settings = Settings::default();

    assert!(settings.validate().is_ok());
    assert_eq!(settings.autopilot.wait.min_ms, 2_000);
    assert_eq!(settings.autopilot.wait.max_ms, 10_000);
    assert_eq!(settings.autopilot.reservation.permits, 1);
    assert_eq!(settings.station.event_capacity, 256);
    assert!(!settings.autopilot.step_mode);
}

#[test]
fn test_invalid_wait_window() {
    let mut config = AutopilotConfig::default();
    config.wait = WaitConfig {
        min_ms: 5_000,
        max_ms: 1_000,
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_zero_gate_permits_rejected() {
    let mut config = AutopilotConfig::default();
    config.reservation = ReservationConfig {
        permits: 0,
        ..Default::default()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_zero_poll_interval_rejected() {
    let mut config = AutopilotConfig::default();
    config.sensors.poll_interval_ms = 0;

    assert!(config.validate().is_err());
}

#[test]
fn test_unbounded_stall_timeout() {
    let mut config = AutopilotConfig::default();
    config.sensors.stall_timeout_ms = 0;

    assert!(config.validate().is_ok());
    assert_eq!(config.sensors.stall_timeout(), None);
}

#[test]
#[serial]
fn load_should_merge_explicit_config_file() {
    cleanup_all_autorail_env_vars();

    let mut file = tempfile::NamedTempFile::with_suffix(".toml").expect("create temp config");
    writeln!(
        file,
        r#"
[autopilot]
step_mode = true

[autopilot.wait]
min_ms = 10
max_ms = 20

[station]
event_capacity = 16
"#
    )
    .expect("write temp config");

    let settings =
        Settings::load(Some(file.path().to_str().expect("temp path"))).expect("load settings");

    assert!(settings.autopilot.step_mode);
    assert_eq!(settings.autopilot.wait.min_ms, 10);
    assert_eq!(settings.station.event_capacity, 16);
    // untouched sections keep their defaults
    assert_eq!(settings.autopilot.reservation.permits, 1);
}

#[test]
#[serial]
fn load_should_merge_environment_overrides() {
    cleanup_all_autorail_env_vars();
    std::env::set_var("AUTORAIL__AUTOPILOT__RESERVATION__PERMITS", "2");

    let settings = Settings::load(None).expect("load settings");

    cleanup_all_autorail_env_vars();

    assert_eq!(settings.autopilot.reservation.permits, 2);
}

#[test]
#[serial]
fn load_should_reject_invalid_merged_config() {
    cleanup_all_autorail_env_vars();
    std::env::set_var("AUTORAIL__AUTOPILOT__WAIT__MIN_MS", "9000");
    std::env::set_var("AUTORAIL__AUTOPILOT__WAIT__MAX_MS", "100");

    let result = Settings::load(None);

    cleanup_all_autorail_env_vars();

    assert!(result.is_err());
}
