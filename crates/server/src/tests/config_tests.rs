use super::*;

use std::collections::HashMap;

#[test]
fn defaults_carry_the_original_fleet() {
    let settings = Settings::default();
    let devices = settings.devices();
    assert_eq!(devices.len(), 8);
    assert_eq!(devices[0].name, "CADDY 14");
    assert_eq!(devices[7].id, DeviceId::from("463"));
    assert!(devices.iter().all(|device| device.dialect == "st300"));
    assert!(settings.user_api_hash.is_none());
}

#[test]
fn file_replaces_devices_and_adds_dialects() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
bind_addr = "0.0.0.0:9000"
api_base_url = "http://tracker.test"
devices_timeout_secs = 3

[[devices]]
name = "TRACTO 01"
id = 510
imei = "807356200"
dialect = "st300_fifth_wheel"

[[devices]]
name = "Moto 02"
id = "611"
imei = "351234"
dialect = "teltonika"

[dialects.teltonika]
stop = "setdigout 1?"
resume = "setdigout 0?"
"#,
    )
    .expect("apply file");

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.devices_timeout_secs, 3);
    assert_eq!(settings.command_timeout_secs, 15);

    let devices = settings.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, DeviceId::from("510"));
    assert_eq!(devices[1].dialect, "teltonika");

    let table = settings.dialect_table().expect("dialects");
    assert_eq!(
        table.render(&devices[1], CommandType::Stop).as_deref(),
        Some("setdigout 1?")
    );
    assert!(table.contains("st300"));
}

#[test]
fn unknown_keys_in_file_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "bind = \"0.0.0.0:1\"").is_err());
}

#[test]
fn dialect_with_unknown_command_type_is_rejected() {
    let mut settings = Settings::default();
    settings.dialects.insert(
        "custom".to_string(),
        HashMap::from([("reboot".to_string(), "RST".to_string())]),
    );
    let err = settings.dialect_table().expect_err("unknown command");
    assert!(err.to_string().contains("reboot"), "{err}");
}

#[test]
fn prefixed_env_vars_win_over_plain_ones() {
    let env = HashMap::from([
        ("SERVER_BIND", "127.0.0.1:1"),
        ("APP__BIND_ADDR", "127.0.0.1:2"),
        ("USER_API_HASH", "hash-from-env"),
        ("APP__COMMAND_TIMEOUT_SECS", "30"),
        ("APP__DEVICES_TIMEOUT_SECS", "soon"),
    ]);
    let mut settings = Settings::default();
    apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

    assert_eq!(settings.server_bind, "127.0.0.1:2");
    assert_eq!(settings.user_api_hash.as_deref(), Some("hash-from-env"));
    assert_eq!(settings.command_timeout_secs, 30);
    assert_eq!(settings.devices_timeout_secs, 10);
}

#[test]
fn tracker_config_validates_url_and_blank_hash() {
    let mut settings = Settings {
        user_api_hash: Some("   ".to_string()),
        ..Settings::default()
    };
    let config = settings.tracker_config().expect("tracker config");
    assert!(config.user_api_hash.is_none());
    assert_eq!(config.command_timeout, Duration::from_secs(15));

    settings.api_base_url = "not a url".to_string();
    assert!(settings.tracker_config().is_err());
}
