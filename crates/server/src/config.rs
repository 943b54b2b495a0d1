use std::{collections::HashMap, fs, io, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use server_api::{DialectTable, DEFAULT_DIALECT};
use shared::domain::{CommandType, Device, DeviceId};
use tracker_client::TrackerConfig;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub api_base_url: String,
    pub user_api_hash: Option<String>,
    pub api_lang: String,
    pub devices_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub devices: Vec<DeviceSettings>,
    /// Dialect name to command type name to template.
    pub dialects: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceSettings {
    pub name: String,
    pub id: ConfiguredId,
    pub imei: String,
    #[serde(default = "default_dialect")]
    pub dialect: String,
}

/// Device ids may be written as TOML integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConfiguredId {
    Text(String),
    Number(i64),
}

impl ConfiguredId {
    fn into_device_id(self) -> DeviceId {
        match self {
            Self::Text(id) => DeviceId::new(id.trim()),
            Self::Number(id) => DeviceId::new(id.to_string()),
        }
    }
}

fn default_dialect() -> String {
    DEFAULT_DIALECT.to_string()
}

fn builtin_device(name: &str, id: &str, imei: &str) -> DeviceSettings {
    DeviceSettings {
        name: name.into(),
        id: ConfiguredId::Text(id.into()),
        imei: imei.into(),
        dialect: default_dialect(),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            api_base_url: "http://5.78.94.130".into(),
            user_api_hash: None,
            api_lang: "es".into(),
            devices_timeout_secs: 10,
            command_timeout_secs: 15,
            devices: vec![
                builtin_device("CADDY 14", "242", "807356113"),
                builtin_device("CADDY 15", "325", "807356123"),
                builtin_device("CADDY 16", "68", "807356121"),
                builtin_device("KANGOO 08", "150", "807397691"),
                builtin_device("KANGOO 09", "149", "807397686"),
                builtin_device("KANGOO 10", "394", "807356127"),
                builtin_device("NISSAN 11", "74", "807110416"),
                builtin_device("Prueba ignición", "463", "807356132"),
            ],
            dialects: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    api_base_url: Option<String>,
    user_api_hash: Option<String>,
    api_lang: Option<String>,
    devices_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    devices: Option<Vec<DeviceSettings>>,
    #[serde(default)]
    dialects: HashMap<String, HashMap<String, String>>,
}

/// Defaults, then the TOML settings file, then environment variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    match fs::read_to_string(&path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid settings file '{path}'"))?;
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read settings file '{path}'"));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.user_api_hash {
        settings.user_api_hash = Some(v);
    }
    if let Some(v) = file_cfg.api_lang {
        settings.api_lang = v;
    }
    if let Some(v) = file_cfg.devices_timeout_secs {
        settings.devices_timeout_secs = v;
    }
    if let Some(v) = file_cfg.command_timeout_secs {
        settings.command_timeout_secs = v;
    }
    if let Some(v) = file_cfg.devices {
        settings.devices = v;
    }
    settings.dialects.extend(file_cfg.dialects);
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("USER_API_HASH") {
        settings.user_api_hash = Some(v);
    }

    if let Some(v) = var("APP__API_LANG") {
        settings.api_lang = v;
    }

    if let Some(parsed) = var("APP__DEVICES_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.devices_timeout_secs = parsed;
    }
    if let Some(parsed) = var("APP__COMMAND_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.command_timeout_secs = parsed;
    }
}

impl Settings {
    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .cloned()
            .map(|device| Device {
                name: device.name.trim().to_string(),
                id: device.id.into_device_id(),
                imei: device.imei.trim().to_string(),
                dialect: device.dialect,
            })
            .collect()
    }

    /// Built-in dialects plus the ones declared in settings.
    pub fn dialect_table(&self) -> anyhow::Result<DialectTable> {
        let mut table = DialectTable::builtin();
        for (name, templates) in &self.dialects {
            let templates = templates
                .iter()
                .map(|(command, template)| {
                    command
                        .parse::<CommandType>()
                        .map(|command| (command, template.clone()))
                        .map_err(|_| {
                            anyhow!("dialect '{name}' has unknown command type '{command}'")
                        })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            table.insert(name.clone(), templates);
        }
        Ok(table)
    }

    pub fn tracker_config(&self) -> anyhow::Result<TrackerConfig> {
        let base_url = Url::parse(self.api_base_url.trim())
            .with_context(|| format!("invalid API base url '{}'", self.api_base_url))?;
        Ok(TrackerConfig {
            base_url,
            user_api_hash: self
                .user_api_hash
                .clone()
                .filter(|hash| !hash.trim().is_empty()),
            lang: self.api_lang.clone(),
            devices_timeout: Duration::from_secs(self.devices_timeout_secs.max(1)),
            command_timeout: Duration::from_secs(self.command_timeout_secs.max(1)),
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
