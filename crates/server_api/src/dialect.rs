use std::collections::HashMap;

use shared::domain::{CommandType, Device};

pub const DEFAULT_DIALECT: &str = "st300";

/// Command templates per device dialect.
///
/// A template is the literal command string with `{imei}` and `{id}`
/// placeholders. A dialect without a template for a command type does not
/// support that command.
#[derive(Debug, Clone, Default)]
pub struct DialectTable {
    dialects: HashMap<String, HashMap<CommandType, String>>,
}

impl DialectTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::empty()
            .with_dialect(
                "st300",
                [
                    (CommandType::Stop, "ST300CMD;{imei};02;Disable1"),
                    (CommandType::Resume, "ST300CMD;{imei};02;Enable1"),
                ],
            )
            .with_dialect(
                "st300_fifth_wheel",
                [
                    (CommandType::Stop, "ST300CMD;{imei};02;Disable1"),
                    (CommandType::Resume, "ST300CMD;{imei};02;Enable1"),
                    (CommandType::BlockFifthWheel, "ST300CMD;{imei};02;Disable2"),
                    (CommandType::ReleaseFifthWheel, "ST300CMD;{imei};02;Enable2"),
                ],
            )
            .with_dialect(
                "digital_output",
                [
                    (CommandType::Stop, "setdigout 1"),
                    (CommandType::Resume, "setdigout 0"),
                ],
            )
    }

    /// Register a dialect, replacing any dialect of the same name.
    pub fn with_dialect<I, T>(mut self, name: impl Into<String>, templates: I) -> Self
    where
        I: IntoIterator<Item = (CommandType, T)>,
        T: Into<String>,
    {
        self.insert(name, templates);
        self
    }

    pub fn insert<I, T>(&mut self, name: impl Into<String>, templates: I)
    where
        I: IntoIterator<Item = (CommandType, T)>,
        T: Into<String>,
    {
        let templates = templates
            .into_iter()
            .map(|(command, template)| (command, template.into()))
            .collect();
        self.dialects.insert(name.into(), templates);
    }

    pub fn contains(&self, dialect: &str) -> bool {
        self.dialects.contains_key(dialect)
    }

    pub fn supported_commands(&self, dialect: &str) -> Vec<CommandType> {
        let Some(templates) = self.dialects.get(dialect) else {
            return Vec::new();
        };
        CommandType::ALL
            .into_iter()
            .filter(|command| templates.contains_key(command))
            .collect()
    }

    /// Command string for `device`, or `None` when its dialect lacks `command`.
    pub fn render(&self, device: &Device, command: CommandType) -> Option<String> {
        let template = self.dialects.get(&device.dialect)?.get(&command)?;
        Some(
            template
                .replace("{imei}", &device.imei)
                .replace("{id}", device.id.as_str()),
        )
    }
}
