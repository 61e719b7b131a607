use serde::{Deserialize, Serialize};

/// The envelope exchanged with the gowon host, over HTTP or MQTT.
///
/// Every field is optional on the wire; empty values are left out when the
/// envelope is serialized back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nick: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

/// A command token and the raw text that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: String,
}

impl Message {
    /// Work out which command this message invokes.
    ///
    /// A host that already split the line fills `command`/`args`; otherwise
    /// `msg` has to start with `prefix` directly followed by the command.
    #[must_use]
    pub fn invocation(&self, prefix: &str) -> Option<Invocation> {
        let command = self.command.trim();
        if !command.is_empty() {
            return Some(Invocation {
                command: command.to_owned(),
                args: self.args.trim().to_owned(),
            });
        }

        if prefix.is_empty() {
            return None;
        }
        let rest = self.msg.trim_start().strip_prefix(prefix)?;
        let (command, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }
        Some(Invocation {
            command: command.to_owned(),
            args: args.trim().to_owned(),
        })
    }

    /// Copy of this envelope carrying `text` from `module`.
    #[must_use]
    pub fn reply(&self, module: &str, text: impl Into<String>) -> Self {
        Self {
            module: module.to_owned(),
            msg: text.into(),
            ..self.clone()
        }
    }
}
