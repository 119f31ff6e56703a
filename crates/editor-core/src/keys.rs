use serde::{Deserialize, Serialize};

use crate::core::Editor;

/// A key press, independent of any UI toolkit. `command` is the platform's
/// primary modifier (cmd on macOS, ctrl elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub command: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn command(mut self) -> Self {
        self.command = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }
}

/// Maps a key press to a key command name.
pub fn default_key_binding(chord: &KeyChord) -> Option<&'static str> {
    let key = chord.key.to_ascii_lowercase();
    if chord.command && !chord.alt {
        return match (key.as_str(), chord.shift) {
            ("b", false) => Some("bold"),
            ("i", false) => Some("italic"),
            ("u", false) => Some("underline"),
            ("j", false) => Some("code"),
            ("x", true) => Some("strikethrough"),
            ("z", false) => Some("undo"),
            ("z", true) | ("y", false) => Some("redo"),
            _ => None,
        };
    }
    if chord.command {
        return None;
    }
    match key.as_str() {
        "backspace" => Some("backspace"),
        "delete" => Some("delete"),
        "enter" if !chord.shift => Some("split-block"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleValue {
    Handled,
    NotHandled,
}

impl HandleValue {
    pub fn as_str(self) -> &'static str {
        match self {
            HandleValue::Handled => "handled",
            HandleValue::NotHandled => "not-handled",
        }
    }

    pub fn is_handled(self) -> bool {
        self == HandleValue::Handled
    }
}

impl Editor {
    /// Runs the command bound to a key command name. Only a command that
    /// actually produced a new state counts as handled; the host falls back
    /// to default editing otherwise.
    pub fn handle_key_command(&mut self, name: &str) -> HandleValue {
        let Some(binding) = self.registry().key_command(name).cloned() else {
            return HandleValue::NotHandled;
        };

        let version = self.version();
        if let Err(err) = self.run_command(&binding.command, binding.args) {
            log::debug!("key command {name} not handled: {err}");
            return HandleValue::NotHandled;
        }

        if self.version() != version {
            HandleValue::Handled
        } else {
            HandleValue::NotHandled
        }
    }
}
