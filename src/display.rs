//! Keyboard-driven seed set switching.
//!
//! Typing a seed set name and pressing Enter switches the visual to that
//! set. Backspace removes the last typed character; other control keys are
//! ignored.

use crate::seeds::SeedRegistry;

/// Key presses the display loop cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Enter,
    Backspace,
    /// Text produced by a key press
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Still typing
    Pending,
    /// A known seed set was entered
    Switch(String),
    /// Enter was pressed on a name the registry does not know
    Unknown(String),
}

/// Whether the pipeline is running or about to restart on a new set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Running,
    Switching(String),
}

/// Typed-character buffer
#[derive(Debug, Default)]
pub struct InputState {
    typed: String,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    /// Apply one key press. Enter always clears the buffer.
    pub fn handle(&mut self, key: KeyInput, registry: &SeedRegistry) -> InputOutcome {
        match key {
            KeyInput::Enter => {
                let entered = std::mem::take(&mut self.typed);
                let name = entered.trim();
                if name.is_empty() {
                    InputOutcome::Pending
                } else if registry.contains(name) {
                    InputOutcome::Switch(name.to_string())
                } else {
                    InputOutcome::Unknown(name.to_string())
                }
            }
            KeyInput::Backspace => {
                self.typed.pop();
                InputOutcome::Pending
            }
            KeyInput::Text(text) => {
                self.typed.extend(text.chars().filter(|c| !c.is_control()));
                InputOutcome::Pending
            }
        }
    }
}

/// Title showing the active set and whatever is being typed
pub fn window_title(base: &str, active: Option<&str>, typed: &str) -> String {
    let mut title = base.to_string();
    if let Some(active) = active {
        title.push_str(&format!(" [{}]", active));
    }
    if !typed.is_empty() {
        title.push_str(&format!(" > {}", typed));
    }
    title
}
