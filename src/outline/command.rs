/// Keys the outline reacts to; everything else is plain text editing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalKey {
    Enter,
    Tab,
    Delete,
    Backspace,
    Other,
}

impl LogicalKey {
    /// From a DOM `KeyboardEvent.key` value.
    pub fn from_dom_key(key: &str) -> Self {
        match key {
            "Enter" => Self::Enter,
            "Tab" => Self::Tab,
            "Delete" => Self::Delete,
            "Backspace" => Self::Backspace,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyChord {
    pub key: LogicalKey,
    pub mods: Modifiers,
}

impl KeyChord {
    pub fn new(key: LogicalKey, mods: Modifiers) -> Self {
        Self { key, mods }
    }
}

/// A structural command on the focused node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    AddSibling,
    Indent,
    Outdent,
    Delete,
    ToggleStatus,
    /// Text surface lost focus with this content.
    CommitText(String),
    /// Checkbox change notification carrying the checkbox's new state.
    SetChecked(bool),
}

impl Command {
    /// Enter adds a sibling, Ctrl+Enter toggles status, Tab/Shift+Tab indent/outdent,
    /// Ctrl+Delete deletes. Ctrl+Backspace stays a text-editing chord.
    pub fn from_chord(chord: KeyChord) -> Option<Self> {
        match (chord.key, chord.mods) {
            (LogicalKey::Enter, Modifiers::NONE) => Some(Self::AddSibling),
            (LogicalKey::Enter, Modifiers::CTRL) => Some(Self::ToggleStatus),
            (LogicalKey::Tab, Modifiers::NONE) => Some(Self::Indent),
            (LogicalKey::Tab, Modifiers::SHIFT) => Some(Self::Outdent),
            (LogicalKey::Delete, Modifiers::CTRL) => Some(Self::Delete),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(key: LogicalKey, mods: Modifiers) -> Option<Command> {
        Command::from_chord(KeyChord::new(key, mods))
    }

    #[test]
    fn test_chord_table() {
        assert_eq!(cmd(LogicalKey::Enter, Modifiers::NONE), Some(Command::AddSibling));
        assert_eq!(cmd(LogicalKey::Enter, Modifiers::CTRL), Some(Command::ToggleStatus));
        assert_eq!(cmd(LogicalKey::Tab, Modifiers::NONE), Some(Command::Indent));
        assert_eq!(cmd(LogicalKey::Tab, Modifiers::SHIFT), Some(Command::Outdent));
        assert_eq!(cmd(LogicalKey::Delete, Modifiers::CTRL), Some(Command::Delete));
    }

    #[test]
    fn test_word_delete_chords_do_not_remove_nodes() {
        assert_eq!(cmd(LogicalKey::Backspace, Modifiers::CTRL), None);
        let shifted = Modifiers {
            shift: true,
            ctrl: true,
        };
        assert_eq!(cmd(LogicalKey::Backspace, shifted), None);
    }

    #[test]
    fn test_plain_editing_keys_are_not_commands() {
        assert_eq!(cmd(LogicalKey::Delete, Modifiers::NONE), None);
        assert_eq!(cmd(LogicalKey::Backspace, Modifiers::NONE), None);
        assert_eq!(cmd(LogicalKey::Enter, Modifiers::SHIFT), None);
        assert_eq!(cmd(LogicalKey::Tab, Modifiers::CTRL), None);
        assert_eq!(cmd(LogicalKey::Other, Modifiers::NONE), None);
        let both = Modifiers {
            shift: true,
            ctrl: true,
        };
        assert_eq!(cmd(LogicalKey::Enter, both), None);
    }

    #[test]
    fn test_dom_key_names() {
        assert_eq!(LogicalKey::from_dom_key("Enter"), LogicalKey::Enter);
        assert_eq!(LogicalKey::from_dom_key("Tab"), LogicalKey::Tab);
        assert_eq!(LogicalKey::from_dom_key("a"), LogicalKey::Other);
    }
}
