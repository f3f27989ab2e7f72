//! Key combinations, commands, and per-view key binding tables.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

/// A single key press with optional modifier keys (Ctrl, Alt, Shift).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    /// The base key code (e.g. a character, arrow key, or function key).
    pub code: KeyCode,
    /// Modifier keys that must be held alongside the base key.
    pub modifiers: KeyModifiers,
}

impl KeyCombination {
    /// Create a key combination with no modifier keys.
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    /// Create a key combination with the Ctrl modifier.
    pub const fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    /// Create a key combination with the Alt modifier.
    pub const fn alt(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::ALT,
        }
    }

    /// Create a key combination with the Shift modifier.
    pub const fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    /// Create a key combination with an explicit set of modifier keys.
    pub const fn with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }
}

impl From<&KeyEvent> for KeyCombination {
    fn from(event: &KeyEvent) -> Self {
        // Terminals report Shift+Tab as BackTab, with or without SHIFT set.
        let modifiers = match event.code {
            KeyCode::BackTab => event.modifiers.difference(KeyModifiers::SHIFT),
            _ => event.modifiers,
        };
        Self {
            code: event.code,
            modifiers,
        }
    }
}

/// An action a key binding resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Move focus to the next focusable view of the toplevel.
    NextView,
    /// Move focus to the previous focusable view of the toplevel.
    PreviousView,
    /// Request that the current toplevel stop running.
    QuitToplevel,
    /// Clear the screen and redraw every toplevel.
    Refresh,
    /// Suspend the process (SIGTSTP on unix).
    Suspend,
    /// Confirm the focused element (default-button semantics).
    Accept,
    /// Dismiss the focused element.
    Cancel,
    /// Application-defined command, matched by name.
    Custom(&'static str),
}

/// Which dispatch pass consults a binding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyBindingScope {
    /// Consulted in the normal pass, only along the focus path.
    #[default]
    Focused,
    /// Consulted in the hot-key pass, for every view of the toplevel.
    HotKey,
}

/// Commands bound to one key combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    /// Commands invoked in order until one is handled.
    pub commands: Vec<Command>,
    pub scope: KeyBindingScope,
}

/// The key binding table of a single view.
#[derive(Debug, Default, Clone)]
pub struct KeyBindings {
    bindings: HashMap<KeyCombination, KeyBinding>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `commands` in the focused scope, replacing any prior binding.
    pub fn add(&mut self, key: KeyCombination, commands: impl IntoIterator<Item = Command>) {
        self.add_scoped(key, KeyBindingScope::Focused, commands);
    }

    /// Bind `key` to `commands` in an explicit scope, replacing any prior binding.
    pub fn add_scoped(
        &mut self,
        key: KeyCombination,
        scope: KeyBindingScope,
        commands: impl IntoIterator<Item = Command>,
    ) {
        self.bindings.insert(
            key,
            KeyBinding {
                commands: commands.into_iter().collect(),
                scope,
            },
        );
    }

    pub fn remove(&mut self, key: &KeyCombination) -> Option<KeyBinding> {
        self.bindings.remove(key)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn get(&self, key: &KeyCombination) -> Option<&KeyBinding> {
        self.bindings.get(key)
    }

    /// Resolve a key event to the commands bound in `scope`.
    pub fn resolve(&self, event: &KeyEvent, scope: KeyBindingScope) -> Option<&[Command]> {
        self.bindings
            .get(&KeyCombination::from(event))
            .filter(|binding| binding.scope == scope)
            .map(|binding| binding.commands.as_slice())
    }

    /// Find the key currently bound to `command`, if any.
    pub fn key_for(&self, command: &Command) -> Option<KeyCombination> {
        self.bindings
            .iter()
            .find(|(_, binding)| binding.commands.contains(command))
            .map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_respects_scope() {
        let mut kb = KeyBindings::new();
        kb.add(KeyCombination::new(KeyCode::Tab), [Command::NextView]);
        kb.add_scoped(
            KeyCombination::alt(KeyCode::Char('f')),
            KeyBindingScope::HotKey,
            [Command::Custom("file")],
        );

        let tab = KeyEvent::from(KeyCode::Tab);
        assert_eq!(
            kb.resolve(&tab, KeyBindingScope::Focused),
            Some(&[Command::NextView][..])
        );
        assert_eq!(kb.resolve(&tab, KeyBindingScope::HotKey), None);

        let alt_f = KeyEvent::new(KeyCode::Char('f'), KeyModifiers::ALT);
        assert!(kb.resolve(&alt_f, KeyBindingScope::Focused).is_none());
        assert!(kb.resolve(&alt_f, KeyBindingScope::HotKey).is_some());
    }

    #[test]
    fn modifiers_must_match_exactly() {
        let mut kb = KeyBindings::new();
        kb.add(KeyCombination::ctrl(KeyCode::Char('q')), [Command::QuitToplevel]);
        let plain = KeyEvent::from(KeyCode::Char('q'));
        let ctrl = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(kb.resolve(&plain, KeyBindingScope::Focused).is_none());
        assert!(kb.resolve(&ctrl, KeyBindingScope::Focused).is_some());
    }

    #[test]
    fn back_tab_ignores_reported_shift() {
        let mut kb = KeyBindings::new();
        kb.add(KeyCombination::new(KeyCode::BackTab), [Command::PreviousView]);
        let reported = KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT);
        assert!(kb.resolve(&reported, KeyBindingScope::Focused).is_some());
    }

    #[test]
    fn rebinding_replaces_and_key_for_finds_it() {
        let mut kb = KeyBindings::new();
        kb.add(KeyCombination::ctrl(KeyCode::Char('q')), [Command::QuitToplevel]);
        kb.remove(&KeyCombination::ctrl(KeyCode::Char('q')));
        kb.add(KeyCombination::new(KeyCode::Esc), [Command::QuitToplevel]);
        assert_eq!(kb.len(), 1);
        assert_eq!(
            kb.key_for(&Command::QuitToplevel),
            Some(KeyCombination::new(KeyCode::Esc))
        );
    }
}
