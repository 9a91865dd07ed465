// src/lock.rs
//! PIN handling and the app-lock gate.
use crate::error::PinError;
use crate::observable::{Cell, Watch};
use crate::settings::{Preferences, SettingsStore};
use std::fmt;

pub const PIN_LENGTH: usize = 6;

/// A PIN that has passed validation: exactly six ASCII digits.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn parse(input: &str) -> Result<Pin, PinError> {
        if !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(PinError::NonDigit);
        }
        if input.len() != PIN_LENGTH {
            return Err(PinError::WrongLength {
                expected: PIN_LENGTH,
                actual: input.len(),
            });
        }
        Ok(Pin(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the digits.
impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(******)")
    }
}

/// Typed PIN entry: drops anything that is not a digit and stops at six.
#[derive(Debug, Default, Clone)]
pub struct PinInput {
    digits: String,
}

impl PinInput {
    pub fn new() -> Self {
        PinInput::default()
    }

    pub fn push(&mut self, c: char) {
        if c.is_ascii_digit() && self.digits.len() < PIN_LENGTH {
            self.digits.push(c);
        }
    }

    pub fn push_str(&mut self, s: &str) {
        s.chars().for_each(|c| self.push(c));
    }

    pub fn backspace(&mut self) {
        self.digits.pop();
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn submit(&self) -> Result<Pin, PinError> {
        Pin::parse(&self.digits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unauthenticated,
    Authenticated,
}

/// Derives the state the gate starts in for the given settings.
pub fn initial_state(preferences: &Preferences) -> LockState {
    if !preferences.app_lock_enabled {
        return LockState::Authenticated;
    }
    match preferences.app_lock_pin.as_deref() {
        Some(pin) if !pin.is_empty() => LockState::Unauthenticated,
        _ => {
            log::warn!("App lock is enabled but no PIN is stored; skipping the PIN challenge");
            LockState::Authenticated
        }
    }
}

/// Gate in front of the account data. Starts from the current settings and
/// only a matching PIN moves it to `Authenticated`. It never re-locks by
/// itself; toggling the lock flag re-derives the state.
pub struct AppLockGate {
    preferences: Watch<Preferences>,
    last_enabled: bool,
    state: Cell<LockState>,
}

impl AppLockGate {
    pub fn new(settings: &SettingsStore) -> Self {
        AppLockGate::from_preferences(settings.preferences())
    }

    pub fn from_preferences(preferences: Watch<Preferences>) -> Self {
        let current = preferences.get();
        let state = initial_state(&current);
        log::debug!("App lock gate starts {:?}", state);
        AppLockGate {
            preferences,
            last_enabled: current.app_lock_enabled,
            state: Cell::new(state),
        }
    }

    pub fn state(&self) -> LockState {
        self.state.get()
    }

    pub fn is_locked(&self) -> bool {
        self.state() == LockState::Unauthenticated
    }

    pub fn subscribe(&self) -> Watch<LockState> {
        self.state.subscribe()
    }

    /// Compares `input` against the stored PIN. A mismatch leaves the state alone;
    /// there is no attempt counter.
    pub fn submit_pin(&self, input: &str) -> LockState {
        if !self.is_locked() {
            return LockState::Authenticated;
        }
        let stored = self.preferences.get().app_lock_pin;
        if stored.as_deref() == Some(input) {
            log::info!("PIN accepted, app unlocked");
            self.state.set(LockState::Authenticated);
        } else {
            log::warn!("PIN rejected");
        }
        self.state()
    }

    /// Waits for the next settings change and applies it. Only a change of the
    /// lock flag re-derives the state. `None` once the settings store is gone.
    pub async fn next_settings_change(&mut self) -> Option<LockState> {
        let preferences = self.preferences.changed().await?;
        if preferences.app_lock_enabled != self.last_enabled {
            self.last_enabled = preferences.app_lock_enabled;
            let state = initial_state(&preferences);
            log::debug!("Lock flag changed, gate is now {:?}", state);
            self.state.set(state);
        }
        Some(self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(enabled: bool, pin: Option<&str>) -> Preferences {
        Preferences {
            app_lock_enabled: enabled,
            app_lock_pin: pin.map(str::to_string),
        }
    }

    #[test]
    fn test_pin_requires_six_digits() {
        assert!(Pin::parse("123456").is_ok());
        assert_eq!(
            Pin::parse("12345"),
            Err(PinError::WrongLength { expected: 6, actual: 5 })
        );
        assert_eq!(
            Pin::parse("1234567"),
            Err(PinError::WrongLength { expected: 6, actual: 7 })
        );
        assert_eq!(Pin::parse("12a456"), Err(PinError::NonDigit));
        assert_eq!(Pin::parse(""), Err(PinError::WrongLength { expected: 6, actual: 0 }));
    }

    #[test]
    fn test_pin_debug_hides_digits() {
        let pin = Pin::parse("123456").unwrap();
        assert!(!format!("{:?}", pin).contains("123"));
    }

    #[test]
    fn test_pin_input_filters_and_caps() {
        let mut input = PinInput::new();
        input.push_str("1a2-3 4");
        assert_eq!(input.len(), 4);
        assert!(input.submit().is_err());
        input.push_str("56789");
        assert_eq!(input.len(), 6);
        assert_eq!(input.submit().unwrap().as_str(), "123456");
        input.backspace();
        assert!(input.submit().is_err());
        input.clear();
        assert!(input.is_empty());
    }

    #[test]
    fn test_disabled_lock_is_authenticated() {
        let settings = Cell::new(prefs(false, Some("123456")));
        let gate = AppLockGate::from_preferences(settings.subscribe());
        assert_eq!(gate.state(), LockState::Authenticated);
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_correct_pin_unlocks() {
        let settings = Cell::new(prefs(true, Some("123456")));
        let gate = AppLockGate::from_preferences(settings.subscribe());
        assert_eq!(gate.state(), LockState::Unauthenticated);
        assert_eq!(gate.submit_pin("000000"), LockState::Unauthenticated);
        assert_eq!(gate.submit_pin("000000"), LockState::Unauthenticated);
        assert_eq!(gate.submit_pin("123456"), LockState::Authenticated);
    }

    #[test]
    fn test_enabled_without_pin_bypasses() {
        let gate = AppLockGate::from_preferences(Cell::new(prefs(true, None)).subscribe());
        assert_eq!(gate.state(), LockState::Authenticated);
        let gate = AppLockGate::from_preferences(Cell::new(prefs(true, Some(""))).subscribe());
        assert_eq!(gate.state(), LockState::Authenticated);
    }

    #[tokio::test]
    async fn test_flag_change_rederives_state() {
        let settings = Cell::new(prefs(false, Some("123456")));
        let mut gate = AppLockGate::from_preferences(settings.subscribe());
        assert_eq!(gate.state(), LockState::Authenticated);

        settings.set(prefs(true, Some("123456")));
        assert_eq!(gate.next_settings_change().await, Some(LockState::Unauthenticated));

        gate.submit_pin("123456");
        settings.set(prefs(true, Some("999999")));
        assert_eq!(
            gate.next_settings_change().await,
            Some(LockState::Authenticated),
            "changing only the PIN must not re-lock"
        );

        settings.set(prefs(false, Some("999999")));
        assert_eq!(gate.next_settings_change().await, Some(LockState::Authenticated));

        drop(settings);
        assert_eq!(gate.next_settings_change().await, None);
    }

    #[tokio::test]
    async fn test_gate_follows_settings_store() {
        use crate::settings::MemoryPreferences;
        use std::sync::Arc;

        let store = SettingsStore::open(Arc::new(MemoryPreferences::new(prefs(true, Some("246810")))))
            .await
            .unwrap();
        let gate = AppLockGate::new(&store);
        let mut state = gate.subscribe();
        assert!(gate.is_locked());
        gate.submit_pin("246810");
        assert_eq!(state.changed().await, Some(LockState::Authenticated));
    }
}
