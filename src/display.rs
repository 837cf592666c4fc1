use crate::protocol::messages::RelayAction;

/// Power glyph shown by the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerGlyph {
    /// No state reported yet (startup, before the first poll resolves).
    Unknown,
    On,
    Off,
}

/// One rendered view of the panel. Pure data, no I/O; separate frames
/// projected from the same state compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub power: PowerGlyph,
    /// Overlay flag. Does not replace the power glyph: the panel keeps
    /// showing the last known on/off value while offline.
    pub offline: bool,
    /// Checked value for the bistable toggle control.
    pub toggle_checked: bool,
    /// Control currently flashing from a user press, if any.
    pub pressed: Option<RelayAction>,
}

/// Client-cached copy of the relay state plus the offline overlay and
/// the transient pressed marker.
///
/// The authoritative state lives on the relay service; this struct only
/// tracks what the panel should display right now.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    power: Option<bool>,
    offline: bool,
    pressed: Option<RelayAction>,
}

impl DisplayState {
    /// Overwrite the cached power value with a server-confirmed or
    /// optimistic one. Clears the offline overlay.
    pub fn apply_report(&mut self, on: bool) {
        self.power = Some(on);
        self.offline = false;
    }

    /// Add the offline overlay, keeping the last known power value.
    pub fn mark_offline(&mut self) {
        self.offline = true;
    }

    pub fn press(&mut self, action: RelayAction) {
        self.pressed = Some(action);
    }

    /// Clear the pressed marker if it still belongs to `action`. A
    /// newer press on the other control is left alone.
    pub fn release(&mut self, action: RelayAction) {
        if self.pressed == Some(action) {
            self.pressed = None;
        }
    }

    /// Project the state into a [`Frame`]. Idempotent, no side effects.
    pub fn frame(&self) -> Frame {
        Frame {
            power: match self.power {
                None => PowerGlyph::Unknown,
                Some(true) => PowerGlyph::On,
                Some(false) => PowerGlyph::Off,
            },
            offline: self.offline,
            toggle_checked: self.power.unwrap_or(false),
            pressed: self.pressed,
        }
    }
}
