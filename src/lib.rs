mod controller;
mod display;
mod protocol;
mod settings;

pub use controller::{DEFAULT_POLL_INTERVAL, DEFAULT_PRESS_FLASH, SwitchController};
pub use display::{DisplayState, Frame, PowerGlyph};
pub use protocol::client::*;
pub use protocol::messages::*;
pub use settings::Settings;
