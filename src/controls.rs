/// A key pressed in any display window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPress {
    Char(char),
    Escape,
    Other,
}

/// Interactive commands understood by the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleLandmarks,
    ToggleMidpoint,
    Pause,
}

impl Command {
    pub fn from_key(key: KeyPress) -> Option<Self> {
        match key {
            KeyPress::Escape | KeyPress::Char('q') => Some(Command::Quit),
            KeyPress::Char('l') => Some(Command::ToggleLandmarks),
            KeyPress::Char('m') => Some(Command::ToggleMidpoint),
            KeyPress::Char('p') => Some(Command::Pause),
            _ => None,
        }
    }
}
