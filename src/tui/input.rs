//! Keyboard input from the terminal

use crate::game::{InputEvent, InputSource};
use crate::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Reads pending crossterm key events without blocking
#[derive(Debug, Default)]
pub struct TerminalInput;

impl TerminalInput {
    /// Input source over the process terminal
    pub fn new() -> Self {
        TerminalInput
    }
}

/// Map a crossterm key event to a game event
pub fn map_key(key: KeyEvent) -> Option<InputEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (key.kind, key.code) {
        (KeyEventKind::Press, KeyCode::Char('c' | 'q')) if ctrl => Some(InputEvent::Quit),
        (KeyEventKind::Press, KeyCode::Esc) => Some(InputEvent::Escape),
        (KeyEventKind::Press, KeyCode::Char(c)) => Some(InputEvent::KeyDown(c.to_ascii_lowercase())),
        (KeyEventKind::Release, KeyCode::Char(c)) => Some(InputEvent::KeyUp(c.to_ascii_lowercase())),
        _ => None,
    }
}

impl InputSource for TerminalInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                events.extend(map_key(key));
            }
        }
        Ok(events)
    }
}
