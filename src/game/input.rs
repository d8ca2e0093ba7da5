//! Input seam

use crate::Result;
use std::collections::VecDeque;

/// Input events the loop understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A key went down
    KeyDown(char),
    /// A key was released
    KeyUp(char),
    /// Pause toggle
    Escape,
    /// Leave the session
    Quit,
}

/// Source of input events, drained once per frame.
/// Implementations: the terminal frontend, [`ScriptedInput`] (testing).
pub trait InputSource {
    /// Events that arrived since the previous call
    fn poll_events(&mut self) -> Result<Vec<InputEvent>>;
}

/// Replays events at fixed frame numbers
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frame: u64,
    script: VecDeque<(u64, InputEvent)>,
}

impl ScriptedInput {
    /// Script of `(frame, event)` pairs; frames count polls from zero
    pub fn new(mut script: Vec<(u64, InputEvent)>) -> Self {
        script.sort_by_key(|(frame, _)| *frame);
        ScriptedInput {
            frame: 0,
            script: script.into(),
        }
    }

    /// True once every scripted event was delivered
    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl InputSource for ScriptedInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>> {
        let mut events = Vec::new();
        while let Some(&(frame, event)) = self.script.front() {
            if frame > self.frame {
                break;
            }
            events.push(event);
            self.script.pop_front();
        }
        self.frame += 1;
        Ok(events)
    }
}
