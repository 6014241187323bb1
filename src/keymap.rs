use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::{Position, Rect};

use crate::display::Controls;

/// What an input asks the app to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    RecordBounce,
    Quit,
}

/// On-screen buttons, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Start,
    Stop,
    RecordBounce,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::Start, Button::Stop, Button::RecordBounce];

    pub fn label(&self) -> &'static str {
        match self {
            Button::Start => "Start Timer",
            Button::Stop => "Stop Timer",
            Button::RecordBounce => "Record Bounce",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Button::Start => "enter",
            Button::Stop => "esc",
            Button::RecordBounce => "space",
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Button::Start => Command::Start,
            Button::Stop => Command::Stop,
            Button::RecordBounce => Command::RecordBounce,
        }
    }

    pub fn is_enabled(&self, controls: &Controls) -> bool {
        match self {
            Button::Start => controls.start,
            Button::Stop => controls.stop,
            Button::RecordBounce => controls.bounce,
        }
    }
}

/// Keyboard shortcuts work regardless of which buttons are enabled
pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Enter => Some(Command::Start),
        KeyCode::Char(' ') => Some(Command::RecordBounce),
        KeyCode::Esc => Some(Command::Stop),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('q') => Some(Command::Quit),
        _ => None,
    }
}

/// Left clicks on an enabled button. `buttons` pairs each button with its screen area.
pub fn command_for_click(
    mouse: &MouseEvent,
    buttons: &[(Button, Rect)],
    controls: &Controls,
) -> Option<Command> {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return None;
    }

    let at = Position::new(mouse.column, mouse.row);
    buttons
        .iter()
        .find(|(_, area)| area.contains(at))
        .filter(|(button, _)| button.is_enabled(controls))
        .map(|(button, _)| button.command())
}
