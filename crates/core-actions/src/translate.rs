use core_events::{Command, KeyCode, UiEvent};

/// What a UI event asks the runtime to do. Most keys become ordinary
/// commands; fullscreen is a surface property and bypasses the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Command(Command),
    ToggleFullscreen,
}

/// Maps one UI event to its action. Unbound keys translate to nothing.
pub fn translate(event: UiEvent) -> Option<ControlAction> {
    let action = match event {
        UiEvent::CloseRequested => ControlAction::Command(Command::Quit),
        UiEvent::RedrawNeeded => ControlAction::Command(Command::Display),
        UiEvent::Key(key) => match key {
            KeyCode::Esc | KeyCode::Char('q') => ControlAction::Command(Command::Quit),
            KeyCode::Right | KeyCode::Char('n') => ControlAction::Command(Command::Next),
            KeyCode::Left | KeyCode::Char('p') => ControlAction::Command(Command::Previous),
            KeyCode::Char('r') => ControlAction::Command(Command::Reload),
            KeyCode::Char('f') => ControlAction::ToggleFullscreen,
            KeyCode::Char(_) => return None,
        },
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_bindings() {
        assert_eq!(
            translate(UiEvent::Key(KeyCode::Esc)),
            Some(ControlAction::Command(Command::Quit))
        );
        assert_eq!(
            translate(UiEvent::Key(KeyCode::Char('q'))),
            Some(ControlAction::Command(Command::Quit))
        );
        assert_eq!(
            translate(UiEvent::CloseRequested),
            Some(ControlAction::Command(Command::Quit))
        );
    }

    #[test]
    fn navigation_bindings_mirror_arrow_and_letter_keys() {
        for key in [KeyCode::Right, KeyCode::Char('n')] {
            assert_eq!(
                translate(UiEvent::Key(key)),
                Some(ControlAction::Command(Command::Next))
            );
        }
        for key in [KeyCode::Left, KeyCode::Char('p')] {
            assert_eq!(
                translate(UiEvent::Key(key)),
                Some(ControlAction::Command(Command::Previous))
            );
        }
    }

    #[test]
    fn reload_and_fullscreen_bindings() {
        assert_eq!(
            translate(UiEvent::Key(KeyCode::Char('r'))),
            Some(ControlAction::Command(Command::Reload))
        );
        assert_eq!(
            translate(UiEvent::Key(KeyCode::Char('f'))),
            Some(ControlAction::ToggleFullscreen)
        );
    }

    #[test]
    fn redraw_request_becomes_display() {
        assert_eq!(
            translate(UiEvent::RedrawNeeded),
            Some(ControlAction::Command(Command::Display))
        );
    }

    #[test]
    fn unbound_characters_translate_to_nothing() {
        assert_eq!(translate(UiEvent::Key(KeyCode::Char('x'))), None);
        assert_eq!(translate(UiEvent::Key(KeyCode::Char(' '))), None);
    }
}
