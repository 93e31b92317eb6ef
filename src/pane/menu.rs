#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneAction {
    ClearLog,
    ToggleErrors,
    ToggleLogs,
    ToggleFullScreen,
    Respawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub key: char,
    pub action: PaneAction,
}

pub const MENU_ITEMS: &[MenuItem] = &[
    MenuItem {
        label: "Clear content",
        key: 'q',
        action: PaneAction::ClearLog,
    },
    MenuItem {
        label: "Toggle errors",
        key: 'e',
        action: PaneAction::ToggleErrors,
    },
    MenuItem {
        label: "Toggle log",
        key: 'r',
        action: PaneAction::ToggleLogs,
    },
    MenuItem {
        label: "Toggle fullscreen",
        key: 'f',
        action: PaneAction::ToggleFullScreen,
    },
    MenuItem {
        label: "Respawn",
        key: 's',
        action: PaneAction::Respawn,
    },
];

pub fn item_for_key(key: char) -> Option<&'static MenuItem> {
    MENU_ITEMS.iter().find(|item| item.key == key)
}

/// Moves a selection by `delta`, wrapping at both ends.
pub fn step_selection(current: usize, delta: isize) -> usize {
    let len = MENU_ITEMS.len() as isize;
    let next = (current as isize + delta).rem_euclid(len);
    next as usize
}
