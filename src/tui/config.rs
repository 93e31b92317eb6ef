use std::time::Duration;

pub(super) const MAX_EVENTS_PER_TICK: usize = 200;

pub(super) const INPUT_POLL_WAIT: Duration = Duration::from_millis(50);
pub(super) const SHUTDOWN_GRACE_TIMEOUT: Duration = Duration::from_secs(3);

pub(super) const MENU_WIDTH: u16 = 28;
