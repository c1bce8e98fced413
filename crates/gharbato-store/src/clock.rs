//! Server clock and push-id allocation.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

type WallClock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Non-decreasing millisecond clock owned by a store.
///
/// Two writes may share a tick. Push ids never repeat: within one tick a
/// sequence number orders them, so `push_id` order equals allocation order
/// for a given store.
pub struct ServerClock {
    wall: WallClock,
    state: Mutex<ClockState>,
}

#[derive(Default)]
struct ClockState {
    last_millis: i64,
    seq: u32,
}

impl ServerClock {
    /// Clock backed by the system time.
    pub fn new() -> Self {
        Self::with_wall_clock(system_millis)
    }

    /// Clock backed by a custom time source (milliseconds since the epoch).
    pub fn with_wall_clock(wall: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            wall: Box::new(wall),
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Current server time. Never goes backwards, even if the wall clock does.
    pub fn now_millis(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = (self.wall)().max(state.last_millis);
        if now > state.last_millis {
            state.last_millis = now;
            state.seq = 0;
        }
        now
    }

    /// Never report a time earlier than `millis`, e.g. the newest write
    /// already persisted by a previous run.
    pub fn advance_to(&self, millis: i64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if millis > state.last_millis {
            state.last_millis = millis;
            state.seq = 0;
        }
    }

    /// Allocate a push id together with the tick it was allocated in.
    pub fn next_push_id(&self) -> (String, i64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = (self.wall)().max(state.last_millis);
        if now > state.last_millis {
            state.last_millis = now;
            state.seq = 0;
        } else {
            state.seq = state.seq.wrapping_add(1);
        }
        let id = format!("{:012x}{:08x}", now.max(0) as u64, state.seq);
        (id, now)
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

fn system_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
