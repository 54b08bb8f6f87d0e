//! Shared ownership for state touched by more than one task (device state,
//! gateway flags, stats). Guards are never held across an `.await`.

use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Clone the current value out, releasing the lock immediately.
pub fn snapshot<T: Clone>(state: &Shared<T>) -> T {
    state.lock().clone()
}
