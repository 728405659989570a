use std::sync::atomic::{AtomicBool, Ordering};

/// Engine session state.
///
/// ```text
/// Idle ──start──▶ Active ──stop / end of stream──▶ Idle
/// ```
///
/// `Idle` is the only state in which a session may be started, a file
/// loaded, or the engine torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Active,
}

impl EngineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Lock-free `EngineState` cell shared between the control thread and the
/// hardware callback thread.
///
/// Reads never block. A callback that observed `Active` just before a flip
/// to `Idle` may still finish its current append/submit.
#[derive(Debug)]
pub struct AtomicEngineState(AtomicBool);

impl AtomicEngineState {
    pub fn new(state: EngineState) -> Self {
        Self(AtomicBool::new(state.is_active()))
    }

    pub fn load(&self) -> EngineState {
        if self.0.load(Ordering::SeqCst) {
            EngineState::Active
        } else {
            EngineState::Idle
        }
    }

    pub fn store(&self, state: EngineState) {
        self.0.store(state.is_active(), Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for AtomicEngineState {
    fn default() -> Self {
        Self::new(EngineState::Idle)
    }
}
