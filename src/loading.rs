use std::{cell::Cell, rc::Rc};

/// What the page is doing right now. Exactly one holds at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Uploading,
    Enhancing,
}

/// Operations that occupy the busy window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    Uploading,
    Enhancing,
}

impl From<Activity> for UiState {
    fn from(activity: Activity) -> Self {
        match activity {
            Activity::Uploading => UiState::Uploading,
            Activity::Enhancing => UiState::Enhancing,
        }
    }
}

/// Busy/idle state shared by the controllers and the rendering code.
///
/// Entering hands out a [`BusyGuard`]; dropping it is the only way back to
/// idle, so every exit path of a request releases the busy state exactly once.
#[derive(Clone, Default)]
pub struct LoadingState {
    phase: Rc<Cell<UiState>>,
}

impl LoadingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UiState {
        self.phase.get()
    }

    pub fn is_busy(&self) -> bool {
        self.state() != UiState::Idle
    }

    /// Refuses with the current state if something is already in progress.
    pub fn enter(&self, activity: Activity) -> Result<BusyGuard, UiState> {
        let current = self.phase.get();
        if current != UiState::Idle {
            return Err(current);
        }
        self.phase.set(activity.into());
        tracing::debug!(?activity, "busy");
        Ok(BusyGuard {
            phase: Rc::clone(&self.phase),
            activity,
        })
    }

    pub fn indicator_visible(&self) -> bool {
        self.is_busy()
    }

    /// The current result is dimmed while it is being replaced.
    pub fn result_dimmed(&self) -> bool {
        self.state() == UiState::Enhancing
    }
}

#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the busy window"]
pub struct BusyGuard {
    phase: Rc<Cell<UiState>>,
    activity: Activity,
}

impl BusyGuard {
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.phase.set(UiState::Idle);
        tracing::debug!(activity = ?self.activity, "idle");
    }
}
