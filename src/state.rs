use crate::{loading::LoadingState, page::Page, presenter::ResultPresenter, sliders::SliderSync};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// The file the user is working on, as named by the server.
pub struct Session {
    active_filename: Option<String>,
}

impl Session {
    pub fn active_filename(&self) -> Option<&str> {
        self.active_filename.as_deref()
    }

    /// Only the upload controller establishes or clears the active file.
    pub(crate) fn activate(&mut self, filename: String) {
        tracing::info!(%filename, "active file");
        self.active_filename = Some(filename);
    }

    pub(crate) fn clear(&mut self) {
        self.active_filename = None;
    }
}

/// Everything the workflow reads and writes, created once per window.
pub struct AppState {
    pub session: Session,
    pub page: Page,
    pub sliders: SliderSync,
    pub loading: LoadingState,
    pub presenter: ResultPresenter,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            session: Session::default(),
            page: Page::new(),
            sliders: SliderSync::with_default_bindings(),
            loading: LoadingState::new(),
            presenter: ResultPresenter::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
