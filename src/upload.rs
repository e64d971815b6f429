use crate::{
    client::{UploadFile, UploadReply},
    error::{RequestError, UploadError},
    loading::{Activity, BusyGuard},
    page::FILE_LABEL_PROMPT,
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub active_filename: String,
    pub original_image_ref: String,
    pub preview_image_ref: String,
}

/// Submits a file and establishes it as the active file.
pub struct UploadController;

impl UploadController {
    /// Local checks that need no busy window. A rejected file leaves the
    /// page and any request in flight alone.
    pub fn validate(state: &mut AppState, file: &UploadFile) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            state.page.show_error(UploadError::EmptyFile.user_message());
            return Err(UploadError::EmptyFile);
        }
        Ok(())
    }

    /// Validates the file, enters the busy window and resets the page so no
    /// control from a previous upload survives.
    pub fn begin(state: &mut AppState, file: &UploadFile) -> Result<BusyGuard, UploadError> {
        Self::validate(state, file)?;
        let busy = state
            .loading
            .enter(Activity::Uploading)
            .map_err(|_| UploadError::Busy)?;
        reset_to_initial(state);
        state.page.file_label = file.name.clone();
        tracing::info!(name = %file.name, size = file.bytes.len(), "upload started");
        Ok(busy)
    }

    pub fn complete(
        state: &mut AppState,
        reply: Result<UploadReply, RequestError>,
    ) -> Result<UploadOutcome, UploadError> {
        match reply {
            Ok(reply) => {
                state.session.activate(reply.uploaded_filename.clone());
                state.page.original.show(reply.original_image_url.clone());
                state.page.enhanced.show(reply.processed_image_url.clone());
                crate::presenter::update_download(&mut state.page.download, None);
                state.page.controls_enabled = true;
                state.page.dismiss_notice();
                Ok(UploadOutcome {
                    active_filename: reply.uploaded_filename,
                    original_image_ref: reply.original_image_url,
                    preview_image_ref: reply.processed_image_url,
                })
            }
            Err(err) => {
                let err = UploadError::from(err);
                tracing::warn!(%err, "upload failed");
                reset_to_initial(state);
                state.page.show_error(err.user_message());
                Err(err)
            }
        }
    }
}

/// Initial page: no active file, controls disabled, placeholders, no download.
pub fn reset_to_initial(state: &mut AppState) {
    state.session.clear();
    state.page.controls_enabled = false;
    state.page.original.reset();
    let page = &mut state.page;
    state.presenter.reset(&mut page.enhanced, &mut page.download);
    page.file_label = FILE_LABEL_PROMPT.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> UploadFile {
        UploadFile {
            name: "cat.png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    fn cat_reply() -> UploadReply {
        UploadReply {
            uploaded_filename: "cat.png".into(),
            original_image_url: "/static/uploads/cat.png".into(),
            processed_image_url: "/static/uploads/cat.png".into(),
        }
    }

    #[test]
    fn begin_resets_stale_controls() {
        let mut state = AppState::new();
        state.session.activate("old.png".into());
        state.page.controls_enabled = true;
        state.page.download.visible = true;
        state.page.enhanced.show("old_enh.png?t=1");

        let _busy = UploadController::begin(&mut state, &file()).unwrap();
        assert_eq!(state.session.active_filename(), None);
        assert!(!state.page.controls_enabled);
        assert!(!state.page.download.visible);
        assert!(state.page.enhanced.source().is_placeholder());
        assert_eq!(state.page.file_label, "cat.png");
    }

    #[test]
    fn empty_file_is_rejected_before_busy() {
        let mut state = AppState::new();
        let empty = UploadFile {
            name: "empty.png".into(),
            bytes: Vec::new(),
        };
        assert!(matches!(
            UploadController::begin(&mut state, &empty),
            Err(UploadError::EmptyFile)
        ));
        assert!(!state.loading.is_busy());
        assert!(state.page.notice.is_some());
    }

    #[test]
    fn success_activates_file_and_enables_controls() {
        let mut state = AppState::new();
        let busy = UploadController::begin(&mut state, &file()).unwrap();
        let outcome = UploadController::complete(&mut state, Ok(cat_reply())).unwrap();
        drop(busy);

        assert_eq!(outcome.active_filename, "cat.png");
        assert_eq!(state.session.active_filename(), Some("cat.png"));
        assert!(state.page.controls_enabled);
        assert!(!state.page.download.visible);
        assert_eq!(
            state.page.original.source().as_str(),
            "/static/uploads/cat.png"
        );
        assert!(!state.loading.is_busy());
    }

    #[test]
    fn transport_failure_shows_generic_message_and_resets() {
        let mut state = AppState::new();
        let _busy = UploadController::begin(&mut state, &file()).unwrap();
        let err = UploadController::complete(
            &mut state,
            Err(RequestError::Transport("connection refused".into())),
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
        let notice = state.page.notice.as_ref().unwrap();
        assert_eq!(notice.text, crate::error::NETWORK_FAILURE);
        assert_eq!(state.page.file_label, FILE_LABEL_PROMPT);
        assert!(!state.page.controls_enabled);
    }
}
