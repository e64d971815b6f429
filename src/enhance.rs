use crate::{
    client::{AutoEnhanceRequest, Backend, EnhanceReply, ManualEnhanceRequest},
    error::{EnhanceError, RequestError},
    loading::{Activity, BusyGuard},
    params::{ParameterCollector, ParamsUsed},
    sliders::{ControlId, SliderSync},
    state::AppState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnhanceMode {
    Automatic,
    Manual,
}

impl EnhanceMode {
    pub fn fallback_message(self) -> &'static str {
        match self {
            EnhanceMode::Automatic => "Automatic enhancement failed.",
            EnhanceMode::Manual => "Failed to apply manual changes.",
        }
    }

    pub fn network_failure_message(self) -> &'static str {
        match self {
            EnhanceMode::Automatic => {
                "A network or server error occurred during automatic enhancement."
            }
            EnhanceMode::Manual => {
                "A network or server error occurred while applying manual changes."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnhanceRequest {
    Automatic(AutoEnhanceRequest),
    Manual(ManualEnhanceRequest),
}

impl EnhanceRequest {
    pub fn mode(&self) -> EnhanceMode {
        match self {
            EnhanceRequest::Automatic(_) => EnhanceMode::Automatic,
            EnhanceRequest::Manual(_) => EnhanceMode::Manual,
        }
    }

    /// The file the request was issued against.
    pub fn filename(&self) -> &str {
        match self {
            EnhanceRequest::Automatic(r) => &r.filename,
            EnhanceRequest::Manual(r) => &r.filename,
        }
    }

    pub fn send(&self, backend: &dyn Backend) -> Result<EnhanceReply, RequestError> {
        match self {
            EnhanceRequest::Automatic(r) => backend.auto_enhance(r),
            EnhanceRequest::Manual(r) => backend.manual_enhance(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementResult {
    pub image_reference: String,
    /// Only automatic enhancement reports what it chose.
    pub params_used: Option<ParamsUsed>,
}

/// Issues enhancement requests for the active file and routes the replies.
pub struct EnhancementController;

impl EnhancementController {
    /// Checks the precondition and builds the request inside a fresh busy
    /// window. Nothing reaches the network when this fails.
    ///
    /// Manual requests always name the original upload, never a previous
    /// result, so the same slider values always produce the same request.
    pub fn begin(
        state: &mut AppState,
        mode: EnhanceMode,
    ) -> Result<(EnhanceRequest, BusyGuard), EnhanceError> {
        let Some(filename) = state.session.active_filename().map(str::to_string) else {
            let err = EnhanceError::NoActiveFile;
            if let Some(message) = err.user_message(mode) {
                state.page.show_error(message);
            }
            return Err(err);
        };
        let busy = state
            .loading
            .enter(Activity::Enhancing)
            .map_err(|_| EnhanceError::Busy)?;
        let request = match mode {
            EnhanceMode::Automatic => EnhanceRequest::Automatic(AutoEnhanceRequest { filename }),
            EnhanceMode::Manual => EnhanceRequest::Manual(ManualEnhanceRequest {
                filename,
                params: ParameterCollector::new(&state.sliders).collect(),
            }),
        };
        tracing::info!(
            mode = ?request.mode(),
            filename = request.filename(),
            "enhancement started"
        );
        Ok((request, busy))
    }

    /// Applies a reply for `target`. Replies for a file that is no longer
    /// active are dropped without touching the page.
    pub fn complete(
        state: &mut AppState,
        mode: EnhanceMode,
        target: &str,
        reply: Result<EnhanceReply, RequestError>,
    ) -> Result<EnhancementResult, EnhanceError> {
        if state.session.active_filename() != Some(target) {
            tracing::debug!(target, "discarding stale enhancement response");
            return Err(EnhanceError::StaleResponse);
        }
        let result = reply.map_err(EnhanceError::from).and_then(|reply| {
            match reply.image_reference().map(str::to_string) {
                Some(image_reference) => Ok(EnhancementResult {
                    image_reference,
                    params_used: match mode {
                        EnhanceMode::Automatic => reply.params_used,
                        EnhanceMode::Manual => None,
                    },
                }),
                None => Err(EnhanceError::Transport(
                    "response carried no image reference".to_string(),
                )),
            }
        });
        match result {
            Ok(result) => {
                let page = &mut state.page;
                state
                    .presenter
                    .present(&mut page.enhanced, &mut page.download, &result.image_reference);
                if let Some(used) = &result.params_used {
                    reflect_params_used(&mut state.sliders, used);
                }
                page.dismiss_notice();
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(?mode, %err, "enhancement failed");
                if let Some(message) = err.user_message(mode) {
                    state.page.show_error(message);
                }
                Err(err)
            }
        }
    }
}

/// Pushes server-chosen values into the controls so they show, and can then
/// be tweaked from, what was actually applied.
pub fn reflect_params_used(sliders: &mut SliderSync, used: &ParamsUsed) {
    for (control, value) in used.entries() {
        sliders.set(control, &format_reported(control, value));
    }
}

fn format_reported(control: ControlId, value: f64) -> String {
    match control {
        ControlId::RGain
        | ControlId::GGain
        | ControlId::BGain
        | ControlId::ClipLimit
        | ControlId::Saturation
        | ControlId::SharpenRadius => format!("{value:.2}"),
        ControlId::SharpenAmount => format!("{value:.0}"),
        ControlId::SigmaSpace | ControlId::SigmaColor | ControlId::TileGridSize => {
            value.to_string()
        }
    }
}
