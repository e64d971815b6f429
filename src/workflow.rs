//! Runs controller requests off the UI thread and routes their replies back.
//!
//! Each request gets a sequence id. Only the reply whose id matches the one
//! in flight is applied; anything else is a stale reply and is dropped.

use std::{
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

use crate::{
    client::{Backend, EnhanceReply, UploadFile, UploadReply},
    enhance::{EnhanceMode, EnhanceRequest, EnhancementController, EnhancementResult},
    error::{EnhanceError, RequestError, UploadError},
    loading::{BusyGuard, UiState},
    state::AppState,
    upload::{self, UploadController, UploadOutcome},
};

/// Runs a request job somewhere that is allowed to block.
pub type Spawner = Box<dyn Fn(Box<dyn FnOnce() + Send>)>;

enum Job {
    Upload(UploadFile),
    Enhance(EnhanceRequest),
}

impl Job {
    fn run(self, backend: &dyn Backend) -> Reply {
        match self {
            Job::Upload(file) => Reply::Upload(backend.upload(&file)),
            Job::Enhance(request) => Reply::Enhance(request.send(backend)),
        }
    }
}

enum Reply {
    Upload(Result<UploadReply, RequestError>),
    Enhance(Result<EnhanceReply, RequestError>),
}

struct Completion {
    id: u64,
    reply: Reply,
}

enum Pending {
    Upload,
    Enhance { mode: EnhanceMode, target: String },
}

struct InFlight {
    id: u64,
    pending: Pending,
    started: Instant,
    busy: BusyGuard,
}

/// What a finished request did to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Uploaded(UploadOutcome),
    UploadFailed(UploadError),
    Enhanced(EnhancementResult),
    EnhanceFailed(EnhanceError),
}

pub struct Workflow {
    state: AppState,
    backend: Arc<dyn Backend>,
    spawn: Spawner,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    in_flight: Option<InFlight>,
    next_id: u64,
    deadline: Duration,
}

impl Workflow {
    pub fn new(backend: Arc<dyn Backend>, deadline: Duration, spawn: Spawner) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: AppState::new(),
            backend,
            spawn,
            tx,
            rx,
            in_flight: None,
            next_id: 0,
            deadline,
        }
    }

    /// One OS thread per request; `notify` runs after each reply is queued.
    pub fn threaded(
        backend: Arc<dyn Backend>,
        deadline: Duration,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let notify = Arc::new(notify);
        let spawn: Spawner = Box::new(move |job| {
            let notify = Arc::clone(&notify);
            std::thread::spawn(move || {
                job();
                notify();
            });
        });
        Self::new(backend, deadline, spawn)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn ui_state(&self) -> UiState {
        self.state.loading.state()
    }

    /// Starts an upload. Once the file passes local checks, an enhancement
    /// still in flight is abandoned and its reply discarded when it arrives.
    pub fn start_upload(&mut self, file: UploadFile) -> Result<(), UploadError> {
        UploadController::validate(&mut self.state, &file)?;
        if matches!(
            self.in_flight.as_ref().map(|f| &f.pending),
            Some(Pending::Enhance { .. })
        ) {
            self.abandon_in_flight();
        }
        let busy = UploadController::begin(&mut self.state, &file)?;
        self.dispatch(Pending::Upload, busy, Job::Upload(file));
        Ok(())
    }

    pub fn start_automatic(&mut self) -> Result<(), EnhanceError> {
        self.start_enhancement(EnhanceMode::Automatic)
    }

    pub fn start_manual(&mut self) -> Result<(), EnhanceError> {
        self.start_enhancement(EnhanceMode::Manual)
    }

    fn start_enhancement(&mut self, mode: EnhanceMode) -> Result<(), EnhanceError> {
        let (request, busy) = EnhancementController::begin(&mut self.state, mode)?;
        let pending = Pending::Enhance {
            mode,
            target: request.filename().to_string(),
        };
        self.dispatch(pending, busy, Job::Enhance(request));
        Ok(())
    }

    /// Back to the initial page, forgetting the active file.
    pub fn reset(&mut self) {
        self.abandon_in_flight();
        upload::reset_to_initial(&mut self.state);
        self.state.page.dismiss_notice();
    }

    /// Applies finished replies and fails requests past their deadline.
    pub fn poll(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(Completion { id, reply }) = self.rx.try_recv() {
            let Some(in_flight) = self.in_flight.take_if(|f| f.id == id) else {
                tracing::debug!(id, "discarding stale reply");
                continue;
            };
            events.extend(self.finish(in_flight, reply));
        }

        let overdue = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.started.elapsed() >= self.deadline);
        if overdue {
            if let Some(in_flight) = self.in_flight.take() {
                tracing::warn!(id = in_flight.id, deadline = ?self.deadline, "request timed out");
                let err = RequestError::Transport(format!(
                    "no reply within {}s",
                    self.deadline.as_secs()
                ));
                let reply = match in_flight.pending {
                    Pending::Upload => Reply::Upload(Err(err)),
                    Pending::Enhance { .. } => Reply::Enhance(Err(err)),
                };
                events.extend(self.finish(in_flight, reply));
            }
        }
        events
    }

    fn dispatch(&mut self, pending: Pending, busy: BusyGuard, job: Job) {
        self.next_id += 1;
        let id = self.next_id;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        (self.spawn)(Box::new(move || {
            let reply = job.run(backend.as_ref());
            let _ = tx.send(Completion { id, reply });
        }));
        self.in_flight = Some(InFlight {
            id,
            pending,
            started: Instant::now(),
            busy,
        });
    }

    // The busy guard drops at the end, after the page reflects the reply.
    fn finish(&mut self, in_flight: InFlight, reply: Reply) -> Option<Event> {
        let InFlight {
            id, pending, busy, ..
        } = in_flight;
        let event = match (pending, reply) {
            (Pending::Upload, Reply::Upload(reply)) => {
                Some(match UploadController::complete(&mut self.state, reply) {
                    Ok(outcome) => Event::Uploaded(outcome),
                    Err(err) => Event::UploadFailed(err),
                })
            }
            (Pending::Enhance { mode, target }, Reply::Enhance(reply)) => {
                match EnhancementController::complete(&mut self.state, mode, &target, reply) {
                    Ok(result) => Some(Event::Enhanced(result)),
                    Err(EnhanceError::StaleResponse) => None,
                    Err(err) => Some(Event::EnhanceFailed(err)),
                }
            }
            _ => {
                tracing::error!(id, "reply kind does not match the request");
                None
            }
        };
        tracing::debug!(id, activity = ?busy.activity(), "request finished");
        drop(busy);
        event
    }

    fn abandon_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::info!(
                id = in_flight.id,
                activity = ?in_flight.busy.activity(),
                "abandoning in-flight request"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::NETWORK_FAILURE,
        page::ImageSource,
        params::ParamsUsed,
        sliders::ControlId,
        testing::{FakeBackend, deferred_spawner, inline_spawner},
    };

    const DEADLINE: Duration = Duration::from_secs(30);

    fn cat() -> UploadFile {
        UploadFile {
            name: "cat.png".into(),
            bytes: vec![1, 2, 3],
        }
    }

    fn workflow(backend: &Arc<FakeBackend>) -> Workflow {
        let backend: Arc<dyn Backend> = backend.clone();
        Workflow::new(backend, DEADLINE, inline_spawner())
    }

    fn uploaded(backend: &Arc<FakeBackend>) -> Workflow {
        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        let mut wf = workflow(backend);
        wf.start_upload(cat()).unwrap();
        assert!(matches!(wf.poll().as_slice(), [Event::Uploaded(_)]));
        wf
    }

    fn run_automatic(wf: &mut Workflow) -> Result<EnhancementResult, EnhanceError> {
        wf.start_automatic()?;
        single_enhance_event(wf)
    }

    fn run_manual(wf: &mut Workflow) -> Result<EnhancementResult, EnhanceError> {
        wf.start_manual()?;
        single_enhance_event(wf)
    }

    fn single_enhance_event(wf: &mut Workflow) -> Result<EnhancementResult, EnhanceError> {
        match wf.poll().pop() {
            Some(Event::Enhanced(result)) => Ok(result),
            Some(Event::EnhanceFailed(err)) => Err(err),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[test]
    fn enhancement_without_upload_never_hits_the_network() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = workflow(&backend);
        assert_eq!(wf.start_automatic(), Err(EnhanceError::NoActiveFile));
        assert_eq!(wf.start_manual(), Err(EnhanceError::NoActiveFile));
        assert!(wf.poll().is_empty());
        assert_eq!(backend.call_count(), 0);
        assert_eq!(wf.ui_state(), UiState::Idle);
    }

    #[test]
    fn scenario_upload_success_activates_file() {
        let backend = Arc::new(FakeBackend::default());
        let wf = uploaded(&backend);
        let state = wf.state();
        assert_eq!(state.session.active_filename(), Some("cat.png"));
        assert!(state.page.controls_enabled);
        assert!(!state.page.download.visible);
        assert_eq!(wf.ui_state(), UiState::Idle);
    }

    #[test]
    fn scenario_automatic_reflects_server_params() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = uploaded(&backend);
        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_enh.png".into()),
            params_used: Some(ParamsUsed {
                r_gain: Some(1.23),
                clip_limit: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        }));

        let result = run_automatic(&mut wf).unwrap();
        assert_eq!(result.image_reference, "cat_enh.png");

        let state = wf.state();
        assert!(state.page.enhanced.source().as_str().starts_with("cat_enh.png"));
        assert_eq!(state.sliders.value(ControlId::RGain), "1.23");
        assert_eq!(state.sliders.label(ControlId::RGain), Some("1.23"));
        assert_eq!(state.sliders.value(ControlId::ClipLimit), "2.00");
        assert_eq!(state.sliders.label(ControlId::ClipLimit), Some("2.00"));
        assert!(state.page.download.visible);
        assert_eq!(state.page.download.href.as_deref(), Some("cat_enh.png"));
        assert_eq!(backend.auto_requests(), vec!["cat.png".to_string()]);
    }

    #[test]
    fn scenario_manual_transport_error_keeps_previous_result() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = uploaded(&backend);
        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_enh.png".into()),
            ..Default::default()
        }));
        run_automatic(&mut wf).unwrap();
        let shown = wf.state().page.enhanced.source().clone();

        backend.push_enhance(Err(RequestError::Transport("connection reset".into())));
        let err = run_manual(&mut wf).unwrap_err();

        assert!(matches!(err, EnhanceError::Transport(_)));
        let state = wf.state();
        assert!(!state.loading.indicator_visible());
        assert_eq!(state.page.enhanced.source(), &shown);
        assert!(state.page.download.visible);
        let notice = state.page.notice.as_ref().expect("error is shown");
        assert_eq!(
            notice.text,
            EnhanceMode::Manual.network_failure_message().to_string()
        );
    }

    #[test]
    fn scenario_upload_server_error_resets_page() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = workflow(&backend);
        backend.push_upload(Err(RequestError::Server(Some("file too large".into()))));
        wf.start_upload(cat()).unwrap();

        let events = wf.poll();
        assert_eq!(
            events,
            vec![Event::UploadFailed(UploadError::Server(Some(
                "file too large".into()
            )))]
        );
        let state = wf.state();
        assert_eq!(state.session.active_filename(), None);
        assert!(state.page.original.source().is_placeholder());
        assert!(state.page.enhanced.source().is_placeholder());
        assert!(!state.page.controls_enabled);
        assert_eq!(
            state.page.notice.as_ref().map(|n| n.text.as_str()),
            Some("file too large")
        );
    }

    #[test]
    fn upload_transport_error_uses_generic_message() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = workflow(&backend);
        backend.push_upload(Err(RequestError::Transport("dns".into())));
        wf.start_upload(cat()).unwrap();
        wf.poll();
        assert_eq!(
            wf.state().page.notice.as_ref().map(|n| n.text.as_str()),
            Some(NETWORK_FAILURE)
        );
    }

    #[test]
    fn repeated_manual_runs_send_identical_payloads() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = uploaded(&backend);
        wf.state_mut().sliders.input(ControlId::Saturation, "140");
        wf.state_mut().sliders.input(ControlId::SharpenRadius, "2.2");
        for _ in 0..2 {
            backend.push_enhance(Ok(EnhanceReply {
                filename: Some("cat_manual.png".into()),
                ..Default::default()
            }));
            run_manual(&mut wf).unwrap();
        }
        let bodies = backend.manual_bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        assert!(bodies[0].contains("\"filename\":\"cat.png\""));
    }

    #[test]
    fn manual_after_automatic_still_targets_original() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = uploaded(&backend);
        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_auto.png".into()),
            ..Default::default()
        }));
        run_automatic(&mut wf).unwrap();
        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_manual.png".into()),
            ..Default::default()
        }));
        run_manual(&mut wf).unwrap();
        assert!(backend.manual_bodies()[0].contains("\"filename\":\"cat.png\""));
    }

    #[test]
    fn reupload_discards_outstanding_enhancement() {
        let backend = Arc::new(FakeBackend::default());
        let (spawn, queue) = deferred_spawner();
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let mut wf = Workflow::new(dyn_backend, DEADLINE, spawn);

        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        wf.start_upload(cat()).unwrap();
        queue.run_all();
        wf.poll();

        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_enh.png".into()),
            ..Default::default()
        }));
        wf.start_automatic().unwrap();
        assert_eq!(wf.ui_state(), UiState::Enhancing);

        backend.push_upload(Ok(FakeBackend::upload_reply("dog.png")));
        wf.start_upload(UploadFile {
            name: "dog.png".into(),
            bytes: vec![9],
        })
        .unwrap();
        assert_eq!(wf.ui_state(), UiState::Uploading);

        queue.run_all();
        let events = wf.poll();
        assert!(matches!(events.as_slice(), [Event::Uploaded(o)] if o.active_filename == "dog.png"));
        let state = wf.state();
        assert_eq!(state.session.active_filename(), Some("dog.png"));
        assert!(!state.page.enhanced.source().as_str().starts_with("cat_enh.png"));
        assert!(!state.page.download.visible);
        assert_eq!(wf.ui_state(), UiState::Idle);
    }

    #[test]
    fn rejected_reupload_keeps_outstanding_enhancement() {
        let backend = Arc::new(FakeBackend::default());
        let (spawn, queue) = deferred_spawner();
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let mut wf = Workflow::new(dyn_backend, DEADLINE, spawn);

        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        wf.start_upload(cat()).unwrap();
        queue.run_all();
        wf.poll();

        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_enh.png".into()),
            ..Default::default()
        }));
        wf.start_automatic().unwrap();

        let empty = UploadFile {
            name: "empty.png".into(),
            bytes: Vec::new(),
        };
        assert_eq!(wf.start_upload(empty), Err(UploadError::EmptyFile));
        assert_eq!(wf.ui_state(), UiState::Enhancing);
        assert_eq!(wf.state().session.active_filename(), Some("cat.png"));

        queue.run_all();
        let events = wf.poll();
        assert!(matches!(
            events.as_slice(),
            [Event::Enhanced(r)] if r.image_reference == "cat_enh.png"
        ));
        let state = wf.state();
        assert!(state.page.enhanced.source().as_str().starts_with("cat_enh.png"));
        assert!(state.page.download.visible);
        assert_eq!(wf.ui_state(), UiState::Idle);
    }

    #[test]
    fn double_trigger_while_busy_is_refused() {
        let backend = Arc::new(FakeBackend::default());
        let (spawn, queue) = deferred_spawner();
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let mut wf = Workflow::new(dyn_backend, DEADLINE, spawn);
        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        wf.start_upload(cat()).unwrap();
        queue.run_all();
        wf.poll();

        wf.start_manual().unwrap();
        assert_eq!(wf.start_manual(), Err(EnhanceError::Busy));
        assert_eq!(wf.start_automatic(), Err(EnhanceError::Busy));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unresolved_request_fails_after_deadline() {
        let backend = Arc::new(FakeBackend::default());
        let (spawn, queue) = deferred_spawner();
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let mut wf = Workflow::new(dyn_backend, Duration::ZERO, spawn);

        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        wf.start_upload(cat()).unwrap();
        let events = wf.poll();
        assert!(matches!(
            events.as_slice(),
            [Event::UploadFailed(UploadError::Transport(_))]
        ));
        assert_eq!(wf.ui_state(), UiState::Idle);
        assert_eq!(wf.state().session.active_filename(), None);

        // The late reply arrives after the timeout and is ignored.
        queue.run_all();
        assert!(wf.poll().is_empty());
        assert_eq!(wf.state().session.active_filename(), None);
    }

    #[test]
    fn unresolved_enhancement_fails_after_deadline() {
        let backend = Arc::new(FakeBackend::default());
        let (spawn, queue) = deferred_spawner();
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let mut wf = Workflow::new(dyn_backend, Duration::ZERO, spawn);

        // Replies drained in the same poll win over the deadline.
        backend.push_upload(Ok(FakeBackend::upload_reply("cat.png")));
        wf.start_upload(cat()).unwrap();
        queue.run_all();
        wf.poll();
        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_auto.png".into()),
            ..Default::default()
        }));
        wf.start_automatic().unwrap();
        queue.run_all();
        assert!(matches!(wf.poll().as_slice(), [Event::Enhanced(_)]));
        let shown = wf.state().page.enhanced.source().clone();

        backend.push_enhance(Ok(EnhanceReply {
            filename: Some("cat_manual.png".into()),
            ..Default::default()
        }));
        wf.start_manual().unwrap();
        let events = wf.poll();
        assert!(matches!(
            events.as_slice(),
            [Event::EnhanceFailed(EnhanceError::Transport(_))]
        ));
        assert_eq!(wf.ui_state(), UiState::Idle);
        let state = wf.state();
        assert_eq!(state.page.enhanced.source(), &shown);
        assert_eq!(
            state.page.notice.as_ref().map(|n| n.text.as_str()),
            Some(EnhanceMode::Manual.network_failure_message())
        );

        queue.run_all();
        assert!(wf.poll().is_empty());
        assert_eq!(wf.state().page.enhanced.source(), &shown);
    }

    #[test]
    fn reset_forgets_active_file() {
        let backend = Arc::new(FakeBackend::default());
        let mut wf = uploaded(&backend);
        wf.reset();
        assert_eq!(wf.state().session.active_filename(), None);
        assert!(matches!(
            wf.state().page.original.source(),
            ImageSource::Placeholder(_)
        ));
        assert_eq!(wf.start_automatic(), Err(EnhanceError::NoActiveFile));
    }
}
