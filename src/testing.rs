//! Test doubles shared by the workflow tests.

use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::Mutex,
};

use crate::{
    client::{
        AutoEnhanceRequest, Backend, EnhanceReply, ManualEnhanceRequest, UploadFile, UploadReply,
    },
    error::RequestError,
    workflow::Spawner,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(String),
    Auto(String),
    /// Serialized request body.
    Manual(String),
    Fetch(String),
}

/// Scripted backend. Replies are consumed in order; an empty script answers
/// with a transport error.
#[derive(Default)]
pub struct FakeBackend {
    uploads: Mutex<VecDeque<Result<UploadReply, RequestError>>>,
    enhances: Mutex<VecDeque<Result<EnhanceReply, RequestError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn upload_reply(filename: &str) -> UploadReply {
        UploadReply {
            uploaded_filename: filename.to_string(),
            original_image_url: format!("/static/uploads/{filename}"),
            processed_image_url: format!("/static/uploads/{filename}"),
        }
    }

    pub fn push_upload(&self, reply: Result<UploadReply, RequestError>) {
        self.uploads.lock().unwrap().push_back(reply);
    }

    pub fn push_enhance(&self, reply: Result<EnhanceReply, RequestError>) {
        self.enhances.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn auto_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Auto(filename) => Some(filename),
                _ => None,
            })
            .collect()
    }

    pub fn manual_bodies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Manual(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn unscripted<T>() -> Result<T, RequestError> {
        Err(RequestError::Transport("no scripted reply".into()))
    }
}

impl Backend for FakeBackend {
    fn upload(&self, file: &UploadFile) -> Result<UploadReply, RequestError> {
        self.record(Call::Upload(file.name.clone()));
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Self::unscripted)
    }

    fn auto_enhance(&self, request: &AutoEnhanceRequest) -> Result<EnhanceReply, RequestError> {
        self.record(Call::Auto(request.filename.clone()));
        self.enhances
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Self::unscripted)
    }

    fn manual_enhance(
        &self,
        request: &ManualEnhanceRequest,
    ) -> Result<EnhanceReply, RequestError> {
        let body = serde_json::to_string(request).expect("request serializes");
        self.record(Call::Manual(body));
        self.enhances
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Self::unscripted)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, RequestError> {
        self.record(Call::Fetch(url.to_string()));
        Self::unscripted()
    }
}

/// Runs each job immediately on the calling thread.
pub fn inline_spawner() -> Spawner {
    Box::new(|job| job())
}

type QueuedJob = Box<dyn FnOnce() + Send>;

/// Jobs held back until the test decides they finish.
#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Rc<RefCell<Vec<QueuedJob>>>,
}

impl JobQueue {
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Runs queued jobs in submission order.
    pub fn run_all(&self) {
        let jobs: Vec<QueuedJob> = self.jobs.borrow_mut().drain(..).collect();
        for job in jobs {
            job();
        }
    }
}

pub fn deferred_spawner() -> (Spawner, JobQueue) {
    let queue = JobQueue::default();
    let jobs = Rc::clone(&queue.jobs);
    let spawn: Spawner = Box::new(move |job| jobs.borrow_mut().push(job));
    (spawn, queue)
}
