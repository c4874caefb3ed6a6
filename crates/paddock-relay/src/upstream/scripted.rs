//! Scripted upstream for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{GeneratedImage, Upstream};
use crate::error::RelayError;
use crate::parser::DeltaStream;
use crate::target::ProviderTarget;
use crate::types::{CompletionRequest, DeltaFragment};

/// What the next upstream call does
pub(crate) enum Script {
    /// Return these fragments
    Rounds(Vec<DeltaFragment>),
    /// Fail with this HTTP status
    Fail(u16),
    /// Never answer
    Hang,
    /// Return an image
    Image(Vec<u8>),
}

#[derive(Default)]
pub(crate) struct ScriptedUpstream {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
    blocking_calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub(crate) fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn blocking_calls(&self) -> usize {
        self.blocking_calls.load(Ordering::SeqCst)
    }

    fn pop(&self) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected upstream call"))
    }

    async fn next(&self, request: &CompletionRequest) -> Result<Vec<DeltaFragment>, RelayError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.pop() {
            Script::Rounds(fragments) => Ok(fragments),
            Script::Fail(status) => Err(RelayError::from_status(status, "scripted failure")),
            Script::Hang => std::future::pending().await,
            Script::Image(_) => panic!("image scripted for a chat round"),
        }
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn open_stream(
        &self,
        _target: &ProviderTarget,
        request: &CompletionRequest,
    ) -> Result<DeltaStream, RelayError> {
        assert!(request.stream);
        self.next(request).await.map(DeltaStream::from_fragments)
    }

    async fn complete(
        &self,
        _target: &ProviderTarget,
        request: &CompletionRequest,
    ) -> Result<Vec<DeltaFragment>, RelayError> {
        assert!(!request.stream);
        self.blocking_calls.fetch_add(1, Ordering::SeqCst);
        self.next(request).await
    }

    async fn generate_image(&self, _target: &ProviderTarget, prompt: &str) -> Result<GeneratedImage, RelayError> {
        match self.pop() {
            Script::Image(bytes) => Ok(GeneratedImage {
                bytes,
                revised_prompt: Some(format!("{prompt}, refined")),
            }),
            Script::Fail(status) => Err(RelayError::from_status(status, "scripted failure")),
            Script::Hang => std::future::pending().await,
            Script::Rounds(_) => panic!("chat round scripted for an image"),
        }
    }
}
