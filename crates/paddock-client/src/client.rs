use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream};
use paddock_core::{ChatTurnRequest, ImageTurnRequest, MediaResult, OutboundEvent, SESSION_ID_HEADER, WireLine};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::consumer::{LineAssembler, StreamConsumer};
use crate::error::{ClientError, Result};
use crate::message::ReconstructedMessage;
use crate::metrics::PerformanceMetrics;

/// How long a turn may run before the client gives up
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configured endpoint as listed by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Endpoint id to send turns to
    pub id: String,
    /// Label for the comparison pane
    pub display_name: String,
    /// Upstream model
    pub model: String,
    /// Upstream wire dialect
    pub dialect: String,
    /// "chat" or "image"
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    endpoints: Vec<EndpointInfo>,
}

/// State of a streaming turn after one body chunk
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSnapshot {
    /// Session the relay recorded the turn under
    pub session_id: Option<String>,
    /// Message reconstructed so far
    pub message: ReconstructedMessage,
    /// Metrics so far
    pub metrics: PerformanceMetrics,
}

/// Final state of one pane
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    /// Endpoint the turn ran against
    pub endpoint_id: String,
    /// Session the relay recorded the turn under
    pub session_id: Option<String>,
    /// Frozen message
    pub message: ReconstructedMessage,
    /// Final metrics
    pub metrics: PerformanceMetrics,
}

impl CompletedTurn {
    /// Pane for a turn that failed before streaming
    fn failed(endpoint_id: &str, error: &ClientError) -> Self {
        let mut message = ReconstructedMessage::default();
        message.fail(error.to_string());
        Self {
            endpoint_id: endpoint_id.to_owned(),
            session_id: None,
            message,
            metrics: PerformanceMetrics::default(),
        }
    }
}

/// How an image turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The image was stored
    Complete(MediaResult),
    /// The relay reported an error
    Failed(String),
}

/// Result of an image turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTurn {
    /// Session the relay recorded the turn under
    pub session_id: Option<String>,
    /// Progress notes in arrival order
    pub progress: Vec<String>,
    /// Terminal outcome
    pub outcome: ImageOutcome,
}

/// Typed client for the Paddock relay
#[derive(Debug, Clone)]
pub struct PaddockClient {
    base_url: Url,
    http: reqwest::Client,
    timeout: Duration,
}

type SnapshotStream = Pin<Box<dyn Stream<Item = Result<TurnSnapshot>> + Send>>;

impl PaddockClient {
    /// Create a new client pointing at the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::Config(format!("invalid base URL: {e}")))?;

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-turn timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List configured endpoints
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails
    pub async fn list_endpoints(&self) -> Result<Vec<EndpointInfo>> {
        let response = self.http.get(make_url(&self.base_url, "/api/endpoints")).send().await?;
        let list: EndpointList = handle_error(response).await?.json().await?;
        Ok(list.endpoints)
    }

    /// Stream a chat turn as a sequence of snapshots
    ///
    /// A snapshot is yielded whenever a body chunk changes the message; the
    /// last one is always frozen. No timeout is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects the turn before streaming; a
    /// transport failure mid-body ends the stream with a failed snapshot
    pub async fn chat_stream(&self, request: &ChatTurnRequest) -> Result<SnapshotStream> {
        let started = Instant::now();
        let response = self.send_chat(request).await?;
        let session_id = session_id(&response);
        let consumer = StreamConsumer::new(started);

        let snapshots = stream::unfold(Some((response, consumer)), move |state| {
            let session_id = session_id.clone();
            async move {
                let (mut response, mut consumer) = state?;
                loop {
                    let chunk = match response.chunk().await {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            connection_lost(&mut consumer, e);
                            return Some((Ok(snapshot(session_id, &consumer)), None));
                        }
                    };

                    let Some(chunk) = chunk else {
                        consumer.finish(Instant::now());
                        return Some((Ok(snapshot(session_id, &consumer)), None));
                    };

                    if consumer.feed(&chunk, Instant::now()) {
                        let item = snapshot(session_id, &consumer);
                        let next = (!consumer.is_finished()).then_some((response, consumer));
                        return Some((Ok(item), next));
                    }
                }
            }
        });

        Ok(Box::pin(snapshots))
    }

    /// Run a chat turn to completion
    ///
    /// When the timeout elapses the connection is dropped and the message
    /// is marked failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects the turn or the request cannot
    /// be sent; a transport failure mid-body fails the message instead
    pub async fn chat(&self, request: &ChatTurnRequest) -> Result<CompletedTurn> {
        let started = Instant::now();
        let mut consumer = StreamConsumer::new(started);
        let mut session = None;

        let driven = tokio::time::timeout(self.timeout, self.drive(request, &mut consumer, &mut session)).await;
        match driven {
            Ok(result) => result?,
            Err(_) => consumer.abort(
                format!("⏱️ Request Timed Out after {}s", self.timeout.as_secs()),
                Instant::now(),
            ),
        }

        Ok(CompletedTurn {
            endpoint_id: request.endpoint_id.clone(),
            session_id: session,
            message: consumer.message().clone(),
            metrics: consumer.metrics(),
        })
    }

    /// Run the same turn against several endpoints concurrently
    ///
    /// Returns one pane per request, in request order. Turns that fail
    /// before streaming come back as failed panes.
    pub async fn compare(&self, requests: &[ChatTurnRequest]) -> Vec<CompletedTurn> {
        let turns = requests.iter().map(|request| async move {
            match self.chat(request).await {
                Ok(turn) => turn,
                Err(e) => CompletedTurn::failed(&request.endpoint_id, &e),
            }
        });

        futures::future::join_all(turns).await
    }

    /// Generate an image
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects the turn, the transport fails,
    /// the timeout elapses, or the body ends without a result
    pub async fn generate_image(&self, request: &ImageTurnRequest) -> Result<ImageTurn> {
        tokio::time::timeout(self.timeout, self.read_image(request))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    async fn send_chat(&self, request: &ChatTurnRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(make_url(&self.base_url, "/api/chat"))
            .json(request)
            .send()
            .await?;

        handle_error(response).await
    }

    async fn drive(
        &self,
        request: &ChatTurnRequest,
        consumer: &mut StreamConsumer,
        session: &mut Option<String>,
    ) -> Result<()> {
        let mut response = self.send_chat(request).await?;
        *session = session_id(&response);

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    consumer.feed(&chunk, Instant::now());
                    if consumer.is_finished() {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    consumer.finish(Instant::now());
                    return Ok(());
                }
                Err(e) => {
                    connection_lost(consumer, e);
                    return Ok(());
                }
            }
        }
    }

    async fn read_image(&self, request: &ImageTurnRequest) -> Result<ImageTurn> {
        let response = self
            .http
            .post(make_url(&self.base_url, "/api/images/generate"))
            .json(request)
            .send()
            .await?;
        let mut response = handle_error(response).await?;
        let session = session_id(&response);

        let mut lines = LineAssembler::default();
        let mut progress = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            for line in lines.feed(&chunk) {
                if let Some(outcome) = image_outcome(line, &mut progress) {
                    return Ok(ImageTurn {
                        session_id: session,
                        progress,
                        outcome,
                    });
                }
            }
        }

        if let Some(line) = lines.finish()
            && let Some(outcome) = image_outcome(line, &mut progress)
        {
            return Ok(ImageTurn {
                session_id: session,
                progress,
                outcome,
            });
        }

        Err(ClientError::Parse("image stream ended without a result".to_owned()))
    }
}

// -- Helper functions --

/// Build a URL from a base and path
fn make_url(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(path);
    url
}

fn session_id(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Terminal outcome carried by a media line; progress notes are collected
fn image_outcome(line: WireLine, progress: &mut Vec<String>) -> Option<ImageOutcome> {
    match line {
        WireLine::Progress(note) => {
            progress.push(note);
            None
        }
        WireLine::Complete(result) => Some(ImageOutcome::Complete(result)),
        WireLine::Event(OutboundEvent::Error { message }) => Some(ImageOutcome::Failed(message)),
        WireLine::Event(_) => None,
    }
}

/// Fail a turn whose body broke off mid-stream, keeping its timings
fn connection_lost(consumer: &mut StreamConsumer, error: reqwest::Error) {
    consumer.abort(ClientError::Http(error).to_string(), Instant::now());
}

fn snapshot(session_id: Option<String>, consumer: &StreamConsumer) -> TurnSnapshot {
    TurnSnapshot {
        session_id,
        message: consumer.message().clone(),
        metrics: consumer.metrics(),
    }
}

/// Check an HTTP response for errors
async fn handle_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (error_type, message) = parse_error_body(&body);

    Err(ClientError::Api {
        status: status.as_u16(),
        error_type,
        message,
    })
}

/// Parse an error response body into (type, message)
fn parse_error_body(body: &str) -> (String, String) {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let error_type = error["type"].as_str().unwrap_or("unknown").to_owned();
        let message = error["message"].as_str().unwrap_or(body).to_owned();
        (error_type, message)
    } else {
        ("unknown".to_owned(), body.to_owned())
    }
}
