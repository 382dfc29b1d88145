use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    api::{failure, ApiError},
    session::SessionStore,
};

use super::event::{HubEvent, HubKind, PushMessage};

/// One hub invocation: the event name and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    pub event: String,
    pub args: Vec<Value>,
}

pub type FrameStream = BoxStream<'static, Result<PushFrame, ApiError>>;

/// Something that can open a stream of hub invocations.
#[async_trait]
pub trait PushTransport: Send + 'static {
    async fn open(&mut self) -> Result<FrameStream, ApiError>;
}

/// Incremental parser for `text/event-stream` bodies.
///
/// The event name comes from `event:` and the arguments from the JSON in the
/// `data:` lines. A JSON array is the argument list, anything else is a
/// single argument. Unnamed events carrying `{"target", "arguments"}` are
/// unwrapped.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Bytes of the line not terminated yet; may end inside a character.
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PushFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<PushFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if data.is_empty() && event.is_none() {
            return None;
        }
        let data = data.join("\n");
        let payload = if data.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&data).unwrap_or(Value::String(data))
        };
        match (event, payload) {
            (Some(event), Value::Array(args)) => Some(PushFrame { event, args }),
            (Some(event), Value::Null) => Some(PushFrame {
                event,
                args: Vec::new(),
            }),
            (Some(event), arg) => Some(PushFrame {
                event,
                args: vec![arg],
            }),
            (None, Value::Object(mut map)) => {
                let event = match map.remove("target") {
                    Some(Value::String(target)) => target,
                    _ => return None,
                };
                let args = match map.remove("arguments") {
                    Some(Value::Array(args)) => args,
                    Some(arg) => vec![arg],
                    None => Vec::new(),
                };
                Some(PushFrame { event, args })
            }
            (None, _) => None,
        }
    }
}

/// Hub endpoint read as a server-sent-event stream.
pub struct SseTransport {
    http: reqwest::Client,
    url: String,
    session: Arc<dyn SessionStore>,
}

impl SseTransport {
    pub fn new(http: reqwest::Client, url: String, session: Arc<dyn SessionStore>) -> Self {
        SseTransport { http, url, session }
    }

    /// A transport with its own client; no request timeout, the stream is
    /// expected to stay open.
    pub fn build(url: String, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self::new(http, url, session))
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn open(&mut self) -> Result<FrameStream, ApiError> {
        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream");
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(failure(status, &body));
        }
        let mut parser = SseParser::default();
        let frames = resp
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => parser.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(ApiError::from(err))],
            })
            .flat_map(futures::stream::iter)
            .boxed();
        Ok(frames)
    }
}

#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Delay between attempts while the hub was never reached.
    pub retry_delay: Duration,
    /// Delays of the automatic reconnection after a dropped connection.
    pub reconnect_schedule: Vec<Duration>,
}

impl Default for HubOptions {
    fn default() -> Self {
        HubOptions {
            retry_delay: Duration::from_secs(20),
            reconnect_schedule: [0, 2, 5, 10, 30]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

/// A running hub connection.
pub struct HubHandle {
    hub: HubKind,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl HubHandle {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            tracing::error!(hub = %self.hub, ?err, "hub task failed");
        }
    }
}

/// Spawns the connection loop for `hub`, reporting into `send`.
pub fn spawn_hub<T: PushTransport>(
    hub: HubKind,
    transport: T,
    opts: HubOptions,
    send: mpsc::UnboundedSender<(HubKind, HubEvent)>,
) -> HubHandle {
    let cancel = CancellationToken::new();
    let span = tracing::info_span!("hub", %hub);
    let join = tokio::task::spawn(
        run_hub(
            HubConnection {
                hub,
                transport,
                opts,
                send,
            },
            cancel.clone(),
        )
        .instrument(span),
    );
    HubHandle { hub, cancel, join }
}

struct HubConnection<T: PushTransport> {
    hub: HubKind,
    transport: T,
    opts: HubOptions,
    send: mpsc::UnboundedSender<(HubKind, HubEvent)>,
}

impl<T: PushTransport> HubConnection<T> {
    /// False once nobody listens anymore.
    fn emit(&self, event: HubEvent) -> bool {
        self.send.send((self.hub, event)).is_ok()
    }

    /// Tries until connected; `None` when cancelled or nobody listens.
    async fn connect(&mut self, cancel: &CancellationToken) -> Option<FrameStream> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            if !self.emit(HubEvent::Connecting) {
                return None;
            }
            let opened = tokio::select! {
                _ = cancel.cancelled() => return None,
                opened = self.transport.open() => opened,
            };
            match opened {
                Ok(stream) => {
                    return self.emit(HubEvent::Connected).then_some(stream);
                }
                Err(err) => {
                    tracing::warn!(attempt, %err, retry_in = ?self.opts.retry_delay, "could not connect to hub");
                    if !self.emit(HubEvent::ConnectFailed(err.to_string())) {
                        return None;
                    }
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.opts.retry_delay) => {}
            }
        }
    }

    /// Walks the reconnect schedule; `None` if every attempt failed.
    async fn reconnect(&mut self, cancel: &CancellationToken) -> Option<FrameStream> {
        for (attempt, delay) in self.opts.reconnect_schedule.clone().into_iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
            let opened = tokio::select! {
                _ = cancel.cancelled() => return None,
                opened = self.transport.open() => opened,
            };
            match opened {
                Ok(stream) => return Some(stream),
                Err(err) => tracing::debug!(attempt, %err, "reconnect attempt failed"),
            }
        }
        None
    }

    /// Forwards frames until the stream ends; returns the reason it ended.
    async fn pump(&mut self, stream: &mut FrameStream, cancel: &CancellationToken) -> Option<String> {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return None,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(frame)) => match PushMessage::parse(&frame.event, &frame.args) {
                    Some(message) => {
                        if !self.emit(HubEvent::Message(message)) {
                            return None;
                        }
                    }
                    None => tracing::debug!(event = %frame.event, "ignoring unknown hub event"),
                },
                Some(Err(err)) => return Some(err.to_string()),
                None => return Some("stream ended".to_owned()),
            }
        }
    }
}

async fn run_hub<T: PushTransport>(mut conn: HubConnection<T>, cancel: CancellationToken) {
    'connect: while let Some(mut stream) = conn.connect(&cancel).await {
        loop {
            let reason = match conn.pump(&mut stream, &cancel).await {
                Some(reason) => reason,
                None => break 'connect,
            };
            if cancel.is_cancelled() || !conn.emit(HubEvent::Reconnecting(Some(reason.clone()))) {
                break 'connect;
            }
            match conn.reconnect(&cancel).await {
                Some(reopened) => {
                    stream = reopened;
                    if !conn.emit(HubEvent::Reconnected) {
                        break 'connect;
                    }
                }
                None => {
                    if cancel.is_cancelled() || !conn.emit(HubEvent::Closed(Some(reason))) {
                        break 'connect;
                    }
                    continue 'connect;
                }
            }
        }
    }
    tracing::debug!("hub connection loop finished");
}
