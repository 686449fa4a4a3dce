//! Shared utilities for integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use txbridge::client::{
    ActionClient, ActionError, ActionResult, DeployRequest, InvokeRequest, Submission,
};
use txbridge::config::{EngineConfig, StreamConfig};
use txbridge::envelope::CorrelationKey;

/// How the mock feed treats its single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Answer registration with an ack, relay frames, record client messages.
    Ack,
    /// Complete the WebSocket handshake, then never read or write again.
    Silent,
}

enum FeedCommand {
    Send(String),
    Close,
}

/// Sending half of a mock feed. Cheap to clone.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<FeedCommand>,
}

impl FeedHandle {
    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.commands.send(FeedCommand::Send(text.to_string()));
    }

    /// Send a close frame.
    pub fn close(&self) {
        let _ = self.commands.send(FeedCommand::Close);
    }
}

/// A one-connection WebSocket notification server on its own thread.
pub struct MockFeed {
    pub url: String,
    handle: FeedHandle,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockFeed {
    pub fn start(mode: FeedMode) -> Self {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let url = format!("ws://{}/ws", std_listener.local_addr().unwrap());

        let (tx, rx) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(serve_feed(std_listener, mode, rx, log));
        });

        Self {
            url,
            handle: FeedHandle { commands: tx },
            received,
        }
    }

    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }

    pub fn send(&self, frame: Value) {
        self.handle.send(frame);
    }

    pub fn send_raw(&self, text: &str) {
        self.handle.send_raw(text);
    }

    pub fn close(&self) {
        self.handle.close();
    }

    /// Text frames received from the client so far.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Poll until some received frame satisfies `pred`.
    pub fn wait_for(&self, pred: impl Fn(&Value) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let matched = self
                .received()
                .iter()
                .filter_map(|text| serde_json::from_str::<Value>(text).ok())
                .any(|value| pred(&value));
            if matched {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

async fn serve_feed(
    std_listener: std::net::TcpListener,
    mode: FeedMode,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    received: Arc<Mutex<Vec<String>>>,
) {
    let listener = TcpListener::from_std(std_listener).unwrap();
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    if mode == FeedMode::Silent {
        // Hold the socket open without servicing it until the test is done.
        while commands.recv().await.is_some() {}
        return;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(FeedCommand::Send(text)) => {
                    if ws.send(Message::text(text)).await.is_err() {
                        return;
                    }
                }
                Some(FeedCommand::Close) => {
                    let _ = ws.send(Message::Close(None)).await;
                    // Drain until the client completes the closing handshake.
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }
                None => return,
            },
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_string();
                    let is_register = serde_json::from_str::<Value>(&text)
                        .ok()
                        .and_then(|v| v.get("command").and_then(Value::as_str).map(|c| c == "register"))
                        .unwrap_or(false);
                    received.lock().unwrap().push(text);
                    if is_register {
                        let ack = json!({"command": "register:ack", "sessionID": "session-1"});
                        if ws.send(Message::text(ack.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(_)) => {}
                _ => return,
            },
        }
    }
}

/// Stream settings pointed at `url`, with short timeouts for tests.
pub fn stream_config(url: &str) -> StreamConfig {
    StreamConfig {
        url: url.to_string(),
        connect_timeout_secs: 5,
        idle_timeout_secs: 5,
        ping_timeout_secs: 5,
        idle_poll_ms: 20,
        register: true,
    }
}

pub fn engine_config(rounds: u64) -> EngineConfig {
    EngineConfig {
        poll_interval_ms: 20,
        rounds,
        max_in_flight: 1,
    }
}

pub fn deployment_frame(key: &str, contract: &str) -> Value {
    json!({"type": "contractmon", "txHash": key, "contract": contract})
}

pub fn event_frame(key: &str, event_name: &str) -> Value {
    json!({
        "type": "event",
        "event_name": event_name,
        "txHash": key,
        "event_data": {
            "newNote": "NewNote1580000000",
            "incrementedBy": "0xabc",
            "incrementedValue": 42
        },
        "ctime": 1_580_000_000
    })
}

/// A call seen by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Deploy(DeployRequest),
    Invoke(InvokeRequest),
}

type SubmitHook = Box<dyn Fn(&Call, &CorrelationKey)>;

/// In-memory `ActionClient` that hands out scripted keys and records calls.
#[derive(Default)]
pub struct RecordingClient {
    keys: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Call>>,
    hook: Option<SubmitHook>,
}

impl RecordingClient {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            keys: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Run `hook` after every accepted submission, e.g. to emit its confirmation.
    pub fn on_submit(mut self, hook: impl Fn(&Call, &CorrelationKey) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invokes(&self) -> Vec<InvokeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Invoke(request) => Some(request),
                Call::Deploy(_) => None,
            })
            .collect()
    }

    fn submit(&self, call: Call) -> ActionResult<Submission> {
        let key = self
            .keys
            .lock()
            .unwrap()
            .pop_front()
            .map(CorrelationKey::from)
            .ok_or(ActionError::MissingKey)?;
        self.calls.lock().unwrap().push(call.clone());
        if let Some(hook) = &self.hook {
            hook(&call, &key);
        }
        Ok(Submission { key, target: None })
    }
}

impl ActionClient for RecordingClient {
    fn deploy(&self, request: &DeployRequest) -> ActionResult<Submission> {
        self.submit(Call::Deploy(request.clone()))
    }

    fn invoke(&self, request: &InvokeRequest) -> ActionResult<Submission> {
        self.submit(Call::Invoke(request.clone()))
    }
}
