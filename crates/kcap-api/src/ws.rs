//! WebSocket capture relay.
//!
//! The client sends its target URL, then `ping` keep-alives; the relay
//! starts a job, polls the worker's status endpoint once per keep-alive
//! (after a fixed coalescing sleep), and forwards results. The worker is
//! stopped on every session exit path; the archive is left for the reaper.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use validator::Validate;

use kcap_models::{CaptureId, CaptureRequest, RelayMessage};

use crate::config::CaptureConfig;
use crate::security::UrlAllowList;
use crate::services::Orchestrator;
use crate::state::AppState;
use crate::worker::WorkerApi;

/// Events arriving from the client side of the session.
#[derive(Debug)]
pub(crate) enum ClientEvent {
    Url(String),
    KeepAlive,
    Disconnected,
}

/// One relay session: AwaitingUrl, then Running, then Terminating.
pub(crate) struct RelaySession {
    orchestrator: Arc<Orchestrator>,
    worker: Arc<dyn WorkerApi>,
    allow_list: Arc<UrlAllowList>,
    poll_interval: Duration,
    max_poll_failures: u32,
    await_url_timeout: Duration,
    embeds: bool,
}

impl RelaySession {
    pub(crate) fn new(
        orchestrator: Arc<Orchestrator>,
        worker: Arc<dyn WorkerApi>,
        allow_list: Arc<UrlAllowList>,
        config: &CaptureConfig,
        embeds: bool,
    ) -> Self {
        Self {
            orchestrator,
            worker,
            allow_list,
            poll_interval: config.poll_interval,
            max_poll_failures: config.max_poll_failures,
            await_url_timeout: config.await_url_timeout,
            embeds,
        }
    }

    /// Drive the session to completion.
    pub(crate) async fn run(
        &self,
        events: &mut mpsc::Receiver<ClientEvent>,
        out: mpsc::Sender<RelayMessage>,
    ) {
        // AwaitingUrl: nothing exists yet, so an invalid or absent URL just
        // ends the session without any cleanup obligations.
        let url = match timeout(self.await_url_timeout, next_url(events)).await {
            Ok(Some(url)) => url,
            Ok(None) => return,
            Err(_) => {
                let _ = out
                    .send(RelayMessage::Error("expected a target URL".to_string()))
                    .await;
                return;
            }
        };

        if !self.allow_list.is_allowed(&url) {
            info!(%url, "Rejected capture URL not on the allow-list");
            let _ = out
                .send(RelayMessage::Error("URL is not permitted".to_string()))
                .await;
            return;
        }

        let mut request = CaptureRequest::single(url);
        request.embeds = self.embeds;
        if let Err(e) = request.validate() {
            let _ = out
                .send(RelayMessage::Error(format!("invalid capture URL: {}", e)))
                .await;
            return;
        }

        let started = self.orchestrator.start_job(&request).await;
        let Some(id) = started.jobids.first().cloned() else {
            let _ = out
                .send(RelayMessage::Error(
                    "failed to start capture job".to_string(),
                ))
                .await;
            return;
        };

        // Running. From here on there is a live worker; every way out of
        // run_started funnels into the stop call below.
        self.run_started(&id, events, &out).await;

        if let Err(e) = self.orchestrator.stop_worker(&id).await {
            warn!(job = %id, error = %e, "Failed to stop worker on session exit");
        }
    }

    async fn run_started(
        &self,
        id: &CaptureId,
        events: &mut mpsc::Receiver<ClientEvent>,
        out: &mpsc::Sender<RelayMessage>,
    ) {
        if out.send(RelayMessage::Id(id.to_string())).await.is_err() {
            return;
        }

        let job_name = id.job_name();
        let mut failures: u32 = 0;

        loop {
            match events.recv().await {
                Some(ClientEvent::KeepAlive) => {
                    // Coalesce keep-alives so the worker sees at most one
                    // poll per interval, never a poll per ping.
                    sleep(self.poll_interval).await;
                    match self.worker.status(&job_name).await {
                        Ok(status) => {
                            failures = 0;
                            let done = status.done;
                            if out.send(RelayMessage::Status(status)).await.is_err() {
                                return;
                            }
                            if done {
                                info!(job = %id, "Capture finished");
                                return;
                            }
                        }
                        Err(e) => {
                            failures += 1;
                            warn!(job = %id, error = %e, failures, "Worker status poll failed");
                            if failures >= self.max_poll_failures {
                                let _ = out
                                    .send(RelayMessage::Error(
                                        "capture worker is unreachable".to_string(),
                                    ))
                                    .await;
                                return;
                            }
                        }
                    }
                }
                // The session already has its URL; stray text is ignored.
                Some(ClientEvent::Url(_)) => continue,
                Some(ClientEvent::Disconnected) | None => {
                    info!(job = %id, "Client disconnected");
                    return;
                }
            }
        }
    }
}

/// Plain capture over WebSocket.
pub async fn ws_capture(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, false))
}

/// Embed-view capture over WebSocket; same core, embed flag set.
pub async fn ws_embed(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, true))
}

async fn handle_socket(socket: WebSocket, state: AppState, embeds: bool) {
    let (ws_sender, ws_receiver) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<ClientEvent>(16);
    let (out_tx, out_rx) = mpsc::channel::<RelayMessage>(16);

    let reader = tokio::spawn(read_client(ws_receiver, event_tx));
    let writer = tokio::spawn(write_client(ws_sender, out_rx));

    let session = RelaySession::new(
        Arc::clone(&state.orchestrator),
        Arc::clone(&state.worker),
        Arc::clone(&state.allow_list),
        &state.config,
        embeds,
    );
    session.run(&mut event_rx, out_tx).await;

    reader.abort();
    let _ = writer.await;
}

async fn read_client(mut receiver: SplitStream<WebSocket>, events: mpsc::Sender<ClientEvent>) {
    while let Some(frame) = receiver.next().await {
        let event = match frame {
            Ok(Message::Text(text)) => {
                if text == "ping" {
                    ClientEvent::KeepAlive
                } else {
                    ClientEvent::Url(text)
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events.send(ClientEvent::Disconnected).await;
}

async fn write_client(
    mut sender: SplitSink<WebSocket, Message>,
    mut out: mpsc::Receiver<RelayMessage>,
) {
    while let Some(message) = out.recv().await {
        if sender.send(Message::Text(message.encode())).await.is_err() {
            break;
        }
    }
}

async fn next_url(events: &mut mpsc::Receiver<ClientEvent>) -> Option<String> {
    loop {
        match events.recv().await {
            Some(ClientEvent::Url(url)) => return Some(url),
            Some(ClientEvent::KeepAlive) => continue,
            Some(ClientEvent::Disconnected) | None => return None,
        }
    }
}
