//! Main event loop for the LSP server.
//!
//! A demultiplexing thread splits the client's messages into three streams,
//! each drained by its own task:
//! - Notifications are applied one at a time, in arrival order
//! - Requests are answered concurrently, one task per request
//! - Transport errors are logged
//!
//! Every request waits until the notifications received before it have been
//! applied, so it never observes a document older than the client's view.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use lsp_server::Message;
use lsp_types::notification::{Exit, Notification};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::router::{Flow, RequestRouter};

/// A failure of the connection to the client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client closed the connection without sending `exit`.
    #[error("client disconnected without exit")]
    Disconnected,

    /// A message could not be written.
    #[error("failed to send message: {0}")]
    Send(String),
}

/// How long to wait for blocking work when the loop ends.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A message tagged with a position in the notification stream.
type Sequenced<T> = (T, u64);

/// The receiving ends of the three input streams.
struct Inbound {
    requests: mpsc::UnboundedReceiver<Sequenced<lsp_server::Request>>,
    notifications: mpsc::UnboundedReceiver<Sequenced<lsp_server::Notification>>,
    errors: mpsc::UnboundedReceiver<TransportError>,
}

/// Run the main event loop until the client sends `exit` or disconnects.
pub fn run_main_loop(
    router: RequestRouter,
    receiver: Receiver<Message>,
    sender: Sender<Message>,
) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("orca-lsp-worker")
        .build()?;

    let (errors, error_rx) = mpsc::unbounded_channel();
    let (demux, requests, notifications) = spawn_demux(receiver, errors.clone())?;
    let inbound = Inbound {
        requests,
        notifications,
        errors: error_rx,
    };

    info!("Main loop started");
    runtime.block_on(dispatch(router, inbound, sender, errors));
    // Analyses detached by edits may still be running.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    if demux.join().is_err() {
        error!("Message demultiplexer panicked");
    }
    info!("Main loop ended");
    Ok(())
}

/// Split the client's messages into a request and a notification stream.
///
/// Each request is tagged with the number of notifications that preceded it;
/// each notification with its own position.
fn spawn_demux(
    receiver: Receiver<Message>,
    errors: mpsc::UnboundedSender<TransportError>,
) -> std::io::Result<(
    std::thread::JoinHandle<()>,
    mpsc::UnboundedReceiver<Sequenced<lsp_server::Request>>,
    mpsc::UnboundedReceiver<Sequenced<lsp_server::Notification>>,
)> {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (notification_tx, notification_rx) = mpsc::unbounded_channel();

    let handle = std::thread::Builder::new()
        .name("orca-lsp-demux".to_string())
        .spawn(move || {
            let mut seen = 0u64;
            for message in receiver {
                match message {
                    Message::Request(req) => {
                        if request_tx.send((req, seen)).is_err() {
                            return;
                        }
                    }
                    Message::Notification(notif) => {
                        seen += 1;
                        let exit = notif.method == Exit::METHOD;
                        if notification_tx.send((notif, seen)).is_err() || exit {
                            return;
                        }
                    }
                    Message::Response(resp) => {
                        debug!("Ignoring response to {}", resp.id);
                    }
                }
            }
            // Ignored: the loop may already be gone.
            let _ = errors.send(TransportError::Disconnected);
        })?;

    Ok((handle, request_rx, notification_rx))
}

async fn dispatch(
    router: RequestRouter,
    inbound: Inbound,
    sender: Sender<Message>,
    errors: mpsc::UnboundedSender<TransportError>,
) {
    let (applied_tx, applied_rx) = watch::channel(0u64);
    tokio::join!(
        handle_notifications(router.clone(), inbound.notifications, applied_tx),
        handle_requests(router, inbound.requests, applied_rx, sender, errors),
        handle_errors(inbound.errors),
    );
}

/// Apply notifications in order, publishing how many have been applied.
async fn handle_notifications(
    router: RequestRouter,
    mut notifications: mpsc::UnboundedReceiver<Sequenced<lsp_server::Notification>>,
    applied: watch::Sender<u64>,
) {
    while let Some((notif, seq)) = notifications.recv().await {
        let flow = router.handle_notification(notif);
        applied.send_replace(seq);
        if flow == Flow::Exit {
            break;
        }
    }
}

/// Answer each request on its own task.
async fn handle_requests(
    router: RequestRouter,
    mut requests: mpsc::UnboundedReceiver<Sequenced<lsp_server::Request>>,
    applied: watch::Receiver<u64>,
    sender: Sender<Message>,
    errors: mpsc::UnboundedSender<TransportError>,
) {
    let mut tasks = JoinSet::new();
    while let Some((req, barrier)) = requests.recv().await {
        let router = router.clone();
        let mut applied = applied.clone();
        let sender = sender.clone();
        let errors = errors.clone();
        tasks.spawn(async move {
            if applied.wait_for(|&seq| seq >= barrier).await.is_err() {
                debug!("Dropping request {} received before exit", req.id);
                return;
            }
            let response = router.handle_request(req).await;
            if let Err(e) = sender.send(Message::Response(response)) {
                if errors.send(TransportError::Send(e.to_string())).is_err() {
                    error!("Failed to send response: {}", e);
                }
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("Request task failed: {}", e);
        }
    }
}

async fn handle_errors(mut errors: mpsc::UnboundedReceiver<TransportError>) {
    while let Some(e) = errors.recv().await {
        error!("Transport error: {}", e);
    }
}
