//! WebSocket dev transport.
//!
//! A browser page served from `/` connects back on `/v1/bridge` and acts as
//! the guest runtime. Host evaluations travel as `{"id","script"}` frames and
//! are answered by `reply` frames carrying the same id; the page's scalar
//! notifications and navigation progress arrive as tagged frames and are
//! republished on the event hub. One page is attached at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::{Html, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use wvbridge_core::error::{BridgeError, Result};

use crate::transport::{EventHub, Subscription, WebView, WebViewEvent};

const DEV_PAGE: &str = include_str!("../../assets/dev.html");

/// Frames sent by the page.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum PageFrame {
    Reply {
        id: u64,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Notify {
        value: String,
    },
    NavigationStarting,
    NavigationCompleted,
    NavigationFailed,
}

type Pending = DashMap<u64, (u64, oneshot::Sender<Result<String>>)>;

/// The attached page: its session number and outbound frame sender.
struct Page {
    session: u64,
    frames: mpsc::Sender<Message>,
}

pub struct WsWebView {
    hub: Arc<EventHub>,
    page: Mutex<Option<Page>>,
    /// Evaluation id -> (session it was sent to, reply slot).
    pending: Pending,
    seq: AtomicU64,
    sessions: AtomicU64,
}

impl WsWebView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hub: EventHub::new(),
            page: Mutex::new(None),
            pending: DashMap::new(),
            seq: AtomicU64::new(1),
            sessions: AtomicU64::new(1),
        })
    }

    /// Attach a page whose frames go to `frames`, replacing any attached
    /// page. Returns the session number to pass to `detach_page`.
    pub async fn attach_page(&self, frames: mpsc::Sender<Message>) -> u64 {
        let session = self.sessions.fetch_add(1, Ordering::Relaxed);
        if let Some(prev) = self.page.lock().await.replace(Page { session, frames }) {
            info!(replaced = prev.session, "new page replaces the attached one");
        }
        info!(session, "page attached");
        session
    }

    /// Detach `session`. Evaluations still waiting on it fail right away.
    pub async fn detach_page(&self, session: u64) {
        {
            let mut page = self.page.lock().await;
            if page.as_ref().is_some_and(|p| p.session == session) {
                *page = None;
            }
        }
        let before = self.pending.len();
        self.pending.retain(|_, (owner, _)| *owner != session);
        let failed = before.saturating_sub(self.pending.len());
        info!(session, failed, "page detached");
    }

    pub async fn is_attached(&self) -> bool {
        self.page.lock().await.is_some()
    }

    fn resolve(&self, id: u64, res: Result<String>) {
        match self.pending.remove(&id) {
            Some((_, (_, tx))) => {
                let _ = tx.send(res);
            }
            None => debug!(id, "reply for unknown or abandoned evaluation"),
        }
    }
}

/// Drops the pending slot if the evaluating future goes away first.
struct PendingGuard<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

#[async_trait]
impl WebView for WsWebView {
    async fn evaluate_script(&self, script: &str) -> Result<String> {
        let (session, frames) = self
            .page
            .lock()
            .await
            .as_ref()
            .map(|p| (p.session, p.frames.clone()))
            .ok_or_else(|| BridgeError::Transport("no page attached".into()))?;

        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, (session, tx));
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let frame = json!({ "id": id, "script": script }).to_string();
        frames
            .send(Message::Text(frame))
            .await
            .map_err(|_| BridgeError::Transport("page connection closed".into()))?;

        rx.await
            .map_err(|_| BridgeError::Transport("page detached before replying".into()))?
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}

pub fn build_router(webview: Arc<WsWebView>) -> Router {
    Router::new()
        .route("/", get(dev_page))
        .route("/v1/bridge", get(ws_upgrade))
        .with_state(webview)
}

async fn dev_page() -> Html<&'static str> {
    Html(DEV_PAGE)
}

async fn ws_upgrade(State(webview): State<Arc<WsWebView>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(webview, socket).await {
            warn!(error = %e, "page session ended with error");
        }
    })
}

async fn run_session(webview: Arc<WsWebView>, socket: WebSocket) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let session = webview.attach_page(out_tx).await;
    webview.hub.publish(WebViewEvent::NavigationStarting);
    let mut loading = true;

    loop {
        tokio::select! {
            maybe_out = out_rx.recv() => {
                let Some(m) = maybe_out else { break; };
                if ws_tx.send(m).await.is_err() {
                    break;
                }
            }

            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break; };
                match msg {
                    Message::Text(s) => match serde_json::from_str::<PageFrame>(&s) {
                        Ok(frame) => on_frame(&webview, frame, &mut loading),
                        Err(e) => warn!(error = %e, "undecodable page frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    drop(out_rx);
    webview.detach_page(session).await;
    if loading {
        webview.hub.publish(WebViewEvent::NavigationFailed);
    }
    Ok(())
}

fn on_frame(webview: &WsWebView, frame: PageFrame, loading: &mut bool) {
    match frame {
        PageFrame::Reply { id, result, error } => {
            let res = match error {
                Some(e) => Err(BridgeError::Transport(format!("page script error: {e}"))),
                None => Ok(result.unwrap_or_default()),
            };
            webview.resolve(id, res);
        }
        PageFrame::Notify { value } => webview.hub.publish(WebViewEvent::ScriptNotify(value)),
        PageFrame::NavigationStarting => {
            *loading = true;
            webview.hub.publish(WebViewEvent::NavigationStarting);
        }
        PageFrame::NavigationCompleted => {
            *loading = false;
            webview.hub.publish(WebViewEvent::NavigationCompleted);
        }
        PageFrame::NavigationFailed => {
            *loading = false;
            webview.hub.publish(WebViewEvent::NavigationFailed);
        }
    }
}
