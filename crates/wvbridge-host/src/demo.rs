//! Sample host application.
//!
//! Mirrors the classic bridge demo: a default handler, one named host
//! handler, a send with a callback and a named call issued before the page
//! has loaded (both buffered by the startup queue), then a send after the
//! navigation has been requested.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use wvbridge_core::error::{BridgeError, Result};
use wvbridge_guest::GuestRuntime;

use crate::bridge::{BridgeOptions, HostBridge, Responder};
use crate::config::{HostConfig, TransportKind};
use crate::transport::loopback::LoopbackWebView;
use crate::transport::ws::{build_router, WsWebView};
use crate::transport::WebView;

pub async fn run(cfg: &HostConfig) -> Result<()> {
    match cfg.transport.kind {
        TransportKind::Loopback => run_loopback(cfg).await,
        TransportKind::Websocket => run_websocket(cfg).await,
    }
}

/// Attach a bridge with the sample handlers and issue the pre-load traffic.
pub fn attach<W: WebView + 'static>(
    webview: &Arc<W>,
    options: BridgeOptions,
) -> Result<HostBridge> {
    let bridge = HostBridge::new(webview, default_handler, options);
    bridge.register_handler("testHostCallback", |data: Option<Value>, responder: Responder| {
        info!(data = ?data, "testHostCallback called");
        responder.respond(json!("Response from testHostCallback"));
        Ok(())
    });

    bridge.send_with_response(
        Some(json!("A string sent from the host before the web view has loaded.")),
        |reply| info!(%reply, "host got response"),
    )?;
    bridge.call_handler("testJavascriptHandler", Some(json!({ "foo": "before ready" })))?;
    Ok(bridge)
}

fn default_handler(data: Option<Value>, responder: Responder) -> Result<()> {
    info!(data = ?data, "host received message");
    responder.respond(json!("Response for message from the host"));
    Ok(())
}

/// Guest page used by the loopback transport.
pub fn sample_page(rt: &GuestRuntime) {
    rt.on_bridge_ready(|bridge| {
        let init = bridge.init(|data, responder| {
            info!(data = ?data, "guest received message");
            responder.respond(json!("Response for message from the guest"));
            Ok(())
        });
        if let Err(e) = init {
            tracing::warn!(error = %e, "guest bridge init failed");
            return;
        }
        bridge.register_handler("testJavascriptHandler", |data, responder| {
            info!(data = ?data, "testJavascriptHandler called");
            responder.respond(json!({ "Javascript Says": "Right back atcha!" }));
            Ok(())
        });
        bridge.send_with_response(Some(json!("A string sent from the guest")), |reply| {
            info!(%reply, "guest got response")
        });
        bridge.call_handler_with_response(
            "testHostCallback",
            Some(json!({ "foo": "bar" })),
            |reply| info!(%reply, "testHostCallback responded"),
        );
    });
}

async fn run_loopback(cfg: &HostConfig) -> Result<()> {
    let options = BridgeOptions::from(&cfg.bridge);
    let limit = options.eval_timeout;
    let webview = LoopbackWebView::spawn()?;
    let bridge = attach(&webview, options)?;

    webview.navigate(sample_page)?;
    bridge.send(Some(json!("A string sent from the host after the web view has loaded.")))?;

    tokio::time::timeout(limit, bridge.wait_ready())
        .await
        .map_err(|_| BridgeError::Transport("guest never became ready".into()))??;
    settle(&bridge, &webview, limit).await;

    let faults = webview.take_guest_faults();
    info!(guest_faults = faults.len(), "loopback demo finished");
    bridge.destroy();
    Ok(())
}

/// Wait until no host continuation is outstanding and the guest has
/// nothing left to send, bounded by `limit`.
async fn settle(bridge: &HostBridge, webview: &LoopbackWebView, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        let guest_pending = webview
            .run_in_guest(|rt| rt.bridge().map_or(0, |b| b.pending_callbacks()))
            .await
            .unwrap_or(0);
        if bridge.pending_callbacks() == 0 && guest_pending == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn run_websocket(cfg: &HostConfig) -> Result<()> {
    let listen = cfg.transport.listen_addr()?;
    let webview = WsWebView::new();
    let bridge = attach(&webview, BridgeOptions::from(&cfg.bridge))?;

    let app = build_router(Arc::clone(&webview));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| BridgeError::Transport(format!("bind {listen} failed: {e}")))?;
    info!(%listen, "open the dev page in a browser");

    tokio::spawn({
        let bridge = bridge.clone();
        async move {
            if bridge.wait_ready().await.is_ok() {
                let after = json!("A string sent from the host after the web view has loaded.");
                let _ = bridge.send(Some(after));
            }
        }
    });

    axum::serve(listener, app)
        .await
        .map_err(|e| BridgeError::Transport(format!("server failed: {e}")))
}
