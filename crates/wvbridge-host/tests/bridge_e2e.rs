//! Host and guest bridges talking over the loopback web view.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use wvbridge_core::protocol::codec::decode;
use wvbridge_core::protocol::script::{ScriptCommand, BOOTSTRAP, PROBE};
use wvbridge_core::protocol::Envelope;
use wvbridge_core::{BridgeError, ErrorCode};
use wvbridge_guest::GuestRuntime;
use wvbridge_host::transport::loopback::LoopbackWebView;
use wvbridge_host::transport::{Subscription, WebView};
use wvbridge_host::{BridgeOptions, BridgeState, HostBridge, Responder};

const WAIT: Duration = Duration::from_secs(5);

/// Loopback web view that remembers every evaluated script.
struct Recording {
    inner: Arc<LoopbackWebView>,
    scripts: Mutex<Vec<String>>,
}

impl Recording {
    fn spawn() -> Arc<Self> {
        Arc::new(Self {
            inner: LoopbackWebView::spawn().unwrap(),
            scripts: Mutex::new(Vec::new()),
        })
    }

    fn evaluated(&self, script: &str) -> bool {
        self.scripts.lock().unwrap().iter().any(|s| s == script)
    }

    /// Envelopes the host pushed into the guest, in order.
    fn deliveries(&self) -> Vec<Envelope> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match ScriptCommand::parse(s).unwrap() {
                Some(ScriptCommand::Deliver(json)) => Some(decode(&json).unwrap()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl WebView for Recording {
    async fn evaluate_script(&self, script: &str) -> wvbridge_core::Result<String> {
        self.scripts.lock().unwrap().push(script.to_string());
        self.inner.evaluate_script(script).await
    }

    fn subscribe(&self) -> Subscription {
        self.inner.subscribe()
    }
}

fn options() -> BridgeOptions {
    BridgeOptions {
        eval_timeout: Duration::from_secs(2),
        on_fault: None,
    }
}

fn collecting_faults() -> (BridgeOptions, Arc<Mutex<Vec<ErrorCode>>>) {
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&faults);
    let options = BridgeOptions {
        on_fault: Some(Arc::new(move |e: &BridgeError| sink.lock().unwrap().push(e.code()))),
        ..options()
    };
    (options, faults)
}

fn ignore(_: Option<Value>, _: Responder) -> wvbridge_core::Result<()> {
    Ok(())
}

async fn eventually(f: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    f()
}

/// Page whose default handler echoes the payload and which offers `greet`.
fn echo_page(rt: &GuestRuntime) {
    rt.on_bridge_ready(|bridge| {
        bridge
            .init(|data, responder| {
                responder.respond(data.unwrap_or(Value::Null));
                Ok(())
            })
            .unwrap();
        bridge.register_handler("greet", |_, responder| {
            responder.respond(json!({ "reply": "hi" }));
            Ok(())
        });
    });
}

#[tokio::test]
async fn named_call_gets_reply() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());

    let (tx, rx) = oneshot::channel();
    bridge
        .call_handler_with_response("greet", Some(json!({ "name": "bob" })), move |reply| {
            let _ = tx.send(reply);
        })
        .unwrap();
    assert_eq!(bridge.pending_callbacks(), 1);
    webview.inner.navigate(echo_page).unwrap();

    let reply = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
    assert_eq!(reply, json!({ "reply": "hi" }));
    assert_eq!(bridge.state(), BridgeState::Ready);
    assert_eq!(bridge.pending_callbacks(), 0);

    let delivered = webview.deliveries();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].handler_name.as_deref(), Some("greet"));
    assert_eq!(delivered[0].callback_id.as_deref(), Some("cb_1"));
    assert!(webview.evaluated(PROBE));
    assert!(webview.evaluated(BOOTSTRAP));
}

#[tokio::test]
async fn startup_queue_keeps_send_order() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let send = |i: i64| {
        let seen = Arc::clone(&seen);
        bridge
            .send_with_response(Some(json!(i)), move |reply| seen.lock().unwrap().push(reply))
            .unwrap();
    };
    send(0);
    send(1);
    send(2);
    webview.inner.navigate(echo_page).unwrap();
    send(3);

    assert!(eventually(|| seen.lock().unwrap().len() == 4).await);
    assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn page_shipping_the_bridge_skips_bootstrap() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());

    webview
        .inner
        .navigate(|rt| {
            echo_page(rt);
            rt.install_bridge();
        })
        .unwrap();
    tokio::time::timeout(WAIT, bridge.wait_ready()).await.unwrap().unwrap();

    assert!(webview.evaluated(PROBE));
    assert!(!webview.evaluated(BOOTSTRAP));
}

#[tokio::test]
async fn guest_send_without_callback_gets_no_reply() {
    let webview = Recording::spawn();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let bridge = HostBridge::new(
        &webview,
        move |data: Option<Value>, responder: Responder| {
            assert_eq!(data, Some(json!("ping")));
            assert!(!responder.expects_reply());
            counter.fetch_add(1, Ordering::SeqCst);
            responder.respond(json!("ignored"));
            Ok(())
        },
        options(),
    );

    webview
        .inner
        .navigate(|rt| {
            rt.on_bridge_ready(|bridge| {
                bridge.init(|_, _| Ok(())).unwrap();
                bridge.send(Some(json!("ping")));
            })
        })
        .unwrap();

    assert!(eventually(|| calls.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(webview.deliveries().is_empty());
    assert_eq!(bridge.state(), BridgeState::Ready);
}

#[tokio::test]
async fn guest_call_with_callback_is_answered_once() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bridge.register_handler("testHostCallback", move |data, responder| {
        assert_eq!(data, Some(json!({ "foo": "bar" })));
        counter.fetch_add(1, Ordering::SeqCst);
        responder.respond(json!("from host"));
        Ok(())
    });

    webview
        .inner
        .navigate(|rt| {
            rt.on_bridge_ready(|bridge| {
                bridge.init(|_, _| Ok(())).unwrap();
                bridge.call_handler_with_response(
                    "testHostCallback",
                    Some(json!({ "foo": "bar" })),
                    |_| {},
                );
            })
        })
        .unwrap();

    assert!(eventually(|| calls.load(Ordering::SeqCst) == 1).await);
    assert!(eventually(|| webview.deliveries().len() == 1).await);
    let reply = &webview.deliveries()[0];
    assert_eq!(reply.response_id.as_deref(), Some("cb_1"));
    assert_eq!(reply.response_data, Some(json!("from host")));

    let guest_pending = webview
        .inner
        .run_in_guest(|rt| rt.bridge().map(|b| b.pending_callbacks()))
        .await
        .unwrap();
    assert_eq!(guest_pending, Some(0));
}

#[tokio::test]
async fn named_miss_reports_fault_without_default_fallback() {
    let webview = Recording::spawn();
    let defaults = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&defaults);
    let (options, faults) = collecting_faults();
    let _bridge = HostBridge::new(
        &webview,
        move |_: Option<Value>, _: Responder| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        options,
    );

    webview
        .inner
        .navigate(|rt| {
            rt.on_bridge_ready(|bridge| {
                bridge.init(|_, _| Ok(())).unwrap();
                bridge.call_handler("missing", Some(json!(1)));
            })
        })
        .unwrap();

    assert!(eventually(|| !faults.lock().unwrap().is_empty()).await);
    assert_eq!(*faults.lock().unwrap(), vec![ErrorCode::NoHandlerForCall]);
    assert_eq!(defaults.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_handlers_are_contained() {
    let webview = Recording::spawn();
    let (options, faults) = collecting_faults();
    let bridge = HostBridge::new(&webview, ignore, options);
    let after = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&after);
    bridge.register_handler("fails", |_, _| Err(BridgeError::Internal("nope".into())));
    bridge.register_handler("panics", |_, _| panic!("handler blew up"));
    bridge.register_handler("after", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    webview
        .inner
        .navigate(|rt| {
            rt.on_bridge_ready(|bridge| {
                bridge.init(|_, _| Ok(())).unwrap();
                bridge.call_handler("fails", None);
                bridge.call_handler("panics", None);
                bridge.call_handler("after", None);
            })
        })
        .unwrap();

    assert!(eventually(|| after.load(Ordering::SeqCst) == 1).await);
    assert_eq!(
        *faults.lock().unwrap(),
        vec![ErrorCode::HandlerThrew, ErrorCode::HandlerThrew]
    );
}

#[tokio::test]
async fn guest_faults_are_recorded() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());
    bridge.call_handler("absent", None).unwrap();
    webview.inner.navigate(echo_page).unwrap();

    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    while seen.is_empty() && tokio::time::Instant::now() < deadline {
        seen.extend(webview.inner.take_guest_faults());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(seen, vec![ErrorCode::NoHandlerForCall]);
}

#[tokio::test]
async fn destroy_rejects_sends_and_unsubscribes() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());
    assert_eq!(webview.inner.subscriber_count(), 1);

    webview.inner.navigate(echo_page).unwrap();
    tokio::time::timeout(WAIT, bridge.wait_ready()).await.unwrap().unwrap();

    bridge.destroy();
    bridge.destroy();
    assert!(matches!(bridge.send(None), Err(BridgeError::Destroyed)));
    assert!(matches!(
        bridge.call_handler_with_response("greet", None, |_| {}),
        Err(BridgeError::Destroyed)
    ));
    assert_eq!(bridge.pending_callbacks(), 0);

    assert!(eventually(|| bridge.state() == BridgeState::Destroyed).await);
    assert!(eventually(|| webview.inner.subscriber_count() == 0).await);
    assert!(matches!(bridge.wait_ready().await, Err(BridgeError::Destroyed)));
}

#[tokio::test]
async fn destroy_before_ready_drops_buffered_sends() {
    let webview = Recording::spawn();
    let bridge = HostBridge::new(&webview, ignore, options());
    bridge.send_with_response(Some(json!(1)), |_| {}).unwrap();
    assert_eq!(bridge.pending_callbacks(), 1);

    bridge.destroy();
    assert_eq!(bridge.pending_callbacks(), 0);
    assert!(matches!(
        tokio::time::timeout(WAIT, bridge.wait_ready()).await.unwrap(),
        Err(BridgeError::Destroyed)
    ));
    assert!(webview.deliveries().is_empty());
}
