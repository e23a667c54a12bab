//! Guest bridge: buffering, deferred dispatch, outbound queue.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use wvbridge_core::protocol::codec::{decode_batch, encode};
use wvbridge_core::protocol::Envelope;
use wvbridge_core::BridgeError;
use wvbridge_guest::{GuestBridge, GuestResponder, GuestRuntime};

struct Page {
    runtime: GuestRuntime,
    signals: Rc<RefCell<Vec<String>>>,
}

fn page() -> Page {
    let signals = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&signals);
    let runtime = GuestRuntime::new(move |sig: &str| s.borrow_mut().push(sig.to_string()));
    Page { runtime, signals }
}

fn push(bridge: &GuestBridge, env: &Envelope) {
    bridge.handle_message_from_native(encode(env).unwrap());
}

fn drain(bridge: &GuestBridge) -> Vec<Envelope> {
    decode_batch(&bridge.fetch_queue().unwrap()).unwrap()
}

fn ignore(_: Option<Value>, _: GuestResponder) -> wvbridge_core::Result<()> {
    Ok(())
}

#[test]
fn init_twice_is_rejected() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge.init(ignore).unwrap();
    let err = bridge.init(ignore).unwrap_err();
    assert!(matches!(err, BridgeError::DoubleInitialization));
}

#[test]
fn deliveries_before_init_replay_in_order() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    for i in 0..3 {
        push(&bridge, &Envelope::call(None, Some(json!(i)), None));
    }
    assert!(p.runtime.run_until_idle().is_empty());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    bridge
        .init(move |data: Option<Value>, _r: GuestResponder| {
            s.borrow_mut().push(data.unwrap());
            Ok(())
        })
        .unwrap();
    assert!(seen.borrow().is_empty(), "replay must be deferred");

    assert!(p.runtime.run_until_idle().is_empty());
    assert_eq!(*seen.borrow(), vec![json!(0), json!(1), json!(2)]);
}

#[test]
fn dispatch_waits_for_next_turn() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    bridge
        .init(move |_: Option<Value>, _: GuestResponder| {
            *h.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

    push(&bridge, &Envelope::call(None, Some(json!("x")), None));
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(p.runtime.tasks().len(), 1);
    p.runtime.run_until_idle();
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn handler_reply_lands_in_outbound_queue() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge.init(ignore).unwrap();
    bridge.register_handler("greet", |data: Option<Value>, r: GuestResponder| {
        assert_eq!(data, Some(json!({"name": "A"})));
        r.respond(json!({"reply": "hi"}));
        Ok(())
    });

    push(
        &bridge,
        &Envelope::call(Some("greet".into()), Some(json!({"name": "A"})), Some("cb_1".into())),
    );
    p.runtime.run_until_idle();

    assert_eq!(
        p.signals.borrow().as_slice(),
        ["wvjbscheme://__WVJB_QUEUE_MESSAGE__"]
    );
    assert_eq!(drain(&bridge), vec![Envelope::response("cb_1", json!({"reply": "hi"}))]);
    assert_eq!(bridge.fetch_queue().unwrap(), "[]");
}

#[test]
fn finish_sends_empty_string() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge
        .init(|_: Option<Value>, r: GuestResponder| {
            r.finish();
            Ok(())
        })
        .unwrap();
    push(&bridge, &Envelope::call(None, None, Some("cb_4".into())));
    p.runtime.run_until_idle();
    assert_eq!(drain(&bridge), vec![Envelope::response("cb_4", json!(""))]);
}

#[test]
fn responder_without_callback_id_sends_nothing() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge
        .init(|_: Option<Value>, r: GuestResponder| {
            assert!(!r.expects_reply());
            r.respond(json!("ignored"));
            Ok(())
        })
        .unwrap();
    push(&bridge, &Envelope::call(None, Some(json!("ping")), None));
    assert!(p.runtime.run_until_idle().is_empty());
    assert_eq!(bridge.pending_outbound(), 0);
    assert!(p.signals.borrow().is_empty());
}

#[test]
fn host_reply_resolves_guest_callback() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge.init(ignore).unwrap();

    let got = Rc::new(RefCell::new(None));
    let g = Rc::clone(&got);
    bridge.call_handler_with_response("testHostCallback", Some(json!({"foo": "bar"})), move |v| {
        *g.borrow_mut() = Some(v);
    });
    let sent = drain(&bridge);
    assert_eq!(sent.len(), 1);
    let id = sent[0].callback_id.clone().unwrap();
    assert_eq!(id, "cb_1");
    assert_eq!(bridge.pending_callbacks(), 1);

    push(&bridge, &Envelope::response(id.clone(), json!("done")));
    push(&bridge, &Envelope::response(id, json!("late duplicate")));
    assert!(p.runtime.run_until_idle().is_empty());
    assert_eq!(*got.borrow(), Some(json!("done")));
    assert_eq!(bridge.pending_callbacks(), 0);
}

#[test]
fn faults_do_not_stop_the_queue() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    bridge
        .init(move |data: Option<Value>, _: GuestResponder| {
            s.borrow_mut().push(data);
            Ok(())
        })
        .unwrap();
    bridge.register_handler(
        "explode",
        |_: Option<Value>, _: GuestResponder| -> wvbridge_core::Result<()> {
            panic!("guest handler exploded")
        },
    );

    push(&bridge, &Envelope::call(Some("missing".into()), None, None));
    push(&bridge, &Envelope::call(Some("explode".into()), None, None));
    bridge.handle_message_from_native("{not json".into());
    push(&bridge, &Envelope::call(None, Some(json!("after")), None));

    let faults: Vec<&str> = p
        .runtime
        .run_until_idle()
        .iter()
        .map(|e| e.code().as_str())
        .collect();
    assert_eq!(faults, ["NO_HANDLER_FOR_CALL", "HANDLER_THREW", "MALFORMED_ENVELOPE"]);
    assert_eq!(*seen.borrow(), vec![Some(json!("after"))]);
}

#[test]
fn send_without_callback_has_no_id() {
    let p = page();
    let bridge = p.runtime.install_bridge();
    bridge.send(Some(json!("ping")));
    bridge.call_handler("log", None);
    assert_eq!(
        drain(&bridge),
        vec![
            Envelope::call(None, Some(json!("ping")), None),
            Envelope::call(Some("log".into()), None, None),
        ]
    );
    assert_eq!(p.signals.borrow().len(), 2);
}
