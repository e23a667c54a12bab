//! Envelope classification vectors.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use wvbridge_core::protocol::codec::decode;
use wvbridge_core::protocol::Message;

use vector_loader::load;

#[test]
fn envelope_vectors() {
    let files = [
        "call_full.json",
        "call_default.json",
        "call_empty.json",
        "response.json",
        "response_null.json",
        "bad_response_without_data.json",
        "bad_data_without_response_id.json",
        "bad_mixed_shape.json",
        "bad_unknown_field.json",
        "bad_json.json",
        "bad_handler_name_type.json",
    ];

    for f in files {
        let v = load(f);
        let res = decode(&v.wire).and_then(|env| env.into_message());

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let msg = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");

        match (ex["kind"].as_str().unwrap(), msg) {
            ("call", Message::Call(call)) => {
                let name = &v.description;
                let handler = ex["handlerName"].as_str();
                assert_eq!(call.handler_name.as_deref(), handler, "vector={name}");
                assert_eq!(call.callback_id.as_deref(), ex["callbackId"].as_str(), "vector={name}");
                assert_eq!(call.data.as_ref(), ex.get("data"), "vector={name}");
            }
            ("response", Message::Response(resp)) => {
                let name = &v.description;
                assert_eq!(resp.response_id, ex["responseId"].as_str().unwrap(), "vector={name}");
                assert_eq!(&resp.response_data, &ex["responseData"], "vector={name}");
            }
            (kind, other) => panic!("vector={} expected {kind}, got {other:?}", v.description),
        }
    }
}
