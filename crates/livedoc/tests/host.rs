mod common;

use std::rc::Rc;

use common::*;
use livedoc::{SessionContext, WidgetHost};
use livedoc_rpc::CallError;
use serde_json::json;

#[tokio::test]
async fn replacement_tears_down_and_restarts_from_latest_state() {
    let mut host = WidgetHost::new(SessionContext::default(), json!({"panelId": "p0"}));
    let first = Rc::new(FakeTransport::default());
    let old = host.attach(first.clone()).await;
    assert_eq!(first.requests()[0].2, json!([{"panelId": "p0"}]));

    let delivered = handles(1);
    old.receive(patched_with(json!([{"op": "add", "path": "/t", "value": {"__obid": 0}}]), &delivered))
        .await;
    old.receive(patched_with_state(json!([{"op": "add", "path": "/n", "value": 1}]), r#"{"panelId":"p1"}"#))
        .await;
    assert_eq!(host.latest_state(), json!({"panelId": "p1"}));

    let stale = old.set_state(json!({"panelId": "stale"}));

    let second = Rc::new(FakeTransport::default());
    let new = host.attach(second.clone()).await;

    assert_eq!(stale.await, Err(CallError::Rejected("widget changed".into())));
    assert!(old.is_torn_down());
    assert_eq!(first.closed.get(), 1);
    assert_eq!(delivered[0].closes.get(), 1);

    // Externally supplied state wins over the torn-down session's own.
    assert_eq!(second.requests()[0].2, json!([{"panelId": "p1"}]));
    assert!(new.snapshot().is_loading());
    assert!(new.tables().objects.is_empty());
    assert_eq!(new.tables().next_object_id(), 0);
}

#[tokio::test]
async fn host_state_is_forwarded_to_the_live_session() {
    let mut host = WidgetHost::new(SessionContext::default(), json!(null));
    assert!(host.set_state(json!({"a": 1})).is_none());

    let transport = Rc::new(FakeTransport::default());
    host.attach(transport.clone()).await;
    assert_eq!(transport.requests()[0].2, json!([{"a": 1}]));

    let _pending = host.set_state(json!({"a": 2})).unwrap();
    assert_eq!(transport.requests()[1].2, json!([{"a": 2}]));
    assert_eq!(host.session().map(|s| s.latest_state()), Some(json!({"a": 2})));

    host.close();
    assert!(host.session().is_none());
    assert_eq!(transport.closed.get(), 1);
}

#[tokio::test]
async fn host_observer_still_sees_data_changes() {
    let recorder = Rc::new(Recorder::default());
    let mut host = WidgetHost::new(SessionContext::default().with_observer(recorder.clone()), json!({}));
    let session = host.attach(Rc::new(FakeTransport::default())).await;
    session
        .receive(patched_with_state(json!([{"op": "add", "path": "/x", "value": 1}]), r#"{"k":"v"}"#))
        .await;
    assert_eq!(*recorder.data.borrow(), vec![json!({"k": "v"})]);
    assert_eq!(host.latest_state(), json!({"k": "v"}));
}
