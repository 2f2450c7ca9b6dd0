//! Raw envelopes against a running coordinator.

use herd_protocol::{DataKind, Envelope, Status};
use serde_json::json;

use crate::helpers::TestCluster;

#[tokio::test]
async fn validation_rejects_before_mutation() {
    let tc = TestCluster::start("c1").await;

    let reply = tc.raw(Envelope::new("put").kind("map").key(json!("k")).value(json!(1))).await;
    assert_eq!(reply.message.as_deref(), Some("No name specified."));

    let reply = tc
        .raw(Envelope::data(DataKind::MultiMap, "put", "mm").value(json!(1)))
        .await;
    assert_eq!(reply.message.as_deref(), Some("No key specified."));

    let reply = tc.raw(Envelope::data(DataKind::MultiMap, "size", "mm")).await;
    assert_eq!(reply.result, Some(json!(0)));
    tc.shutdown().await;
}

#[tokio::test]
async fn unknown_verbs_and_types() {
    let tc = TestCluster::start("c1").await;

    let reply = tc.raw(Envelope::new("frobnicate").name("x")).await;
    assert_eq!(reply.message.as_deref(), Some("No data type specified."));

    let reply = tc.raw(Envelope::data(DataKind::Set, "poll", "s")).await;
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.message.as_deref(), Some("Invalid action poll"));

    let reply = tc.raw(Envelope::new("get").kind("tree").name("t")).await;
    assert_eq!(reply.message.as_deref(), Some("Invalid data type tree."));
    tc.shutdown().await;
}

#[tokio::test]
async fn reply_shapes() {
    let tc = TestCluster::start("c1").await;

    let reply = tc.raw(Envelope::new("ping")).await;
    assert_eq!(reply.status, Status::Pong);
    assert_eq!(reply.result, Some(json!("cluster")));

    let reply = tc
        .raw(Envelope::new("deploy").kind("module").module("m"))
        .await;
    assert_eq!(reply.status, Status::Ok);
    assert!(reply.id.is_some());
    assert!(reply.result.is_none());

    let reply = tc
        .raw(Envelope::data(DataKind::Map, "clear", "m"))
        .await;
    assert_eq!(reply, herd_protocol::Reply::ok());
    tc.shutdown().await;
}

#[tokio::test]
async fn null_value_is_not_a_missing_value() {
    let tc = TestCluster::start("c1").await;

    for v in [1, 2] {
        tc.raw(Envelope::data(DataKind::MultiMap, "put", "m").key(json!("k")).value(json!(v)))
            .await;
        tc.raw(Envelope::data(DataKind::Queue, "add", "q").value(json!(v)))
            .await;
    }

    let reply = tc
        .raw(
            Envelope::data(DataKind::MultiMap, "remove", "m")
                .key(json!("k"))
                .value(json!(null)),
        )
        .await;
    assert_eq!(reply.result, Some(json!(false)));
    let reply = tc.raw(Envelope::data(DataKind::MultiMap, "size", "m")).await;
    assert_eq!(reply.result, Some(json!(2)));

    let reply = tc
        .raw(Envelope::data(DataKind::Queue, "remove", "q").value(json!(null)))
        .await;
    assert_eq!(reply.result, Some(json!(false)));
    let reply = tc.raw(Envelope::data(DataKind::Queue, "peek", "q")).await;
    assert_eq!(reply.result, Some(json!(1)));
    tc.shutdown().await;
}
