//! Deployment registry and module fan-out.

use serde_json::json;

use crate::helpers::TestCluster;

#[tokio::test]
async fn deployment_lifecycle() {
    let tc = TestCluster::start("c1").await;
    let id = tc
        .cluster
        .deploy_module("mod", json!({}), 1)
        .await
        .unwrap();
    assert!(tc.cluster.is_deployed(&id).await.unwrap());
    tc.cluster.undeploy_module(id.clone()).await.unwrap();
    assert!(!tc.cluster.is_deployed(&id).await.unwrap());
    tc.shutdown().await;
}

#[tokio::test]
async fn failed_undeploy_still_drops_the_record() {
    let tc = TestCluster::start("c1").await;
    let id = tc
        .cluster
        .deploy_verticle("app.js", json!({"port": 8080}), 2)
        .await
        .unwrap();
    // wrong kind: the runtime refuses, the record is already gone
    assert!(tc.cluster.undeploy_module(id.clone()).await.is_err());
    assert!(!tc.cluster.is_deployed(&id).await.unwrap());
    tc.shutdown().await;
}

#[tokio::test]
async fn group_scoped_deploys() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("web", &["n1"]).await;
    let web = tc.cluster.group("web").await.unwrap();

    let id = web
        .deploy_verticle("server.js", json!({}), 4)
        .await
        .unwrap();
    assert!(tc.cluster.is_deployed(&id).await.unwrap());
    assert_eq!(tc.runtime.deployment(&id).unwrap().instances, 4);

    let err = tc
        .cluster
        .deploy_module_to("ghost", "m", json!({}), 1)
        .await
        .unwrap_err();
    assert_eq!(err.remote_message(), Some("Invalid group."));
    tc.shutdown().await;
}

#[tokio::test]
async fn install_reaches_every_member() {
    let mut tc = TestCluster::start("c1").await;
    tc.serve_all("g1", &["n1", "n2", "n3"]).await;
    let g1 = tc.cluster.group("g1").await.unwrap();

    g1.install_module("acme~cache~1.0").await.unwrap();
    assert!(tc.runtime.is_installed("acme~cache~1.0"));
    g1.uninstall_module("acme~cache~1.0").await.unwrap();
    assert!(!tc.runtime.is_installed("acme~cache~1.0"));

    for node in g1.get_nodes().await.unwrap() {
        node.ping().await.unwrap();
    }
    tc.shutdown().await;
}
