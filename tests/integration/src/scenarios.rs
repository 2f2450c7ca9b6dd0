//! Cluster-level routing and membership scenarios.

use std::collections::HashSet;

use herd_cluster::{ClientConfig, Cluster, Node};

use crate::helpers::TestCluster;

#[tokio::test]
async fn group_selection_survives_new_groups() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1", "n2", "n3"]).await;

    let first = tc.cluster.select_group("user42").await.unwrap();
    assert_eq!(first.address(), "c1.g1");

    tc.join_all("g2", &["n4"]).await;
    let again = tc.cluster.select_group("user42").await.unwrap();
    assert_eq!(again, first);

    tc.shutdown().await;
}

#[tokio::test]
async fn node_selection_is_sticky() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1", "n2", "n3"]).await;
    let g1 = tc.cluster.group("g1").await.unwrap();

    for key in ["a", "b", "c", "d"] {
        let first = g1.select_node(key).await.unwrap();
        for _ in 0..5 {
            assert_eq!(g1.select_node(key).await.unwrap(), first);
        }
    }
    tc.shutdown().await;
}

#[tokio::test]
async fn keys_spread_over_members() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1", "n2", "n3"]).await;
    let g1 = tc.cluster.group("g1").await.unwrap();

    let mut picked = HashSet::new();
    for key in 0..200 {
        picked.insert(g1.select_node(&key).await.unwrap());
    }
    // 200 uniform picks over 3 members miss one with negligible probability
    assert_eq!(picked.len(), 3);
    tc.shutdown().await;
}

#[tokio::test]
async fn leave_removes_node_everywhere() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1", "n2"]).await;
    tc.join_all("g2", &["n1", "n3"]).await;

    tc.listener.node_left("n1");

    let err = tc.cluster.get_node("n1").await.unwrap_err();
    assert_eq!(err.remote_message(), Some("Invalid node."));
    for (group, expected) in [("g1", "c1.g1.n2"), ("g2", "c1.g2.n3")] {
        let nodes = tc.cluster.group(group).await.unwrap().get_nodes().await.unwrap();
        let addresses: Vec<&str> = nodes.iter().map(Node::address).collect();
        assert_eq!(addresses, [expected]);
    }
    tc.shutdown().await;
}

#[tokio::test]
async fn cached_target_outlives_its_node() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1"]).await;
    let g1 = tc.cluster.group("g1").await.unwrap();
    let picked = g1.select_node("k").await.unwrap();

    tc.listener.node_left("n1");
    // the selector cache is never invalidated
    assert_eq!(g1.select_node("k").await.unwrap(), picked);
    // a fresh key has no candidates left
    let err = g1.select_node("fresh").await.unwrap_err();
    assert_eq!(err.remote_message(), Some("No nodes to select."));
    tc.shutdown().await;
}

#[tokio::test]
async fn clusters_are_isolated_on_one_bus() {
    let tc = TestCluster::start("c1").await;
    let other = Cluster::start(
        ClientConfig::new("c2"),
        tc.bus.clone(),
        &tc.listener,
        tc.runtime.clone(),
    )
    .await
    .unwrap();
    assert!(other.owns_coordinator());

    tc.cluster
        .get_map::<String, i32>("m")
        .put(&"k".into(), &1)
        .await
        .unwrap();
    let theirs = other.get_map::<String, i32>("m");
    assert_eq!(theirs.get(&"k".into()).await.unwrap(), None);

    other.stop().await;
    tc.shutdown().await;
}
