//! Group facades and membership notifications.

use tokio::sync::mpsc;

use crate::helpers::TestCluster;

#[tokio::test]
async fn ping_needs_an_existing_group() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n1"]).await;
    let groups = tc.cluster.groups().await.unwrap();
    assert_eq!(groups.len(), 1);
    groups[0].ping().await.unwrap();
    assert!(tc.cluster.group("g2").await.is_err());
    tc.shutdown().await;
}

#[tokio::test]
async fn handlers_see_joins_and_leaves() {
    let tc = TestCluster::start("c1").await;
    tc.join_all("g1", &["n0"]).await;
    let g1 = tc.cluster.group("g1").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let on_join = tx.clone();
    let join_id = g1
        .register_join_handler(move |node| {
            let _ = on_join.send(("join", node.address().to_owned()));
        })
        .await
        .unwrap();
    g1.register_leave_handler(move |node| {
        let _ = tx.send(("leave", node.address().to_owned()));
    })
    .await
    .unwrap();

    tc.join_all("g1", &["n1"]).await;
    assert_eq!(rx.recv().await.unwrap(), ("join", "c1.g1.n1".to_owned()));

    // joining twice is not a new member
    tc.join_all("g1", &["n1"]).await;
    tc.listener.node_left("n1");
    assert_eq!(rx.recv().await.unwrap(), ("leave", "c1.g1.n1".to_owned()));

    g1.unregister_handler(join_id).await.unwrap();
    g1.unregister_handler(join_id).await.unwrap();
    tc.shutdown().await;
}
