//! Shared collections through the cluster client.

use std::time::Duration;

use crate::helpers::TestCluster;

#[tokio::test]
async fn multimap_round_trip() {
    let tc = TestCluster::start("c1").await;
    let mm = tc.cluster.get_multimap::<String, String>("mm");
    let k = "k".to_owned();

    mm.put(&k, &"v".into()).await.unwrap();
    assert!(mm.get(&k).await.unwrap().contains(&"v".to_owned()));
    mm.remove(&k, &"v".into()).await.unwrap();
    assert!(!mm.get(&k).await.unwrap().contains(&"v".to_owned()));

    mm.put(&k, &"v1".into()).await.unwrap();
    mm.put(&k, &"v2".into()).await.unwrap();
    assert_eq!(mm.size().await.unwrap(), 2);
    tc.shutdown().await;
}

#[tokio::test]
async fn queue_fifo() {
    let tc = TestCluster::start("c1").await;
    let q = tc.cluster.get_queue::<String>("q");
    q.add(&"a".into()).await.unwrap();
    q.add(&"b".into()).await.unwrap();

    assert_eq!(q.poll().await.unwrap().as_deref(), Some("a"));
    assert_eq!(q.poll().await.unwrap().as_deref(), Some("b"));
    assert_eq!(q.poll().await.unwrap(), None);
    assert!(q.remove_head().await.is_err());
    tc.shutdown().await;
}

#[tokio::test]
async fn proxies_share_state() {
    let tc = TestCluster::start("c1").await;
    let a = tc.cluster.get_set::<u32>("s");
    let b = tc.cluster.get_set::<u32>("s");
    a.add(&1).await.unwrap();
    assert!(b.contains(&1).await.unwrap());

    let list = tc.cluster.get_list::<u32>("l");
    for v in [3, 1, 2] {
        list.add(&v).await.unwrap();
    }
    assert_eq!(list.get(0).await.unwrap(), 3);
    assert_eq!(tc.cluster.get_list::<u32>("l").size().await.unwrap(), 3);
    tc.shutdown().await;
}

#[tokio::test]
async fn fire_and_forget_mutations_are_sent() {
    let tc = TestCluster::start("c1").await;
    let counter = tc.cluster.get_counter("hits");
    for _ in 0..10 {
        drop(counter.increment());
    }
    let mut value = 0;
    for _ in 0..100 {
        value = counter.get().await.unwrap();
        if value == 10 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(value, 10);
    tc.shutdown().await;
}

#[tokio::test]
async fn key_and_id_generator() {
    let tc = TestCluster::start("c1").await;
    let leader = tc.cluster.get_key::<String>("leader");
    leader.set(&"n1".into()).await.unwrap();
    assert_eq!(leader.get().await.unwrap().as_deref(), Some("n1"));

    let ids = tc.cluster.get_id_generator("jobs");
    let first = ids.next_id().await.unwrap();
    let second = ids.next_id().await.unwrap();
    assert_eq!(second, first + 1);
    tc.shutdown().await;
}

#[tokio::test]
async fn lock_is_exclusive() {
    let tc = TestCluster::start("c1").await;
    let a = tc.cluster.get_lock("job");
    let b = tc.cluster.get_lock("job");
    a.acquire(Duration::from_millis(50)).await.unwrap();
    assert!(!b.try_acquire().await.unwrap());
    assert!(a.release().await.unwrap());
    assert!(b.try_acquire().await.unwrap());
    tc.shutdown().await;
}
