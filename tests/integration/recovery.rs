//! Disconnect handling, reconnect and heartbeats over TCP.

use std::sync::Arc;
use std::time::Duration;

use nodelink_pool::{ConnectionHandle, HeartbeatFn};
use nodelinkd::frame;

use crate::{eventually, tcp_pool, test_config, FakeNode, NodeMode};

fn tcp_heartbeat() -> HeartbeatFn {
    Arc::new(|conn: &ConnectionHandle| conn.send(frame::encode(frame::HEARTBEAT)))
}

#[tokio::test]
async fn dropped_link_is_removed_then_restored() -> anyhow::Result<()> {
    let node = FakeNode::start(NodeMode::Echo).await?;
    let pool = tcp_pool(&test_config(vec![node.endpoint()]))?;
    pool.connect_all().await?;

    let first = pool.lookup("127.0.0.1", node.port).expect("link registered");

    // No periodic tasks yet, so the entry stays gone once removed.
    node.kick_all();
    assert!(
        eventually(Duration::from_secs(3), || pool.registry().is_empty()).await,
        "disconnect was not reported"
    );
    assert!(!first.is_active());

    let tasks = pool.start_periodic_tasks(tcp_heartbeat());
    assert!(
        eventually(Duration::from_secs(3), || {
            pool.lookup("127.0.0.1", node.port)
                .is_some_and(|c| c.is_active())
        })
        .await,
        "reconnect did not restore the link"
    );
    assert_eq!(node.accepted(), 2);

    let second = pool.lookup("127.0.0.1", node.port).expect("link restored");
    assert!(!Arc::ptr_eq(&first, &second));

    pool.shutdown(tasks).await;
    assert!(pool.registry().is_empty());
    Ok(())
}

#[tokio::test]
async fn late_node_is_picked_up_by_reconnect() -> anyhow::Result<()> {
    let up = FakeNode::start(NodeMode::Echo).await?;
    // Reserve a port, then bring the node up on it after startup.
    let late_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let late_port = late_listener.local_addr()?.port();
    drop(late_listener);

    let pool = tcp_pool(&test_config(vec![
        up.endpoint(),
        format!("127.0.0.1:{late_port}"),
    ]))?;
    assert_eq!(pool.connect_all().await?.activated, 1);

    let tasks = pool.start_periodic_tasks(tcp_heartbeat());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", late_port)).await?;
    let accept = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        // Answer the greeting and then keep echoing.
        while let Some(payload) = frame::read_frame(&mut stream).await? {
            tokio::io::AsyncWriteExt::write_all(&mut stream, &frame::encode(&payload)).await?;
        }
        anyhow::Ok(())
    });

    assert!(
        eventually(Duration::from_secs(3), || {
            pool.registry().active_entries().len() == 2
        })
        .await,
        "late node never joined"
    );

    pool.shutdown(tasks).await;
    accept.abort();
    Ok(())
}

#[tokio::test]
async fn heartbeats_reach_every_active_node() -> anyhow::Result<()> {
    let a = FakeNode::start(NodeMode::Echo).await?;
    let b = FakeNode::start(NodeMode::Echo).await?;
    let pool = tcp_pool(&test_config(vec![a.endpoint(), b.endpoint()]))?;
    pool.connect_all().await?;

    let tasks = pool.start_periodic_tasks(tcp_heartbeat());
    assert!(
        eventually(Duration::from_secs(3), || a.heartbeats() >= 3 && b.heartbeats() >= 3).await,
        "heartbeats: a={} b={}",
        a.heartbeats(),
        b.heartbeats()
    );

    pool.shutdown(tasks).await;
    let after = a.heartbeats();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(a.heartbeats(), after, "heartbeats continued after shutdown");
    Ok(())
}

#[tokio::test]
async fn idle_link_is_dropped() -> anyhow::Result<()> {
    let node = FakeNode::start(NodeMode::Echo).await?;
    let mut config = test_config(vec![node.endpoint()]);
    config.idle_timeout_ms = 300;
    let pool = tcp_pool(&config)?;
    pool.connect_all().await?;

    // Without heartbeats nothing comes back from the node.
    assert!(
        eventually(Duration::from_secs(3), || pool.registry().is_empty()).await,
        "idle link was kept"
    );
    Ok(())
}
