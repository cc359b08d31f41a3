//! Peer selection over real links.

use std::collections::{HashMap, HashSet};

use nodelink_pool::PoolError;

use crate::{dead_endpoint, tcp_pool, test_config, FakeNode, NodeMode};

#[tokio::test]
async fn highest_peers_win() -> anyhow::Result<()> {
    let a = FakeNode::start(NodeMode::Echo).await?;
    let b = FakeNode::start(NodeMode::Echo).await?;
    let c = FakeNode::start(NodeMode::Echo).await?;
    let dead = dead_endpoint().await?;

    let pool = tcp_pool(&test_config(vec![
        a.endpoint(),
        b.endpoint(),
        c.endpoint(),
        dead.clone(),
    ]))?;
    pool.connect_all().await?;

    let heights: HashMap<String, u64> = [
        (a.endpoint(), 5),
        (b.endpoint(), 9),
        (c.endpoint(), 9),
        // Not connected, must not be picked or shadow the others.
        (dead, 100),
    ]
    .into_iter()
    .collect();

    let mut seen = HashSet::new();
    for _ in 0..200 {
        let conn = pool.select(Some(&heights))?;
        assert!(conn.is_active());
        seen.insert(conn.remote_address().port);
    }
    assert_eq!(seen, HashSet::from([b.port, c.port]));
    Ok(())
}

#[tokio::test]
async fn no_heights_spreads_over_all_links() -> anyhow::Result<()> {
    let a = FakeNode::start(NodeMode::Echo).await?;
    let b = FakeNode::start(NodeMode::Echo).await?;
    let pool = tcp_pool(&test_config(vec![a.endpoint(), b.endpoint()]))?;
    pool.connect_all().await?;

    let seen: HashSet<u16> = (0..200)
        .map(|_| pool.select::<u64>(None).map(|c| c.remote_address().port))
        .collect::<Result<_, PoolError>>()?;
    assert_eq!(seen, HashSet::from([a.port, b.port]));
    Ok(())
}
