use std::net::SocketAddr;
use std::time::{Duration, Instant};

use meshwire_lib::peer::PeerTable;

fn addr(port: u16) -> SocketAddr {
    format!("10.0.0.1:{port}").parse().unwrap()
}

#[test]
fn entries_appear_lazily_and_count_traffic() {
    let mut table = PeerTable::new();
    let now = Instant::now();
    assert!(table.is_empty());

    table.touch_recv(addr(1), now);
    table.touch_recv(addr(1), now);
    table.touch_send(addr(1), now);
    table.touch_send(addr(2), now);

    assert_eq!(table.len(), 2);
    let first = table.get(&addr(1)).unwrap();
    assert_eq!(first.packets_received, 2);
    assert_eq!(first.packets_sent, 1);
    assert_eq!(table.get(&addr(2)).unwrap().packets_sent, 1);
}

#[test]
fn loss_pct_is_zero_without_sends() {
    let mut table = PeerTable::new();
    let now = Instant::now();
    table.touch_recv(addr(1), now);
    assert_eq!(table.get(&addr(1)).unwrap().loss_pct(), 0.0);
}

#[test]
fn loss_pct_is_a_share_of_sends() {
    let mut table = PeerTable::new();
    let now = Instant::now();
    for _ in 0..4 {
        table.touch_send(addr(1), now);
    }
    table.record_loss(addr(1));
    assert_eq!(table.get(&addr(1)).unwrap().loss_pct(), 25.0);
}

#[test]
fn rtt_is_last_write_wins() {
    let mut table = PeerTable::new();
    let now = Instant::now();
    table.touch_recv(addr(1), now);
    table.record_rtt(addr(1), 80);
    table.record_rtt(addr(1), 12);
    assert_eq!(table.get(&addr(1)).unwrap().rtt_ms, 12);

    // No entry, no effect.
    table.record_rtt(addr(9), 99);
    assert!(table.get(&addr(9)).is_none());
}

#[test]
fn expire_evicts_idle_peers_exactly_once() {
    let mut table = PeerTable::new();
    let ttl = Duration::from_secs(30);
    let now = Instant::now();
    table.touch_recv(addr(1), now);
    table.touch_recv(addr(2), now + Duration::from_secs(10));

    let later = now + Duration::from_secs(31);
    let evicted = table.expire(later, ttl);
    assert_eq!(evicted, vec![addr(1)]);
    assert!(table.get(&addr(1)).is_none());
    assert!(table.get(&addr(2)).is_some());

    // Nothing left to evict at the same instant.
    assert!(table.expire(later, ttl).is_empty());
}

#[test]
fn idle_peers_excludes_fresh_ones() {
    let mut table = PeerTable::new();
    let now = Instant::now();
    table.touch_recv(addr(1), now);
    table.touch_recv(addr(2), now + Duration::from_secs(10));

    let idle = table.idle_peers(now + Duration::from_secs(11), Duration::from_secs(5));
    assert_eq!(idle, vec![addr(1)]);
}

#[test]
fn refreshed_peer_survives_expiry() {
    let mut table = PeerTable::new();
    let ttl = Duration::from_secs(30);
    let now = Instant::now();
    table.touch_recv(addr(1), now);
    table.touch_recv(addr(1), now + Duration::from_secs(25));

    assert!(table.expire(now + Duration::from_secs(31), ttl).is_empty());
    assert!(table.get(&addr(1)).is_some());
}
