//! End-to-end chat through a real relay over loopback TCP.

#![cfg(all(feature = "client", feature = "server"))]

use std::time::Duration;

use relaychat::client::{IncomingMessage, PeerSession, SessionConfig, SessionError};
use relaychat::server::{Relay, RelayConfigBuilder};
use relaychat::transport::{SenderTag, Shutdown};

async fn relay() -> Relay {
    let config = RelayConfigBuilder::new()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .idle_delay(Duration::from_millis(5))
        .poll_timeout(Duration::from_millis(20))
        .build()
        .unwrap();
    Relay::bind(config).await.unwrap()
}

async fn join(relay: &Relay, key: &str, tag: &[u8; 2]) -> PeerSession {
    let addr = relay.local_addr().unwrap().to_string();
    let config = SessionConfig::new(&addr, key).unwrap();
    PeerSession::connect(config, SenderTag::from_bytes(*tag))
        .await
        .unwrap()
}

async fn step_until(relay: &mut Relay, mut done: impl FnMut(&Relay) -> bool) {
    for _ in 0..300 {
        if done(relay) {
            return;
        }
        relay.step().await;
    }
    panic!("relay stuck; stats {:?}", relay.stats());
}

/// Step the relay while collecting at least `n` messages for `session`.
async fn receive(relay: &mut Relay, session: &mut PeerSession, n: usize) -> Vec<IncomingMessage> {
    let mut received = Vec::new();
    for _ in 0..300 {
        if received.len() >= n {
            break;
        }
        relay.step().await;
        received.extend(session.poll_incoming().unwrap());
    }
    received
}

#[tokio::test]
async fn test_three_peers_broadcast_excludes_sender() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "pw", b"Al").await;
    let mut bob = join(&relay, "pw", b"Bo").await;
    let mut carol = join(&relay, "pw", b"Ca").await;
    step_until(&mut relay, |r| r.peer_count() == 3).await;

    alice.send(b"hello everyone").await.unwrap();
    step_until(&mut relay, |r| r.stats().frames_forwarded == 1).await;

    let at_bob = receive(&mut relay, &mut bob, 1).await;
    let at_carol = receive(&mut relay, &mut carol, 1).await;
    assert_eq!(at_bob.len(), 1);
    assert_eq!(at_bob[0].to_string(), "[Al] hello everyone");
    assert_eq!(at_bob[0].nonce, 1);
    assert_eq!(at_carol, at_bob);

    // Nothing is echoed back to the sender
    for _ in 0..5 {
        relay.step().await;
    }
    assert!(alice.poll_incoming().unwrap().is_empty());
}

#[tokio::test]
async fn test_messages_keep_order_and_nonces() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "pw", b"Al").await;
    let mut bob = join(&relay, "pw", b"Bo").await;
    step_until(&mut relay, |r| r.peer_count() == 2).await;

    for text in ["one", "two", "three"] {
        alice.send(text.as_bytes()).await.unwrap();
    }

    let received = receive(&mut relay, &mut bob, 3).await;
    let texts: Vec<_> = received.iter().map(|m| m.text_lossy().into_owned()).collect();
    let nonces: Vec<_> = received.iter().map(|m| m.nonce).collect();
    assert_eq!(texts, ["one", "two", "three"]);
    assert_eq!(nonces, [1, 2, 3]);
}

#[tokio::test]
async fn test_oversized_message_arrives_truncated() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "pw", b"Al").await;
    let mut bob = join(&relay, "pw", b"Bo").await;
    step_until(&mut relay, |r| r.peer_count() == 2).await;

    let long = vec![b'x'; 70_000];
    let (header, ()) = tokio::join!(alice.send(&long), async {
        step_until(&mut relay, |r| r.stats().frames_forwarded == 1).await;
    });
    assert_eq!(header.unwrap().length, 65_535);

    let received = receive(&mut relay, &mut bob, 1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text.len(), 65_535);
    assert!(received[0].text.iter().all(|&b| b == b'x'));
}

#[tokio::test]
async fn test_disconnected_peer_is_dropped() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "pw", b"Al").await;
    let mut bob = join(&relay, "pw", b"Bo").await;
    let carol = join(&relay, "pw", b"Ca").await;
    step_until(&mut relay, |r| r.peer_count() == 3).await;

    drop(carol);
    step_until(&mut relay, |r| r.stats().disconnected == 1).await;
    assert_eq!(relay.peer_count(), 2);

    alice.send(b"carol left").await.unwrap();
    let received = receive(&mut relay, &mut bob, 1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, b"carol left");
}

#[tokio::test]
async fn test_relay_forwards_without_key() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "right", b"Al").await;
    let mut eve = join(&relay, "wrong", b"Ev").await;
    step_until(&mut relay, |r| r.peer_count() == 2).await;

    alice.send(b"meet at noon").await.unwrap();
    let received = receive(&mut relay, &mut eve, 1).await;

    // Delivered, but unreadable with another passphrase
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender, SenderTag::from_bytes(*b"Al"));
    assert_ne!(received[0].text, b"meet at noon");
}

#[tokio::test]
async fn test_session_sees_relay_shutdown() {
    let mut relay = relay().await;
    let mut alice = join(&relay, "pw", b"Al").await;
    step_until(&mut relay, |r| r.peer_count() == 1).await;

    drop(relay);

    let mut closed = false;
    for _ in 0..100 {
        match alice.poll_incoming() {
            Ok(batch) => assert!(batch.is_empty()),
            Err(SessionError::Closed) => {
                closed = true;
                break;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_relay_with_shutdown() {
    let relay = relay().await;
    let addr = relay.local_addr().unwrap().to_string();
    let shutdown = Shutdown::new();
    let relay_task = tokio::spawn(relay.run(shutdown.signal()));

    let connect = |tag: &'static [u8; 2]| {
        let config = SessionConfig::new(&addr, "pw").unwrap();
        PeerSession::connect(config, SenderTag::from_bytes(*tag))
    };
    let mut alice = connect(b"Al").await.unwrap();
    let mut bob = connect(b"Bo").await.unwrap();

    // Give the relay a few passes to accept both peers
    tokio::time::sleep(Duration::from_millis(300)).await;

    alice.send(b"over the running relay").await.unwrap();

    let mut received = Vec::new();
    for _ in 0..200 {
        received.extend(bob.poll_incoming().unwrap());
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].to_string(), "[Al] over the running relay");

    shutdown.trigger();
    let stats = tokio::time::timeout(Duration::from_secs(2), relay_task)
        .await
        .expect("relay stops after shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.frames_forwarded, 1);
}
