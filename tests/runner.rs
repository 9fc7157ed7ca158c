use std::io;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use wristd::core::{BdAddr, ConnectionState, NotificationKind};
use wristd::daemon::{spawn_watch, Registry, WatchConfig, WatchHandle, WatchStatus};
use wristd::network::Connector;
use wristd::protocol::{Message, MessageType, WatchCodec};
use wristd::server::BasicNotification;

/// Connects once to an in-memory accessory
struct Loopback(Mutex<Option<DuplexStream>>);

impl Connector for Loopback {
    type Stream = DuplexStream;

    fn connect(&self, _address: BdAddr) -> BoxFuture<'static, io::Result<DuplexStream>> {
        let stream = self.0.lock().unwrap().take();
        Box::pin(async move {
            stream.ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        })
    }
}

type Peer = Framed<DuplexStream, WatchCodec>;

/// Reads frames until one of type `wanted` arrives
async fn receive_until(peer: &mut Peer, wanted: MessageType) -> Vec<MessageType> {
    let mut seen = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), peer.next())
            .await
            .expect("no frame from host")
            .expect("link closed")
            .expect("corrupt frame");
        let msg_type = message.message_type().expect("unknown message type");
        seen.push(msg_type);
        if msg_type == wanted {
            return seen;
        }
    }
}

/// Polls the watch until `check` holds
async fn wait_for(handle: &WatchHandle, check: impl Fn(&WatchStatus) -> bool) -> WatchStatus {
    for _ in 0..50 {
        let status = handle.status().await.unwrap();
        if check(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("watch never reached the expected state");
}

fn press(physical: u8) -> Message {
    Message::new(MessageType::ButtonEvent, 0, vec![physical]).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_watch_end_to_end() {
    let (ours, theirs) = tokio::io::duplex(1 << 16);
    let mut peer = Framed::new(theirs, WatchCodec::new());

    let mut config = WatchConfig::new("loopback", "00:11:22:33:44:55");
    config.next_watchlet_button = Some("C".into());
    config.watchlets = vec!["clock".into()];
    let handle = spawn_watch(
        Loopback(Mutex::new(Some(ours))),
        config.session_config(),
        &config,
        Duration::from_secs(300),
        &Registry::with_builtins(),
    )
    .unwrap();

    // Handshake, with the bound button grabbed, then the clock
    let handshake = receive_until(&mut peer, MessageType::SetRealTimeClock).await;
    assert_eq!(handshake[0], MessageType::GetDeviceType);
    assert!(handshake.contains(&MessageType::EnableButton));
    let status = wait_for(&handle, |s| s.session.state == ConnectionState::Connected).await;
    assert_eq!(status.current_watchlet, None);

    // Button C with nothing pending cycles to the first watchlet
    peer.send(press(2)).await.unwrap();
    let status = wait_for(&handle, |s| s.current_watchlet.is_some()).await;
    assert_eq!(status.current_watchlet.as_deref(), Some("clock"));
    assert!(status.watchlet_active);

    // A fresh notification takes the screen from the watchlet
    let notification = BasicNotification::new(
        handle.notifications(),
        NotificationKind::Sms,
        Utc::now(),
        "Alice",
        "lunch?",
    );
    notification.post();
    let status = wait_for(&handle, |s| s.pending == 1).await;
    assert!(!status.watchlet_active);

    // Button C now skips the notification and the watchlet comes back
    peer.send(press(2)).await.unwrap();
    let status = wait_for(&handle, |s| s.pending == 0).await;
    assert_eq!(status.current_watchlet.as_deref(), Some("clock"));
    assert!(status.watchlet_active);
    assert_eq!(status.dropped_frames, 0);

    handle.shutdown().await;
    // The host closed its end; only already-written frames remain
    loop {
        match tokio::time::timeout(Duration::from_secs(10), peer.next()).await {
            Ok(Some(Ok(_))) => continue,
            Ok(None) => break,
            other => panic!("unexpected read after shutdown: {:?}", other.map(|r| r.map(|m| m.is_ok()))),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unbound_button_is_ignored() {
    let (ours, theirs) = tokio::io::duplex(1 << 16);
    let mut peer = Framed::new(theirs, WatchCodec::new());

    let mut config = WatchConfig::new("loopback", "00:11:22:33:44:56");
    config.watchlets = vec!["clock".into()];
    let handle = spawn_watch(
        Loopback(Mutex::new(Some(ours))),
        config.session_config(),
        &config,
        Duration::from_secs(300),
        &Registry::with_builtins(),
    )
    .unwrap();

    let handshake = receive_until(&mut peer, MessageType::SetRealTimeClock).await;
    assert!(!handshake.contains(&MessageType::EnableButton));

    peer.send(press(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.current_watchlet, None);

    handle.run_watchlet("clock").await.unwrap();
    let status = handle.status().await.unwrap();
    assert_eq!(status.current_watchlet.as_deref(), Some("clock"));

    handle.shutdown().await;
}
