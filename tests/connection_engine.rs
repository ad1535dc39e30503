//! Engine tests against a loopback TCP "gateway".

mod common;

use common::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use velbus_lib::Velbus;

#[tokio::test]
async fn connect_send_and_stop_over_tcp() {
    common::init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = socket.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    });

    let mut velbus = Velbus::new(&format!("127.0.0.1:{port}"))
        .with_cache_dir(common::test_cache_dir());
    velbus.connect(false).await.expect("connect should succeed");

    let frame = Message::SwitchRelayOn(SwitchRelayOn::new(vec![1])).to_raw(0x07);
    velbus.send(frame.clone());

    let received = server.await.unwrap();
    assert_eq!(received, frame.to_bytes().to_vec());

    velbus.stop().await;
}

#[tokio::test]
async fn auth_token_is_written_before_any_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut token = [0u8; 6];
        socket.read_exact(&mut token).await.unwrap();
        token
    });

    let mut velbus = Velbus::new(&format!("tcp://secret@127.0.0.1:{port}"))
        .with_cache_dir(common::test_cache_dir());
    velbus.connect(false).await.unwrap();
    velbus.sync_clock();

    let token = server.await.unwrap();
    assert_eq!(&token, b"secret");
    velbus.stop().await;
}

#[tokio::test]
async fn module_type_reply_creates_the_module_and_starts_its_load() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Unsolicited ModuleType reply: a VMB4RYNO at address 0x53.
        let reply = Message::ModuleType(ModuleType {
            module_type: 0x11,
            serial: 0x0102,
            memory_map_version: 1,
            build_year: 23,
            build_week: 41,
        })
        .to_raw(0x53);
        socket.write_all(&reply.to_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        // The module load starts with a status request for all channels.
        let mut buf = vec![0u8; 32];
        let n = socket.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    });

    let cache_dir = common::test_cache_dir().join("engine-load");
    let _ = std::fs::remove_dir_all(&cache_dir);
    let mut velbus = Velbus::new(&format!("127.0.0.1:{port}")).with_cache_dir(cache_dir);
    velbus.connect(false).await.unwrap();

    let first_request = server.await.unwrap();
    assert_eq!(&first_request[4..6], &[0xFA, 0xFF]);

    let module = velbus
        .get_module(0x53)
        .await
        .expect("module should have been created");
    {
        let module = module.lock().await;
        assert_eq!(module.get_type(), 0x11);
        assert_eq!(module.get_type_name(), "VMB4RYNO");
        assert_eq!(module.serial, 0x0102);
        assert_eq!(module.get_channels().len(), 5);
    }

    velbus.stop().await;
}

#[tokio::test]
async fn connect_to_a_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut velbus = Velbus::new(&format!("127.0.0.1:{port}"));
    let err = velbus.connect(false).await.unwrap_err();
    assert!(matches!(err, velbus_lib::VelbusError::ConnectionFailed(_)));
}
