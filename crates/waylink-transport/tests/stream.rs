//! Integration tests for the stream transport.
//!
//! These use `tokio::io::duplex`, an in-memory pipe, as the "socket": one
//! end is wrapped in a [`StreamConnection`], the test drives the other end
//! directly.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use waylink_transport::{Connection, StreamConnection};

#[tokio::test]
async fn test_stream_send_and_recv() {
    let (client, mut server) = tokio::io::duplex(1024);
    let conn = StreamConnection::new(client);

    conn.send(b"hello from client").await.expect("send should succeed");
    let mut buf = [0u8; 17];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello from client");

    server.write_all(b"hello from server").await.unwrap();
    let chunk = conn.recv().await.unwrap().expect("should get data");
    assert_eq!(chunk, b"hello from server");
}

#[tokio::test]
async fn test_stream_recv_returns_none_on_eof() {
    let (client, server) = tokio::io::duplex(64);
    let conn = StreamConnection::new(client);
    drop(server);

    assert!(conn.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_stream_send_waits_for_backpressure() {
    // An 8-byte pipe can't take a 32-byte write in one go; the send has to
    // wait while the other side drains it.
    let (client, mut server) = tokio::io::duplex(8);
    let conn = StreamConnection::new(client);

    let reader = tokio::spawn(async move {
        let mut buf = vec![0u8; 32];
        server.read_exact(&mut buf).await.unwrap();
        buf
    });
    conn.send(&[7u8; 32]).await.unwrap();
    assert_eq!(reader.await.unwrap(), vec![7u8; 32]);
}

#[tokio::test]
async fn test_stream_concurrent_sends_do_not_interleave() {
    let (client, mut server) = tokio::io::duplex(16);
    let conn = std::sync::Arc::new(StreamConnection::new(client));

    let a = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.send(&[1u8; 64]).await })
    };
    let b = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.send(&[2u8; 64]).await })
    };

    let mut buf = vec![0u8; 128];
    server.read_exact(&mut buf).await.unwrap();
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Whichever went first, each 64-byte run is uniform.
    assert!(buf[..64].iter().all(|b| *b == buf[0]));
    assert!(buf[64..].iter().all(|b| *b == buf[64]));
    assert_ne!(buf[0], buf[64]);
}

#[tokio::test]
async fn test_stream_close_signals_eof_to_peer() {
    let (client, mut server) = tokio::io::duplex(64);
    let conn = StreamConnection::new(client);
    conn.close().await.unwrap();

    let mut buf = Vec::new();
    let n = server.read_to_end(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_transport_connect_missing_socket_fails() {
    use waylink_transport::{Transport, TransportError, UnixTransport};

    let transport = UnixTransport::new("/nonexistent/waylink-test.sock");
    let err = transport.connect().await.err().expect("should fail");
    assert!(matches!(err, TransportError::ConnectFailed { .. }));
}
