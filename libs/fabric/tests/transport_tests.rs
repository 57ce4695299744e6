use courier_fabric::{
    channel::Channel,
    codec::{CompressionKind, SerializerKind},
    envelope::{Request, Response},
    error::Error,
    frame::{Frame, Header, MessageKind, MAGIC},
    transport::{
        Connection, TcpTransport, TcpTransportListener, Transport, TransportListener,
        UnixTransport, UnixTransportListener,
    },
    Value,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

fn frame(request_id: u64, body: &[u8]) -> Frame {
    Frame::new(
        Header::new(
            MessageKind::Request,
            CompressionKind::Gzip,
            SerializerKind::Bincode,
            request_id,
        ),
        body.to_vec(),
    )
}

/// Helper to get a free port
async fn get_listener() -> (TcpTransportListener, std::net::SocketAddr) {
    let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn tcp_send_receive_single_frame() {
    let (listener, addr) = get_listener().await;

    // Spawn server
    tokio::spawn(async move {
        let Connection {
            mut reader,
            mut writer,
            ..
        } = listener.accept().await.unwrap();
        let received = reader.read_frame().await.unwrap();
        writer.write_frame(&received).await.unwrap(); // Echo back
    });

    // Client
    let mut client = TcpTransport::connect(addr).await.unwrap();
    let sent = frame(1, b"hello world");
    client.send(&sent).await.unwrap();
    let response = client.receive().await.unwrap();

    assert_eq!(response, sent);
}

#[tokio::test]
async fn tcp_multiple_frames_preserve_boundaries() {
    let (listener, addr) = get_listener().await;

    // Spawn server
    tokio::spawn(async move {
        let Connection {
            mut reader,
            mut writer,
            ..
        } = listener.accept().await.unwrap();
        for _ in 0..3 {
            let received = reader.read_frame().await.unwrap();
            writer.write_frame(&received).await.unwrap();
        }
    });

    // Client sends 3 distinct frames
    let mut client = TcpTransport::connect(addr).await.unwrap();
    let frames = vec![frame(1, b"first"), frame(2, b"second"), frame(3, b"")];

    for sent in &frames {
        client.send(sent).await.unwrap();
        let response = client.receive().await.unwrap();
        assert_eq!(&response, sent);
    }
}

#[tokio::test]
async fn tcp_receive_timeout_fires() {
    let (listener, addr) = get_listener().await;

    // Spawn server that never responds
    tokio::spawn(async move {
        let _connection = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    // Client with short receive timeout
    let mut client = TcpTransport::builder()
        .address(addr)
        .receive_timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();

    client.send(&frame(1, b"hello")).await.unwrap();

    // Should timeout
    match client.receive().await {
        Err(Error::Transport(msg)) => assert!(msg.contains("timeout")),
        other => panic!("Expected timeout error, got {:?}", other),
    }
}

#[tokio::test]
async fn tcp_rejects_oversized_frame() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    // Spawn server that sends a header claiming 200MB (over the 100MB limit)
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut header = frame(1, b"").encode().unwrap();
        header[2..6].copy_from_slice(&(200u32 * 1024 * 1024).to_be_bytes());
        stream.write_all(&header).await.unwrap();
        stream.flush().await.unwrap();

        // Keep connection open
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();

    match client.receive().await {
        Err(Error::Protocol(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn tcp_rejects_bad_magic_from_the_wire() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut bytes = frame(1, b"body").encode().unwrap();
        bytes[0] = MAGIC.wrapping_add(1);
        stream.write_all(&bytes).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let mut client = TcpTransport::connect(addr).await.unwrap();
    match client.receive().await {
        Err(Error::Protocol(msg)) => assert!(msg.contains("magic")),
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn channel_request_response_roundtrip() {
    let (listener, addr) = get_listener().await;

    // Spawn server that answers with the request's method name
    tokio::spawn(async move {
        let Connection {
            mut reader,
            mut writer,
            ..
        } = listener.accept().await.unwrap();
        let frame = reader.read_frame().await.unwrap();
        let request = frame.decode_request().unwrap();
        let response = Response::success(
            request.request_id,
            frame.header.compression,
            frame.header.serializer,
            Value::String(request.method),
        );
        writer
            .write_frame(&Frame::response(&response).unwrap())
            .await
            .unwrap();
    });

    let mut channel = Channel::tcp(addr, CompressionKind::Gzip, SerializerKind::Protobuf)
        .await
        .unwrap();

    let request = Request::new(42, "svc", "Method", vec![Value::Int(1)]);
    channel.send_request(&request).await.unwrap();
    let response = channel.receive_response().await.unwrap();

    assert_eq!(response.request_id, 42);
    assert_eq!(response.serializer, SerializerKind::Protobuf);
    assert_eq!(response.data, Some(Value::String("Method".into())));
    channel.close().await.ok();
}

#[tokio::test]
async fn builder_requires_an_address() {
    match TcpTransport::builder().connect().await {
        Err(Error::Transport(msg)) => assert!(msg.contains("Address")),
        other => panic!("Expected transport error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn connection_closed_error() {
    let (listener, addr) = get_listener().await;

    // Spawn server that immediately closes
    tokio::spawn(async move {
        let Connection { mut writer, .. } = listener.accept().await.unwrap();
        writer.shutdown().await.unwrap();
    });

    // Client tries to receive from closed connection
    let mut client = TcpTransport::connect(addr).await.unwrap();

    // Give server time to close
    tokio::time::sleep(Duration::from_millis(50)).await;

    match client.receive().await {
        Err(Error::ConnectionClosed) => {}
        other => panic!("Expected ConnectionClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn transport_listener_trait_usage() {
    let (mut listener, addr) = get_listener().await;

    // Test that we can use TransportListener trait generically
    async fn read_one<L: TransportListener>(listener: &L) -> Result<Frame, Error> {
        let mut connection = listener.accept().await?;
        connection.reader.read_frame().await
    }

    // Spawn client
    tokio::spawn(async move {
        let mut client = TcpTransport::connect(addr).await.unwrap();
        client.send(&frame(5, b"test")).await.unwrap();
    });

    let received = read_one(&listener).await.unwrap();
    assert_eq!(received.body, b"test");
    assert_eq!(received.header.request_id, 5);

    // Test close
    listener.close().await.unwrap();
}

// Unix Socket Tests

#[tokio::test]
async fn unix_send_receive_single_frame() {
    let socket_path = "/tmp/courier_test_unix_single.sock";

    // Clean up if exists
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixTransportListener::bind(socket_path).await.unwrap();

    // Spawn server
    tokio::spawn(async move {
        let Connection {
            mut reader,
            mut writer,
            ..
        } = listener.accept().await.unwrap();
        let received = reader.read_frame().await.unwrap();
        writer.write_frame(&received).await.unwrap(); // Echo back
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Client
    let mut client = UnixTransport::connect(socket_path).await.unwrap();
    let sent = frame(1, b"hello unix");
    client.send(&sent).await.unwrap();
    let response = client.receive().await.unwrap();

    assert_eq!(response, sent);

    // Cleanup
    let _ = std::fs::remove_file(socket_path);
}

#[tokio::test]
async fn unix_listener_cleans_up_socket() {
    let socket_path = "/tmp/courier_test_unix_cleanup.sock";

    let _ = std::fs::remove_file(socket_path);

    {
        let mut listener = UnixTransportListener::bind(socket_path).await.unwrap();
        assert!(std::path::Path::new(socket_path).exists());

        // Explicitly close
        listener.close().await.unwrap();
    }

    // Socket should be cleaned up
    assert!(!std::path::Path::new(socket_path).exists());
}

#[tokio::test]
async fn unix_timeout_works() {
    let socket_path = "/tmp/courier_test_unix_timeout.sock";

    let _ = std::fs::remove_file(socket_path);

    let listener = UnixTransportListener::bind(socket_path).await.unwrap();

    // Spawn server that never responds
    tokio::spawn(async move {
        let _connection = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    // Client with short receive timeout
    let mut client = UnixTransport::builder()
        .path(socket_path)
        .receive_timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();

    client.send(&frame(1, b"hello")).await.unwrap();

    // Should timeout
    match client.receive().await {
        Err(Error::Transport(msg)) => assert!(msg.contains("timeout")),
        other => panic!("Expected timeout error, got {:?}", other),
    }

    let _ = std::fs::remove_file(socket_path);
}
