//! Client against scripted TCP devices and the built-in simulator.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use amslink_client::{
    AdsState, Client, ClientConfig, ClientError, ConnectionState, DeviceError, Endpoint,
    PlcValue, Simulator, ValueKind,
};
use amslink_frame::{
    decode_symbolic_read_request, encode_read_response, encode_read_state_response, AmsCodec,
    CommandId, Frame, ReadStateResponse,
};
use amslink_transport::TcpListener;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

type Device = Framed<TcpStream, AmsCodec>;

fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(
        Endpoint::new(
            "192.168.1.100.1.1:851".parse().unwrap(),
            "127.0.0.1",
            addr.port(),
        ),
        "192.168.1.50.1.1:32905".parse().unwrap(),
    )
    .with_request_timeout(Duration::from_secs(2))
    .with_sweep_interval(Duration::from_millis(10))
}

/// Connect a client to a fresh scripted device.
async fn scripted() -> (Arc<Client>, Device) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = Arc::new(Client::new(config_for(listener.local_addr())));
    let (connected, stream) = tokio::join!(client.connect(), listener.accept());
    connected.unwrap();
    let device = Framed::new(stream.unwrap().into_inner(), AmsCodec::default());
    (client, device)
}

async fn next_request(device: &mut Device) -> Frame {
    tokio::time::timeout(Duration::from_secs(2), device.next())
        .await
        .expect("device waited too long for a request")
        .expect("client closed the socket")
        .expect("malformed request frame")
}

#[tokio::test]
async fn read_state_returns_reported_state() {
    let (client, mut device) = scripted().await;

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_state().await }
    });

    let request = next_request(&mut device).await;
    assert_eq!(request.header.command, CommandId::ReadState);
    assert_eq!(request.header.state_flags.bits(), 0x0004);
    assert!(request.payload.is_empty());

    let state = ReadStateResponse {
        ads_state: 5,
        device_state: 0,
    };
    device
        .send(Frame::new(
            request.header.response_to(0),
            encode_read_state_response(0, state),
        ))
        .await
        .unwrap();

    let status = call.await.unwrap().unwrap();
    assert_eq!(status.ads_state, AdsState::Run);
    assert_eq!(status.ads_state.as_u16(), 5);
    assert_eq!(status.device_state, 0);
}

#[tokio::test]
async fn device_error_code_surfaces_as_symbol_not_found() {
    let (client, mut device) = scripted().await;

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_by_name("MAIN.Status").await }
    });

    let request = next_request(&mut device).await;
    assert_eq!(request.header.command, CommandId::Read);
    let name = decode_symbolic_read_request(&request.payload).unwrap();
    assert_eq!(name.as_str(), "MAIN.Status");

    device
        .send(Frame::new(request.header.response_to(1808), bytes::Bytes::new()))
        .await
        .unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Device(DeviceError::SymbolNotFound)), "{err}");
    assert_eq!(err.device_code(), Some(1808));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn result_code_in_payload_is_a_device_error_too() {
    let (client, mut device) = scripted().await;

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_by_name("MAIN.Locked").await }
    });

    let request = next_request(&mut device).await;
    device
        .send(Frame::new(
            request.header.response_to(0),
            encode_read_response(0x0704, &[]).unwrap(),
        ))
        .await
        .unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Device(DeviceError::AccessDenied)), "{err}");
}

#[tokio::test]
async fn concurrent_reads_survive_reverse_order_replies() {
    let (client, mut device) = scripted().await;

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_by_name("MAIN.Alpha").await }
    });
    let second = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_by_name("MAIN.Beta").await }
    });

    let a = next_request(&mut device).await;
    let b = next_request(&mut device).await;
    assert_ne!(a.header.invoke_id, b.header.invoke_id);

    // Answer the later request first; each reply carries the name it was for.
    for request in [b, a] {
        let name = decode_symbolic_read_request(&request.payload).unwrap();
        device
            .send(Frame::new(
                request.header.response_to(0),
                encode_read_response(0, name.as_str().as_bytes()).unwrap(),
            ))
            .await
            .unwrap();
    }

    assert_eq!(&first.await.unwrap().unwrap()[..], b"MAIN.Alpha");
    assert_eq!(&second.await.unwrap().unwrap()[..], b"MAIN.Beta");
}

#[tokio::test]
async fn peer_close_fails_outstanding_request() {
    let (client, mut device) = scripted().await;

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_by_name("MAIN.Status").await }
    });

    let _request = next_request(&mut device).await;
    drop(device);

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ConnectionLost(_)), "{err}");
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let err = client.read_state().await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[tokio::test]
async fn timeout_does_not_close_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config =
        config_for(listener.local_addr()).with_request_timeout(Duration::from_millis(100));
    let client = Arc::new(Client::new(config));
    let (connected, stream) = tokio::join!(client.connect(), listener.accept());
    connected.unwrap();
    let mut device = Framed::new(stream.unwrap().into_inner(), AmsCodec::default());

    let err = client.read_state().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(100)));
    assert_eq!(client.state(), ConnectionState::Connected);

    // Drain the unanswered request, then serve the next one normally.
    let _ignored = next_request(&mut device).await;
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.read_state().await }
    });
    let request = next_request(&mut device).await;
    device
        .send(Frame::new(
            request.header.response_to(0),
            encode_read_state_response(0, ReadStateResponse::default()),
        ))
        .await
        .unwrap();
    let status = call.await.unwrap().unwrap();
    assert_eq!(status.ads_state, AdsState::Invalid);
}

#[tokio::test]
async fn long_names_fail_locally() {
    let (client, _device) = scripted().await;
    let name = "G.".repeat(200);
    let err = client.read_by_name(&name).await.unwrap_err();
    assert!(matches!(err, ClientError::NameTooLong { len: 400, max: 255 }));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn connect_failure_is_reported() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr()
    };
    let client = Client::new(config_for(addr));
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectFailed { .. }), "{err}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn simulator_typed_read_write_roundtrip() {
    let sim = Simulator::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_symbol("MAIN.Speed", 1500i16.to_le_bytes().to_vec())
        .with_symbol("MAIN.Label", b"idle\0".to_vec())
        .with_state(AdsState::Run, 0)
        .spawn();
    let client = Client::new(config_for(sim.local_addr()));
    client.connect().await.unwrap();

    assert_eq!(
        client.read_value("MAIN.Speed", ValueKind::Int16).await.unwrap(),
        PlcValue::Int16(1500)
    );

    client
        .write_by_name("MAIN.Speed", &PlcValue::Int16(-20))
        .await
        .unwrap();
    assert_eq!(
        client.read_value("MAIN.Speed", ValueKind::Int16).await.unwrap(),
        PlcValue::Int16(-20)
    );
    assert_eq!(sim.symbols().get("MAIN.Speed").unwrap(), (-20i16).to_le_bytes());

    client
        .write_by_name("MAIN.Label", &PlcValue::from("running"))
        .await
        .unwrap();
    assert_eq!(
        client.read_value("MAIN.Label", ValueKind::Text).await.unwrap(),
        PlcValue::from("running")
    );

    sim.set_state(AdsState::Stop, 4);
    let status = client.read_state().await.unwrap();
    assert_eq!(status.ads_state, AdsState::Stop);
    assert_eq!(status.device_state, 4);

    client.disconnect().await;
    sim.shutdown().await;
}

#[tokio::test]
async fn read_many_reports_each_name() {
    let sim = Simulator::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_symbol("MAIN.A", vec![1])
        .with_symbol("MAIN.B", vec![2, 0])
        .spawn();
    let client = Client::new(config_for(sim.local_addr()));
    client.connect().await.unwrap();

    let results = client.read_many(&["MAIN.A", "MAIN.Missing", "MAIN.B"]).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "MAIN.A");
    assert_eq!(&results[0].1.as_ref().unwrap()[..], &[1]);
    assert!(matches!(
        results[1].1,
        Err(ClientError::Device(DeviceError::SymbolNotFound))
    ));
    assert_eq!(&results[2].1.as_ref().unwrap()[..], &[2, 0]);
}

#[tokio::test]
async fn reconnect_after_peer_loss() {
    let sim = Simulator::bind("127.0.0.1:0").await.unwrap().spawn();
    let client = Client::new(config_for(sim.local_addr()));
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let conn = client.connection().unwrap();
    let mut states = conn.subscribe();
    let addr = sim.local_addr();
    sim.shutdown().await;

    while *states.borrow_and_update() != ConnectionState::Disconnected {
        states.changed().await.unwrap();
    }
    assert!(matches!(
        client.read_state().await,
        Err(ClientError::NotConnected)
    ));

    // A new device on the same port; the client opens a fresh connection.
    let sim = Simulator::bind(&addr.to_string()).await.unwrap().spawn();
    client.connect().await.unwrap();
    assert_eq!(client.read_state().await.unwrap().ads_state, AdsState::Run);
    sim.shutdown().await;
}
