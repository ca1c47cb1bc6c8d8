//! The stream backend must behave exactly like the in-memory reference:
//! one call over a duplex byte stream, length-prefixed envelopes intact.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use wirelink::{CallError, RpcSession, Transport, TransportError, PROTOCOL_VERSION};

#[tokio::test]
async fn call_round_trips_over_a_byte_stream() {
    let (client, server) = Transport::stream_pair();
    let session = Arc::new(RpcSession::new(client));
    tokio::spawn(session.clone().run());

    tokio::spawn(async move {
        let frame = server.recv().await.unwrap();
        assert_eq!(frame[0], PROTOCOL_VERSION);
        let request: Value = serde_json::from_slice(&frame[1..]).unwrap();
        assert_eq!(request["method"], "sum");
        let args = request["params"].as_array().unwrap();
        let sum: i64 = args.iter().map(|v| v.as_i64().unwrap()).sum();

        let mut reply = vec![PROTOCOL_VERSION];
        reply.extend_from_slice(
            &serde_json::to_vec(&json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": sum,
            }))
            .unwrap(),
        );
        server.send(reply).await.unwrap();
    });

    let request = session.create_request("sum", json!([1, 2, 3, 4]));
    let sum: i64 = session
        .call(request, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(sum, 10);
}

#[tokio::test]
async fn corrupt_frame_fails_the_loop_and_cancels_pending_calls() {
    let (local, mut peer) = tokio::io::duplex(1024);
    let session = Arc::new(RpcSession::new(Transport::stream(local)));
    let demux = tokio::spawn(session.clone().run());

    let call = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .call::<Value>(
                    session.create_request("hang.forever", json!(null)),
                    Duration::from_secs(30),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.pending_ids().len(), 1);

    // A length prefix no legitimate envelope can carry: the transport must
    // refuse it as an I/O error rather than a clean close.
    peer.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
    peer.flush().await.unwrap();

    let err = demux.await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Io(_)), "got {err:?}");

    // The suspended caller is woken with a closed outcome, not left hanging.
    let call_err = call.await.unwrap().unwrap_err();
    assert!(
        matches!(call_err, CallError::Transport(TransportError::Closed)),
        "got {call_err:?}"
    );
    assert!(session.pending_ids().is_empty());
}

#[tokio::test]
async fn peer_hangup_closes_the_stream_transport() {
    let (client, server) = Transport::stream_pair();
    let session = Arc::new(RpcSession::new(client));
    let demux = tokio::spawn(session.clone().run());

    drop(server);

    // EOF on the read half surfaces as a clean close, not an error.
    assert!(demux.await.unwrap().is_ok());
    assert!(session.pending_ids().is_empty());
}
