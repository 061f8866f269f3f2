//! Client stream lifecycle tests.
//!
//! These tests drive a `ClientStream` against a scripted server on the
//! in-memory bus and check the handshake, receive, half-close and
//! termination behavior end to end.

use std::time::Duration;

use busrpc::prelude::*;
use busrpc_testing::MockServer;
use busrpc_testing::async_helpers::{assert_times_out, with_default_timeout};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Echo {
    msg: String,
}

fn echo(msg: &str) -> Echo {
    Echo {
        msg: msg.to_string(),
    }
}

async fn echo_server() -> (Client<MemoryBus>, MockServer) {
    let bus = MemoryBus::new();
    let server = MockServer::bind(&bus, "nrpc.svc.Echo").await.unwrap();
    (Client::new(bus), server)
}

#[tokio::test]
async fn test_first_send_handshakes_then_publishes() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();

    stream.send(&echo("a")).await.unwrap();
    assert_eq!(server.handshakes(), 1);
    let mut call = server.next_call().await.unwrap();
    assert_eq!(call.opening_payload::<Echo>().unwrap(), echo("a"));
    assert!(call.opening().is_open());

    assert_ok!(stream.send(&echo("b")).await);
    let next = with_default_timeout(call.next_request()).await.unwrap();
    assert!(!next.is_open());
    assert!(!next.eos);
    assert_eq!(serde_json::from_slice::<Echo>(&next.data).unwrap(), echo("b"));
    assert_eq!(server.handshakes(), 1);
}

#[tokio::test]
async fn test_header_only_envelope_is_skipped() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("a")).await.unwrap();
    let call = server.next_call().await.unwrap();

    call.send_header([("k", "v")].into_iter().collect())
        .await
        .unwrap();
    call.send_data(&"result").await.unwrap();

    let got = stream.recv::<String>().await.unwrap();
    assert_eq!(got.as_deref(), Some("result"));
    assert_eq!(stream.header().get("k"), Some("v"));
    assert_eq!(stream.header().len(), 1);
}

#[tokio::test]
async fn test_clean_end_of_stream() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("a")).await.unwrap();
    let call = server.next_call().await.unwrap();

    call.send_data(&echo("a")).await.unwrap();
    call.send_eos().await.unwrap();

    assert_eq!(stream.recv::<Echo>().await.unwrap(), Some(echo("a")));
    assert_eq!(stream.recv::<Echo>().await.unwrap(), None);
    assert!(stream.is_terminal());

    // Terminal is absorbing.
    assert_eq!(stream.recv::<Echo>().await.unwrap(), None);
    let err = stream.send(&echo("late")).await.unwrap_err();
    assert!(matches!(err, RpcError::Cancelled), "{err}");
}

#[tokio::test]
async fn test_error_end_of_stream() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("a")).await.unwrap();
    let call = server.next_call().await.unwrap();

    call.send_error(&Status::not_found("no such echo"))
        .await
        .unwrap();

    let err = stream.recv::<Echo>().await.unwrap_err();
    assert_eq!(err.status(), Some(&Status::not_found("no such echo")));
    assert_eq!(err.code(), Code::NotFound);
    assert!(stream.is_terminal());

    let err = stream.recv::<Echo>().await.unwrap_err();
    assert!(matches!(err, RpcError::Cancelled), "{err}");
}

#[tokio::test]
async fn test_second_end_of_stream_is_ignored() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("a")).await.unwrap();
    let call = server.next_call().await.unwrap();

    call.send_eos().await.unwrap();
    call.send_error(&Status::internal("too late")).await.unwrap();

    assert_eq!(stream.recv::<Echo>().await.unwrap(), None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(stream.recv::<Echo>().await.unwrap(), None);
}

#[tokio::test]
async fn test_cancel_unblocks_recv() {
    let (client, _server) = echo_server().await;
    let ctx = CallContext::background();
    let stream = client.open_stream(&ctx, "/svc/Echo").await.unwrap();

    assert_times_out(Duration::from_millis(20), stream.recv::<Echo>()).await;

    let (result, ()) = with_default_timeout(async {
        tokio::join!(stream.recv::<Echo>(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.cancel();
        })
    })
    .await;
    assert!(matches!(result, Err(RpcError::Cancelled)), "{result:?}");
    assert!(stream.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_unblocks_recv() {
    let (client, _server) = echo_server().await;
    let ctx = CallContext::background().with_timeout(Duration::from_secs(3));
    let stream = client.open_stream(&ctx, "/svc/Echo").await.unwrap();

    let err = stream.recv::<Echo>().await.unwrap_err();
    assert!(matches!(err, RpcError::DeadlineExceeded), "{err}");
}

#[tokio::test]
async fn test_send_after_close_send_never_publishes() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("a")).await.unwrap();
    let mut call = server.next_call().await.unwrap();

    stream.close_send().await.unwrap();
    let err = assert_err!(stream.send(&echo("b")).await);
    assert!(matches!(err, RpcError::SendClosed), "{err}");

    assert!(call.next_request().await.unwrap().eos);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(call.try_next_request().is_none());

    // Receiving still works after the send side is closed.
    call.send_data(&echo("a")).await.unwrap();
    assert_eq!(stream.recv::<Echo>().await.unwrap(), Some(echo("a")));
}

#[tokio::test]
async fn test_full_queue_then_cancel_drops_messages() {
    let (client, server) = echo_server().await;
    let ctx = CallContext::background();
    let stream = client.open_stream(&ctx, "/svc/Echo").await.unwrap();
    stream.send(&echo("a")).await.unwrap();
    let call = server.next_call().await.unwrap();

    for msg in ["1", "2", "3", "4"] {
        call.send_data(&echo(msg)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    ctx.cancel();
    call.send_data(&echo("5")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = stream.recv::<Echo>().await.unwrap_err();
    assert!(matches!(err, RpcError::Cancelled), "{err}");
}

#[tokio::test]
async fn test_concurrent_streams_are_isolated() {
    let (client, server) = echo_server().await;
    let ctx = CallContext::background();
    let first = client.open_stream(&ctx, "/svc/Echo").await.unwrap();
    let second = client.open_stream(&ctx, "/svc/Echo").await.unwrap();
    assert_ne!(first.subjects().request, second.subjects().request);
    assert_ne!(first.subjects().response, second.subjects().response);
    assert_eq!(first.subjects().method, second.subjects().method);

    first.send(&echo("first")).await.unwrap();
    let first_call = server.next_call().await.unwrap();
    second.send(&echo("second")).await.unwrap();
    let second_call = server.next_call().await.unwrap();

    second_call.send_data(&echo("to second")).await.unwrap();
    first_call.send_data(&echo("to first")).await.unwrap();

    assert_eq!(first.recv::<Echo>().await.unwrap(), Some(echo("to first")));
    assert_eq!(second.recv::<Echo>().await.unwrap(), Some(echo("to second")));
}

#[tokio::test]
async fn test_send_and_recv_interleave() {
    let (client, server) = echo_server().await;
    let stream = client
        .open_stream(&CallContext::background(), "/svc/Echo")
        .await
        .unwrap();
    stream.send(&echo("0")).await.unwrap();
    let mut call = server.next_call().await.unwrap();

    let responder = async {
        while let Some(request) = call.next_request().await {
            if request.eos {
                call.send_eos().await.unwrap();
                break;
            }
            let msg: Echo = serde_json::from_slice(&request.data).unwrap();
            call.send_data(&msg).await.unwrap();
        }
    };

    let sender = async {
        for i in 1..=5 {
            stream.send(&echo(&i.to_string())).await.unwrap();
        }
        stream.close_send().await.unwrap();
    };

    let receiver = async {
        let mut got = Vec::new();
        while let Some(msg) = stream.recv::<Echo>().await.unwrap() {
            got.push(msg.msg);
        }
        got
    };

    let ((), (), got) = with_default_timeout(async { tokio::join!(responder, sender, receiver) }).await;
    assert_eq!(got, vec!["1", "2", "3", "4", "5"]);
}
