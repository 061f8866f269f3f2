//! Binding a call to its ephemeral subjects.
//!
//! The first message of a call is a request to the method subject. A server
//! that accepts the call replies with an empty payload once it listens on the
//! call's request subject; from then on the client publishes directly.

use std::time::Duration;

use busrpc_core::context::CallContext;
use busrpc_core::error::RpcError;
use busrpc_transport::{Message, Publisher};
use bytes::Bytes;
use tracing::debug;

/// Send the opening envelope and wait for the server's acknowledgment.
///
/// The round trip is bounded by `timeout` and by `ctx`. Nothing is retried.
///
/// # Errors
///
/// Returns the transport or context error of the request, or
/// [`RpcError::Protocol`] if the acknowledgment carries a payload.
pub(crate) async fn bind<P: Publisher>(
    publisher: &P,
    ctx: &CallContext,
    method_subject: &str,
    payload: Bytes,
    timeout: Duration,
) -> Result<(), RpcError> {
    let ctx = ctx.with_timeout(timeout);
    let ack = publisher
        .request(&ctx, Message::new(method_subject, payload))
        .await?;

    if !ack.data.is_empty() {
        return Err(RpcError::protocol(format!(
            "unexpected response to handshake on {method_subject} ({} bytes)",
            ack.data.len()
        )));
    }

    debug!(subject = method_subject, "handshake acknowledged");
    Ok(())
}
