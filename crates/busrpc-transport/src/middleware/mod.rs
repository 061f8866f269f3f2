//! Composable middleware for busrpc transports.
//!
//! A [`TransportLayer`] wraps a transport in another transport that adds
//! behavior, in the style of Tower layers. Layers are stacked with
//! [`LayerStack`].
//!
//! # Example
//!
//! ```rust
//! use busrpc_transport::MemoryBus;
//! use busrpc_transport::middleware::{LayerStack, LoggingLayer};
//!
//! let transport = LayerStack::new(MemoryBus::new())
//!     .with(LoggingLayer::default())
//!     .into_inner();
//! assert_eq!(transport.messages_published(), 0);
//! ```

mod logging;

pub use logging::{LoggingLayer, LoggingTransport};

/// A layer that wraps a transport to add functionality.
///
/// See [`LoggingLayer`] for an implementation.
pub trait TransportLayer<T> {
    /// The transport type produced by this layer.
    type Transport;

    /// Wrap the inner transport with this layer's functionality.
    fn layer(&self, inner: T) -> Self::Transport;
}

/// A stack of layers applied to a transport.
///
/// Layers are applied from left to right (first added, innermost).
pub struct LayerStack<T> {
    inner: T,
}

impl<T> LayerStack<T> {
    /// Create a new layer stack with the given transport.
    pub const fn new(transport: T) -> Self {
        Self { inner: transport }
    }

    /// Apply a layer to the stack.
    pub fn with<L>(self, layer: L) -> LayerStack<L::Transport>
    where
        L: TransportLayer<T>,
    {
        LayerStack {
            inner: layer.layer(self.inner),
        }
    }

    /// Get the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
