//! Delivery targets: where the gate hands stanzas once they are in order.
//!
//! The gate only guarantees call order. What delivery means (routing to a
//! mailbox, pushing to a socket, enqueueing for a dispatcher) is up to the
//! implementation plugged in here.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;
use stanza_gate_core::Stanza;
use tokio::sync::mpsc;

/// The gate's single outbound extension point.
///
/// For a given principal, `deliver` is called in strictly increasing sequence
/// order and never concurrently with itself. Calls for different principals
/// may run concurrently on different threads.
///
/// A returned error is logged and counted; the stanza is considered consumed
/// and the gate moves on to the next one.
pub trait Delivery<R, P>: Send + Sync {
    /// Hand one in-order stanza to its recipient.
    fn deliver(&self, stanza: Stanza<P>, recipient: &R) -> anyhow::Result<()>;
}

impl<R, P, D: Delivery<R, P> + ?Sized> Delivery<R, P> for Arc<D> {
    fn deliver(&self, stanza: Stanza<P>, recipient: &R) -> anyhow::Result<()> {
        (**self).deliver(stanza, recipient)
    }
}

impl<R, P, D: Delivery<R, P> + ?Sized> Delivery<R, P> for Box<D> {
    fn deliver(&self, stanza: Stanza<P>, recipient: &R) -> anyhow::Result<()> {
        (**self).deliver(stanza, recipient)
    }
}

/// A delivery target backed by a closure. Build one with [`delivery_fn`].
#[derive(Clone)]
pub struct FnDelivery<F> {
    f: F,
}

/// Wrap a closure as a delivery target.
///
/// ```rust
/// use stanza_gate::{delivery_fn, SequenceGate};
/// use stanza_gate_core::{Principal, Stanza};
///
/// let gate = SequenceGate::new(delivery_fn(|stanza: Stanza<&'static str>, to: &String| {
///     println!("{} -> {}: {}", stanza.seq(), to, stanza.payload());
///     Ok(())
/// }));
/// gate.handle(Stanza::new(Principal::new("room"), 0, "hi"), "alice".to_string());
/// ```
pub fn delivery_fn<R, P, F>(f: F) -> FnDelivery<F>
where
    F: Fn(Stanza<P>, &R) -> anyhow::Result<()> + Send + Sync,
{
    FnDelivery { f }
}

impl<R, P, F> Delivery<R, P> for FnDelivery<F>
where
    F: Fn(Stanza<P>, &R) -> anyhow::Result<()> + Send + Sync,
{
    fn deliver(&self, stanza: Stanza<P>, recipient: &R) -> anyhow::Result<()> {
        (self.f)(stanza, recipient)
    }
}

/// Forwards in-order stanzas to an async dispatcher over an unbounded channel.
///
/// Delivery fails once the receiving side has been dropped.
pub struct ChannelDelivery<R, P> {
    tx: mpsc::UnboundedSender<(Stanza<P>, R)>,
    _recipient: PhantomData<fn() -> R>,
}

impl<R, P> ChannelDelivery<R, P> {
    /// Create a delivery target and the receiver a dispatcher task reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<(Stanza<P>, R)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Wrap an existing sender.
    pub fn new(tx: mpsc::UnboundedSender<(Stanza<P>, R)>) -> Self {
        Self {
            tx,
            _recipient: PhantomData,
        }
    }
}

impl<R, P> Clone for ChannelDelivery<R, P> {
    fn clone(&self) -> Self {
        Self::new(self.tx.clone())
    }
}

impl<R, P> Delivery<R, P> for ChannelDelivery<R, P>
where
    R: Clone + Send + Sync,
    P: Send,
{
    fn deliver(&self, stanza: Stanza<P>, recipient: &R) -> anyhow::Result<()> {
        let seq = stanza.seq();
        self.tx
            .send((stanza, recipient.clone()))
            .map_err(|_| anyhow!("dispatcher channel closed, dropped seq {}", seq))
    }
}
