use std::{
    fmt,
    future::Future,
    mem,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::{
    ack_registry::{Ack, AckResult},
    error::ClientError,
};

type Mapper<T> = Box<dyn FnOnce(Ack) -> Result<T, ClientError> + Send>;

enum State<T> {
    Ready(Result<T, ClientError>),
    Pending { rx: oneshot::Receiver<AckResult>, map: Mapper<T> },
    Done,
}

/// The outcome of one request, fulfilled exactly once.
///
/// Await it, or poll it without blocking through [`Completion::try_take`]. Timeouts are up to
/// the caller, e.g. `tokio::time::timeout`.
pub struct Completion<T> {
    state: State<T>,
}

impl<T> Completion<T> {
    pub(crate) fn ready(result: Result<T, ClientError>) -> Self {
        Self { state: State::Ready(result) }
    }

    pub(crate) fn pending<F>(rx: oneshot::Receiver<AckResult>, map: F) -> Self
    where
        F: FnOnce(Ack) -> Result<T, ClientError> + Send + 'static,
    {
        Self { state: State::Pending { rx, map: Box::new(map) } }
    }

    /// Take the outcome if it has arrived.
    ///
    /// Returns `None` while the acknowledgment is outstanding, and after the outcome was taken.
    pub fn try_take(&mut self) -> Option<Result<T, ClientError>> {
        match mem::replace(&mut self.state, State::Done) {
            State::Ready(result) => Some(result),
            State::Pending { mut rx, map } => match rx.try_recv() {
                Ok(result) => Some(result.and_then(map)),
                Err(TryRecvError::Empty) => {
                    self.state = State::Pending { rx, map };
                    None
                }
                Err(TryRecvError::Closed) => Some(Err(ClientError::Cancelled)),
            },
            State::Done => None,
        }
    }
}

impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Result<T, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match mem::replace(&mut this.state, State::Done) {
            State::Ready(result) => Poll::Ready(result),
            State::Pending { mut rx, map } => match Pin::new(&mut rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(map)),
                // The registry dropped the sender without fulfilling it
                Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::Cancelled)),
                Poll::Pending => {
                    this.state = State::Pending { rx, map };
                    Poll::Pending
                }
            },
            State::Done => Poll::Ready(Err(ClientError::Cancelled)),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(_) => "Ready",
            State::Pending { .. } => "Pending",
            State::Done => "Done",
        };

        f.debug_struct("Completion").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_completion_is_taken_once() {
        let mut completion = Completion::ready(Ok(7));

        assert_eq!(completion.try_take().unwrap().unwrap(), 7);
        assert!(completion.try_take().is_none());
    }

    #[test]
    fn pending_until_fulfilled_then_mapped() {
        let (tx, rx) = oneshot::channel();
        let mut completion = Completion::pending(rx, |ack| match ack {
            Ack::SubAck(codes) => Ok(codes.len()),
            _ => Err(ClientError::Cancelled),
        });

        assert!(completion.try_take().is_none());

        tx.send(Ok(Ack::SubAck(vec![0, 1]))).unwrap();
        assert_eq!(completion.try_take().unwrap().unwrap(), 2);
    }

    #[test]
    fn dropped_sender_cancels() {
        let (tx, rx) = oneshot::channel::<AckResult>();
        let mut completion = Completion::pending(rx, |_| Ok(()));

        drop(tx);
        assert!(matches!(completion.try_take(), Some(Err(ClientError::Cancelled))));
    }

    #[tokio::test]
    async fn awaits_failure() {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::pending(rx, |_| Ok(()));

        tx.send(Err(ClientError::TransportClosed)).unwrap();
        assert!(matches!(completion.await, Err(ClientError::TransportClosed)));
    }
}
