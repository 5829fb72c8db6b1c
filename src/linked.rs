use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::ArcWake;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Cancels the wrapped token when woken.
struct CancelOnWake(CancellationToken);

impl ArcWake for CancelOnWake {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.cancel();
    }
}

/// The effective cancellation of a single call.
///
/// The token is a child of the gate-wide token, so cancelling the gate reaches it. A
/// caller-supplied token is forwarded into it by a waker registered on the caller's
/// `cancelled()` future. Dropping this value unregisters the waker and detaches the
/// child from the gate, so neither side keeps a reference past the call.
pub(crate) struct CallCancellation {
    token: CancellationToken,
    _forward: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl CallCancellation {
    pub(crate) fn link(gate: &CancellationToken, caller: Option<&CancellationToken>) -> Self {
        let token = gate.child_token();
        let forward = caller.and_then(|caller| {
            let mut watch = Box::pin(caller.clone().cancelled_owned());
            let waker = futures::task::waker(Arc::new(CancelOnWake(token.clone())));
            match watch.as_mut().poll(&mut Context::from_waker(&waker)) {
                Poll::Ready(()) => {
                    token.cancel();
                    None
                }
                Poll::Pending => Some(watch),
            }
        });

        Self {
            token,
            _forward: forward,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
