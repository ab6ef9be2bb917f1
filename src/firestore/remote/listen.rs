use std::sync::Arc;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;

use crate::firestore::error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
use crate::firestore::remote::remote_event::WatchSnapshot;
use crate::firestore::remote::watch_change::WatchChange;
use crate::firestore::remote::watch_change_aggregator::WatchState;
use crate::platform::runtime;

/// Receives the output of a listen loop.
///
/// `on_error` is called at most once, after which the loop stops.
#[async_trait]
pub trait SnapshotDelegate: Send + Sync + 'static {
    async fn on_snapshot(&self, snapshot: WatchSnapshot);
    async fn on_error(&self, error: FirestoreError);
}

/// Feeds watch events into a running listen loop.
#[derive(Clone, Debug)]
pub struct ListenHandle {
    target_id: i32,
    sender: Sender<WatchChange>,
}

impl ListenHandle {
    pub fn target_id(&self) -> i32 {
        self.target_id
    }

    pub async fn send(&self, change: WatchChange) -> FirestoreResult<()> {
        self.sender.send(change).await.map_err(|_| self.stopped())
    }

    pub fn try_send(&self, change: WatchChange) -> FirestoreResult<()> {
        self.sender.try_send(change).map_err(|_| self.stopped())
    }

    /// Stops the loop once the events already queued have been processed.
    pub fn close(&self) {
        self.sender.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn stopped(&self) -> FirestoreError {
        FirestoreError::new(
            FirestoreErrorCode::Cancelled,
            format!("listen loop for target {} has stopped", self.target_id),
        )
    }
}

/// Runs `state` on a background task and returns the handle used to feed it.
pub fn spawn_listen(state: WatchState, delegate: Arc<dyn SnapshotDelegate>) -> ListenHandle {
    let (sender, receiver) = async_channel::unbounded();
    let target_id = state.target_id();
    runtime::spawn_detached(run_listen_loop(state, receiver, delegate));
    ListenHandle { target_id, sender }
}

/// Applies events in arrival order until the channel closes or an event fails.
pub async fn run_listen_loop(
    mut state: WatchState,
    events: Receiver<WatchChange>,
    delegate: Arc<dyn SnapshotDelegate>,
) {
    while let Ok(change) = events.recv().await {
        match state.resolve_event(change) {
            Ok(Some(snapshot)) => delegate.on_snapshot(snapshot).await,
            Ok(None) => {}
            Err(err) => {
                log::warn!("listen loop for target {} terminated: {err}", state.target_id());
                events.close();
                delegate.on_error(err).await;
                return;
            }
        }
    }
    log::debug!("listen loop for target {} closed", state.target_id());
}
