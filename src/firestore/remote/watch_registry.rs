use std::collections::BTreeMap;

use crate::firestore::api::query::OrderBy;
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::remote::remote_event::WatchSnapshot;
use crate::firestore::remote::watch_change::WatchChange;
use crate::firestore::remote::watch_change_aggregator::WatchState;

/// Listen targets multiplexed over one stream, keyed by target id.
///
/// A target whose event fails is dropped from the registry; later events for
/// that id are rejected until it is subscribed again.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    targets: BTreeMap<i32, WatchState>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, target_id: i32, order_by: Vec<OrderBy>) -> FirestoreResult<()> {
        if self.targets.contains_key(&target_id) {
            return Err(invalid_argument(format!(
                "Target {target_id} is already subscribed"
            )));
        }
        self.targets
            .insert(target_id, WatchState::new(target_id, order_by));
        log::debug!("subscribed watch target {target_id}");
        Ok(())
    }

    pub fn resolve_event(
        &mut self,
        target_id: i32,
        change: WatchChange,
    ) -> FirestoreResult<Option<WatchSnapshot>> {
        let state = self
            .targets
            .get_mut(&target_id)
            .ok_or_else(|| invalid_argument(format!("Target {target_id} is not subscribed")))?;
        match state.resolve_event(change) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                log::warn!("dropping watch target {target_id}: {err}");
                self.targets.remove(&target_id);
                Err(err)
            }
        }
    }

    pub fn unsubscribe(&mut self, target_id: i32) -> Option<WatchState> {
        self.targets.remove(&target_id)
    }

    pub fn state(&self, target_id: i32) -> Option<&WatchState> {
        self.targets.get(&target_id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::error::FirestoreErrorCode;
    use crate::firestore::remote::watch_change::{TargetChangeState, WatchTargetChange};

    #[test]
    fn failing_target_is_torn_down() {
        let mut registry = WatchRegistry::new();
        registry.subscribe(1, Vec::new()).unwrap();
        registry.subscribe(2, Vec::new()).unwrap();
        assert!(registry.subscribe(1, Vec::new()).is_err());

        let remove = WatchChange::TargetChange(WatchTargetChange::new(TargetChangeState::Remove));
        let err = registry.resolve_event(1, remove.clone()).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::ProtocolViolation);
        assert!(registry.state(1).is_none());
        assert!(registry.state(2).is_some());

        let err = registry.resolve_event(1, remove).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::InvalidArgument);
    }

    #[test]
    fn unsubscribe_returns_state() {
        let mut registry = WatchRegistry::new();
        registry.subscribe(4, Vec::new()).unwrap();
        let state = registry.unsubscribe(4).unwrap();
        assert_eq!(state.target_id(), 4);
        assert!(registry.is_empty());
    }
}
