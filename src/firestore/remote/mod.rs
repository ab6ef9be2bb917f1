pub mod listen;
pub mod remote_event;
pub mod serializer;
mod structured_query;
pub mod watch_change;
pub mod watch_change_aggregator;
pub mod watch_registry;

pub use listen::{run_listen_loop, spawn_listen, ListenHandle, SnapshotDelegate};
pub use remote_event::{ChangeKind, DocumentViewChange, WatchSnapshot};
pub use serializer::JsonProtoSerializer;
pub use watch_change::{
    decode_watch_change, DocumentChange, DocumentDelete, DocumentRemove, ExistenceFilterChange,
    TargetChangeState, WatchChange, WatchTargetChange,
};
pub use watch_change_aggregator::WatchState;
pub use watch_registry::WatchRegistry;
