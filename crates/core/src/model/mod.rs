pub mod snapshots;

pub use snapshots::{SnapshotProvider, TraceSnapshots};
