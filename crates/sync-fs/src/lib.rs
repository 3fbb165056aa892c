pub mod entry;
pub mod error;
pub mod snapshot;
pub mod view;

pub use entry::{Entry, EntryKind};
pub use error::{FsError, FsResult};
pub use snapshot::Snapshot;
pub use view::FsView;
