pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod lister;
pub mod progress;
pub mod remote;
pub mod storage;

pub use config::AppConfig;
pub use engine::{CancelToken, MirrorEngine, MirrorOptions, RunReport, RunState};
pub use error::{CatalogError, Error, FetchError, ListError, SessionError};
pub use fetcher::{FileFetcher, Retrying, StreamFetcher, TransferOutcome};
pub use progress::{ProgressReporter, SilentReporter};
pub use remote::{ChannelSource, EntryKind, RemoteEntry, RemoteSession};
pub use storage::{CatalogRecord, CatalogWriter, Database};
