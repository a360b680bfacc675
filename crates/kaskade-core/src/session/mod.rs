pub mod io;
pub mod model;
pub mod store;
pub mod sync;

pub use io::DataFile;
pub use model::{HistoryEntry, HttpMethod, KeyValue, Request, Session};
pub use store::{RequestUpdate, SessionStore, ValidationState};
