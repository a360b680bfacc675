pub mod backend;
pub mod error;
pub mod history;
pub mod results;
pub mod run;
pub mod session;

pub use error::KaskadeError;
