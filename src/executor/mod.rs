mod models;
#[cfg(feature = "cli")]
mod printer;
mod runner;
mod transport;

pub use models::{
    Call, FilePart, Fields, Method, PreparedRequest, RawResponse, RequestBody, DEFAULT_TIMEOUT,
};
#[cfg(feature = "cli")]
pub use printer::{print_audit_records, print_outcome};
pub use runner::Executor;
pub use transport::{ReqwestTransport, Transport};
