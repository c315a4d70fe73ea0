pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod files;
pub mod headers;
pub mod response;

pub use client::{Desk365, TicketAttachments, TicketComments, Tickets};
pub use config::ApiConfig;
pub use error::{Error, Result};
pub use executor::{Call, Executor, Method};
pub use files::{Attachments, FileInput};
pub use response::Outcome;
