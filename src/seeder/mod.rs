//! Segment edge cache: locator, origin fallback, maintenance.

pub mod file_server;
pub mod locator;
pub mod maintenance;
pub mod origin;
pub mod scanner;
pub mod service;
pub mod validate;
pub mod writer;

pub use origin::{OriginFetcher, OriginStore, S3Origin};
pub use service::SeederService;
