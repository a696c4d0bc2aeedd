// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod cache;
pub mod compress;
pub mod config;
pub mod exception;
pub mod fresh;
pub mod loader;
pub mod param;
pub mod path;
pub mod record;
pub mod request;
pub mod response;
pub mod server;
pub mod store;
pub mod stream;
pub mod util;

pub use cache::{Outcome, StaticCache};
pub use compress::{Compressor, GzipCompressor};
pub use config::{Config, FileFilter, FileOverride, Options};
pub use exception::Exception;
pub use param::HttpRequestMethod;
pub use record::FileRecord;
pub use request::Request;
pub use response::{Body, Response};
pub use store::FileStore;
