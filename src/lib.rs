//! Local image store: uploads are persisted under generated ids and served
//! back as stored or converted to another image format on read.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod id;
pub mod service;
pub mod store;
pub mod web;

pub use codec::{ImageCodec, ImageCrateCodec};
pub use config::Config;
pub use error::{ConversionError, InitError, RetrieveError, StorageError};
pub use format::CanonicalFormat;
pub use service::{ImageService, RetrievedImage};
pub use store::{ImageStore, LocalFileStorage, StoredImage};
