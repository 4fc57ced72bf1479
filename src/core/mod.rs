//! EWFS driver internals
//!
//! Bottom-up: name hashing, on-image header and index formats, media access,
//! handles and the open-file table, generated files, then the mounted
//! filesystem and the driver interface on top.

pub mod config;
pub mod driver;
pub mod error;
pub mod filesystem;
pub mod generated;
pub mod handle;
pub mod hash;
pub mod header;
pub mod image;
pub mod index;
pub mod media;
pub mod table;
