//! Storage backend implementations.

pub mod local;

#[cfg(feature = "aws")]
pub mod s3;

#[cfg(feature = "vercel")]
pub mod vercel_blob;
