//! Output generation for a finished digest.
//!
//! # Submodules
//!
//! - [`message`]: Renders a [`Digest`](crate::models::Digest) into the email subject and body
//! - [`json`]: Archives the digest and run summary as JSON, one file per day

pub mod json;
pub mod message;
