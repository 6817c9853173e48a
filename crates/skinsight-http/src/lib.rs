//! SkinSight HTTP - analysis submissions over the network
//!
//! Implements [`skinsight_core::AnalysisClient`] with a `reqwest` multipart
//! POST. The form carries:
//! - `image`: the normalized JPEG still, file name `skin.jpg`
//! - `age`: stringified integer or empty
//! - `skinTone`: lowercase tone name
//! - `concerns`: JSON array of concern labels

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod config;

pub use client::{build_form, ClientError, HttpAnalysisClient};
pub use config::HttpClientConfig;
