//! Size-budgeted image compression for web asset pipelines
//!
//! Re-encodes images as WebP (or JPEG) at stepped-down quality levels until
//! they fit a byte budget, and wraps that core in a small batch driver that
//! writes the results and reports the savings.

pub mod compress;
pub mod error;
pub mod image;
pub mod models;
pub mod optimizer;
pub mod report;

pub use error::{Error, Result};
