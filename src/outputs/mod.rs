//! Writing a [`NewsDigest`](crate::models::NewsDigest) to disk.
//!
//! - [`json`]: machine-readable digest
//! - [`markdown`]: human-readable report
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-11-04/
//!     ├── us.json
//!     └── ko.json
//!
//! markdown_output_dir/
//! ├── 2025-11-04_us.md
//! └── 2025-11-04_ko.md
//! ```

pub mod json;
pub mod markdown;
