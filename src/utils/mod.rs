//! Utility Module Implementation
//! Author: kartik4091
//! Created: 2025-06-03 09:14:13 UTC

pub mod io;

pub use self::io::{ensure_parent_dir, is_readable_file, remove_with_retry};
