// Type definitions shared by the signing, embedding and verification stages

pub mod document;
pub mod payload;

pub use document::*;
pub use payload::*;
