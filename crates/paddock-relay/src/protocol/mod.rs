//! Wire format types for the upstream dialects

pub mod anthropic;
pub mod google;
pub mod image;
pub mod openai;
