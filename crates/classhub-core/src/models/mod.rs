//! Data models for the application
//!
//! Assets and the categories that classify them, plus the parent entities that embed
//! assets.

mod asset;
mod category;
mod lesson_video;
mod material;
mod submission;

pub use asset::*;
pub use category::*;
pub use lesson_video::*;
pub use material::*;
pub use submission::*;
