//! Data models for Photoframe

mod image;
mod source;

pub use image::ImageDescriptor;
pub use source::ImageSource;
