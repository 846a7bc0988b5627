//! Vector operations on in-memory layers
//!
//! - Buffer: circular zones around points

mod buffer;

pub use buffer::{buffer_geometry, buffer_layer, buffer_points, BufferParams};
