//! Common value types shared by the chipmosaic crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod source;
pub mod time;
pub mod transform;
pub mod window;

pub use bbox::BoundingBox;
pub use crs::{Crs, CrsKind};
pub use error::{ChipError, ChipResult};
pub use source::SourceDescriptor;
pub use time::{canonical_timestamp, parse_instant, TimeInterval};
pub use transform::PixelTransform;
pub use window::{PixelWindow, Window};
