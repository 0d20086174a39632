pub mod registry;
pub mod spiral;

pub use registry::EntityKeyRegistry;
pub use spiral::{HeightPolicy, SpiralConfig, SpiralGeometry};
