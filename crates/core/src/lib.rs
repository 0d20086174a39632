pub mod config;
pub mod focus;
pub mod layout;
pub mod model;
pub mod parsers;
pub mod render;
pub mod scene;
pub mod svg;
pub mod timeline;
pub mod world;

pub use config::MosaicConfig;
pub use world::World;
