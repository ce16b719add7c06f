pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod processing {
    pub mod blur;
    pub mod color;
    pub mod filters;
    pub mod layout;
    pub mod resample;
}
pub mod surface;
pub mod tasks {
    pub mod loader;
    pub mod mosaic;
}

pub use engine::Engine;
pub use error::{Error, Result};
