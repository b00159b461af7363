pub mod capture;
pub mod content;
pub mod director;
pub mod encoding;
pub mod phase;
pub mod render;
pub mod schema;
pub mod surface;
