mod geometry;
mod projection;
mod renderer;
mod spatial;

pub use projection::Viewport;
pub use renderer::{Choropleth, MapLabel, MapLayers, MapRenderer, MapScene};
pub use spatial::SpatialGrid;
