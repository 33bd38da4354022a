//! GeoJSON layer element for Tether.
//!
//! [`GeoJson`] keeps an imperative GeoJSON layer group in sync with declared
//! [`GeoJsonProps`]: style changes apply immediately, option changes go through
//! `set_options`, and data replacement clears the old features at once and adds
//! the new ones on the next scheduler turn.

pub mod component;
pub mod events;
pub mod layer;
pub mod memory;
pub mod options;

pub use component::{GeoJson, GeoJsonComponent, GeoJsonProps, GeoJsonPropsField};
pub use events::{LayerCallback, LayerEvent, LayerEventPayload, LayerEvents};
pub use layer::{GeoJsonError, GeoJsonLayer};
pub use memory::{FeatureLayer, LayerOp, MapContainer, MemoryGeoJson};
pub use options::{GeoJsonOptions, PathStyle, DEFAULT_PANE};
