use serde_json::Value;
use tether_core::{ConstructionError, LayerGroup, Peer};
use thiserror::Error;

use crate::events::{LayerEvent, LayerEventPayload};
use crate::options::{GeoJsonOptions, PathStyle};

/// Input that is not a GeoJSON object the layer can draw.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoJsonError {
    #[error("expected a GeoJSON object or array, found {0}")]
    NotAnObject(&'static str),
    #[error("GeoJSON object has no `type`")]
    MissingType,
    #[error("unknown GeoJSON type `{0}`")]
    UnknownType(String),
    #[error("`{kind}` is missing `{member}`")]
    MissingMember {
        kind: String,
        member: &'static str,
    },
}

/// Imperative GeoJSON layer group driven by the GeoJSON element.
pub trait GeoJsonLayer:
    Peer<Event = LayerEvent, Payload = LayerEventPayload> + LayerGroup + Sized
{
    /// Build a layer group from the initial data and options.
    fn create(
        data: &Value,
        style: Option<&PathStyle>,
        options: &GeoJsonOptions,
    ) -> Result<Self, ConstructionError>;

    /// Remove every child layer.
    fn clear_layers(&mut self);

    /// Add the features of `data` as child layers, returning how many were added.
    fn add_data(&mut self, data: &Value) -> Result<usize, GeoJsonError>;

    fn set_style(&mut self, style: &PathStyle);

    fn set_options(&mut self, options: &GeoJsonOptions);

    /// Invoke the callbacks subscribed to `event`.
    fn fire(&self, event: LayerEvent, layer: Option<usize>) -> usize;
}
