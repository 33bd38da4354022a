//! In-memory GeoJSON layer group and map container.
//!
//! [`MemoryGeoJson`] validates GeoJSON input the way a layer library would,
//! expands it into one child layer per drawable feature and records every
//! imperative call it receives. It backs headless hosts and tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tether_core::{
    Callback, ConstructionError, Container, ContainerRef, LayerGroup, NodeIdentity, Peer,
    PeerHandle,
};

use crate::events::{LayerCallback, LayerEvent, LayerEventPayload};
use crate::layer::{GeoJsonError, GeoJsonLayer};
use crate::options::{GeoJsonOptions, PathStyle};

/// One drawable feature.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureLayer {
    pub id: usize,
    pub geometry: String,
    pub properties: Value,
    pub style: PathStyle,
}

/// Imperative call received by a [`MemoryGeoJson`].
#[derive(Clone, Debug, PartialEq)]
pub enum LayerOp {
    Create { layers: usize },
    ClearLayers,
    AddData { layers: usize },
    SetStyle(PathStyle),
    SetOptions(GeoJsonOptions),
    On(LayerEvent),
    Off(LayerEvent),
}

pub struct MemoryGeoJson {
    layers: Vec<FeatureLayer>,
    next_layer: usize,
    style: PathStyle,
    options: GeoJsonOptions,
    subscriptions: Vec<(LayerEvent, LayerCallback)>,
    history: Vec<LayerOp>,
}

impl MemoryGeoJson {
    pub fn layers(&self) -> &[FeatureLayer] {
        &self.layers
    }

    pub fn style(&self) -> &PathStyle {
        &self.style
    }

    pub fn options(&self) -> &GeoJsonOptions {
        &self.options
    }

    pub fn history(&self) -> &[LayerOp] {
        &self.history
    }

    pub fn take_history(&mut self) -> Vec<LayerOp> {
        std::mem::take(&mut self.history)
    }

    pub fn subscription_count(&self, event: LayerEvent) -> usize {
        self.subscriptions
            .iter()
            .filter(|(subscribed, _)| *subscribed == event)
            .count()
    }

    fn push_features(&mut self, features: Vec<ParsedFeature>) -> usize {
        let added = features.len();
        for feature in features {
            self.layers.push(FeatureLayer {
                id: self.next_layer,
                geometry: feature.geometry,
                properties: feature.properties,
                style: self.style.clone(),
            });
            self.next_layer += 1;
        }
        added
    }
}

impl GeoJsonLayer for MemoryGeoJson {
    fn create(
        data: &Value,
        style: Option<&PathStyle>,
        options: &GeoJsonOptions,
    ) -> Result<Self, ConstructionError> {
        if options.pane.is_empty() {
            return Err(ConstructionError::invalid("pane must not be empty"));
        }
        let features = parse_features(data).map_err(|err| ConstructionError::Rejected(Box::new(err)))?;
        let mut layer = Self {
            layers: Vec::new(),
            next_layer: 0,
            style: style.cloned().unwrap_or_default(),
            options: options.clone(),
            subscriptions: Vec::new(),
            history: Vec::new(),
        };
        let layers = layer.push_features(features);
        layer.history.push(LayerOp::Create { layers });
        Ok(layer)
    }

    fn clear_layers(&mut self) {
        self.layers.clear();
        self.history.push(LayerOp::ClearLayers);
    }

    fn add_data(&mut self, data: &Value) -> Result<usize, GeoJsonError> {
        let features = parse_features(data)?;
        let layers = self.push_features(features);
        self.history.push(LayerOp::AddData { layers });
        Ok(layers)
    }

    fn set_style(&mut self, style: &PathStyle) {
        self.style = style.clone();
        for layer in &mut self.layers {
            layer.style = style.clone();
        }
        self.history.push(LayerOp::SetStyle(style.clone()));
    }

    fn set_options(&mut self, options: &GeoJsonOptions) {
        self.options = options.clone();
        self.history.push(LayerOp::SetOptions(options.clone()));
    }

    fn fire(&self, event: LayerEvent, layer: Option<usize>) -> usize {
        let properties = layer.and_then(|id| {
            self.layers
                .iter()
                .find(|feature| feature.id == id)
                .map(|feature| feature.properties.clone())
        });
        let payload = LayerEventPayload {
            event,
            layer,
            properties,
        };
        let targets: Vec<LayerCallback> = self
            .subscriptions
            .iter()
            .filter(|(subscribed, _)| *subscribed == event)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in &targets {
            callback.call(&payload);
        }
        targets.len()
    }
}

impl Peer for MemoryGeoJson {
    type Event = LayerEvent;
    type Payload = LayerEventPayload;

    fn on(&mut self, event: LayerEvent, callback: &Callback<LayerEventPayload>) {
        self.subscriptions.push((event, callback.clone()));
        self.history.push(LayerOp::On(event));
    }

    fn off(&mut self, event: LayerEvent, callback: &Callback<LayerEventPayload>) {
        self.subscriptions
            .retain(|(subscribed, existing)| !(*subscribed == event && existing.ptr_eq(callback)));
        self.history.push(LayerOp::Off(event));
    }
}

impl LayerGroup for MemoryGeoJson {
    type Layer = FeatureLayer;

    fn each_layer(&self, visitor: &mut dyn FnMut(&FeatureLayer)) {
        for layer in &self.layers {
            visitor(layer);
        }
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl fmt::Debug for MemoryGeoJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGeoJson")
            .field("layers", &self.layers.len())
            .field("style", &self.style)
            .field("options", &self.options)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Root map that GeoJSON layers are added to.
///
/// Adding and removing a layer fires its `add` and `remove` events.
#[derive(Debug, Default)]
pub struct MapContainer {
    layers: RefCell<IndexSet<NodeIdentity>>,
}

impl MapContainer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn container_ref<L: GeoJsonLayer>(self: &Rc<Self>) -> ContainerRef<L> {
        self.clone()
    }

    pub fn layer_ids(&self) -> Vec<NodeIdentity> {
        self.layers.borrow().iter().copied().collect()
    }

    pub fn contains(&self, identity: NodeIdentity) -> bool {
        self.layers.borrow().contains(&identity)
    }
}

impl<L: GeoJsonLayer> Container<L> for MapContainer {
    fn attach(&self, peer: &PeerHandle<L>) {
        if self.layers.borrow_mut().insert(peer.identity()) {
            log::debug!("map: added layer {}", peer.identity());
            peer.with(|layer| layer.fire(LayerEvent::Add, None));
        }
    }

    fn detach(&self, peer: &PeerHandle<L>) {
        if self.layers.borrow_mut().shift_remove(&peer.identity()) {
            log::debug!("map: removed layer {}", peer.identity());
            peer.with(|layer| layer.fire(LayerEvent::Remove, None));
        }
    }
}

struct ParsedFeature {
    geometry: String,
    properties: Value,
}

/// Expand GeoJSON into drawable features; features without geometry are skipped.
fn parse_features(data: &Value) -> Result<Vec<ParsedFeature>, GeoJsonError> {
    let mut features = Vec::new();
    collect_features(data, &mut features)?;
    Ok(features)
}

fn collect_features(value: &Value, out: &mut Vec<ParsedFeature>) -> Result<(), GeoJsonError> {
    let object = match value {
        Value::Array(items) => {
            for item in items {
                collect_features(item, out)?;
            }
            return Ok(());
        }
        Value::Object(object) => object,
        other => return Err(GeoJsonError::NotAnObject(json_kind(other))),
    };
    match object_type(object)? {
        "FeatureCollection" => {
            for feature in array_member(object, "FeatureCollection", "features")? {
                collect_features(feature, out)?;
            }
        }
        "Feature" => match object.get("geometry") {
            None | Some(Value::Null) => {}
            Some(geometry) => out.push(ParsedFeature {
                geometry: geometry_type(geometry)?,
                properties: object.get("properties").cloned().unwrap_or(Value::Null),
            }),
        },
        _ => out.push(ParsedFeature {
            geometry: geometry_type(value)?,
            properties: Value::Null,
        }),
    }
    Ok(())
}

fn geometry_type(value: &Value) -> Result<String, GeoJsonError> {
    let Value::Object(object) = value else {
        return Err(GeoJsonError::NotAnObject(json_kind(value)));
    };
    let kind = object_type(object)?;
    match kind {
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon" | "MultiPolygon" => {
            array_member(object, kind, "coordinates")?;
        }
        "GeometryCollection" => {
            for geometry in array_member(object, kind, "geometries")? {
                geometry_type(geometry)?;
            }
        }
        other => return Err(GeoJsonError::UnknownType(other.to_string())),
    }
    Ok(kind.to_string())
}

fn object_type(object: &Map<String, Value>) -> Result<&str, GeoJsonError> {
    object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeoJsonError::MissingType)
}

fn array_member<'a>(
    object: &'a Map<String, Value>,
    kind: &str,
    member: &'static str,
) -> Result<&'a Vec<Value>, GeoJsonError> {
    object
        .get(member)
        .and_then(Value::as_array)
        .ok_or_else(|| GeoJsonError::MissingMember {
            kind: kind.to_string(),
            member,
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "name": "a" },
                  "geometry": { "type": "Point", "coordinates": [0.0, 1.0] } },
                { "type": "Feature", "properties": { "name": "b" }, "geometry": null },
                { "type": "Feature", "properties": { "name": "c" },
                  "geometry": { "type": "GeometryCollection", "geometries": [
                      { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] }
                  ] } }
            ]
        })
    }

    #[test]
    fn features_without_geometry_are_skipped() {
        let layer = MemoryGeoJson::create(&collection(), None, &GeoJsonOptions::default())
            .expect("valid collection");
        let names: Vec<_> = layer
            .layers()
            .iter()
            .map(|feature| feature.properties["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("c")]);
        assert_eq!(layer.layers()[1].geometry, "GeometryCollection");
        assert_eq!(layer.history(), &[LayerOp::Create { layers: 2 }]);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(
            parse_features(&json!(3)).err(),
            Some(GeoJsonError::NotAnObject("a number"))
        );
        assert_eq!(
            parse_features(&json!({ "coordinates": [] })).err(),
            Some(GeoJsonError::MissingType)
        );
        assert_eq!(
            parse_features(&json!({ "type": "Circle" })).err(),
            Some(GeoJsonError::UnknownType("Circle".into()))
        );
        assert_eq!(
            parse_features(&json!({ "type": "Polygon" })).err(),
            Some(GeoJsonError::MissingMember {
                kind: "Polygon".into(),
                member: "coordinates"
            })
        );
    }

    #[test]
    fn construction_errors_wrap_validation_failures() {
        let err = MemoryGeoJson::create(&json!("nope"), None, &GeoJsonOptions::default())
            .expect_err("string is not GeoJSON");
        assert!(matches!(err, ConstructionError::Rejected(_)));

        let options = GeoJsonOptions {
            pane: String::new(),
            ..GeoJsonOptions::default()
        };
        let err = MemoryGeoJson::create(&collection(), None, &options).expect_err("empty pane");
        assert!(matches!(err, ConstructionError::InvalidInput(_)));
    }

    #[test]
    fn set_style_restyles_existing_and_future_layers() {
        let mut layer =
            MemoryGeoJson::create(&collection(), Some(&PathStyle::color("red")), &GeoJsonOptions::default())
                .expect("valid");
        layer.set_style(&PathStyle::color("blue"));
        let added = layer
            .add_data(&json!({ "type": "Point", "coordinates": [2.0, 2.0] }))
            .expect("valid point");
        assert_eq!(added, 1);
        assert!(layer
            .layers()
            .iter()
            .all(|feature| feature.style == PathStyle::color("blue")));
        assert_eq!(layer.layers().last().map(|feature| feature.id), Some(2));
    }

    #[test]
    fn fire_reaches_matching_subscribers_with_feature_properties() {
        let mut layer = MemoryGeoJson::create(&collection(), None, &GeoJsonOptions::default())
            .expect("valid");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let callback = Callback::new(move |payload: &LayerEventPayload| {
            sink.borrow_mut().push(payload.clone());
        });
        layer.on(LayerEvent::Click, &callback);

        assert_eq!(layer.fire(LayerEvent::Click, Some(0)), 1);
        assert_eq!(layer.fire(LayerEvent::DblClick, Some(0)), 0);
        layer.off(LayerEvent::Click, &callback);
        assert_eq!(layer.fire(LayerEvent::Click, Some(0)), 0);

        assert_eq!(
            *seen.borrow(),
            vec![LayerEventPayload {
                event: LayerEvent::Click,
                layer: Some(0),
                properties: Some(json!({ "name": "a" })),
            }]
        );
    }
}
