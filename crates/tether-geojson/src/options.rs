use serde::{Deserialize, Serialize};

pub const DEFAULT_PANE: &str = "overlayPane";

/// Vector path style applied to every feature layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

impl PathStyle {
    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }
}

/// Layer options other than data and style.
///
/// `pane` is read only at construction; the rest can be changed on a live
/// layer through `set_options`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoJsonOptions {
    pub pane: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    pub interactive: bool,
    pub bubbling_mouse_events: bool,
    pub markers_inherit_options: bool,
}

impl Default for GeoJsonOptions {
    fn default() -> Self {
        Self {
            pane: DEFAULT_PANE.to_string(),
            attribution: None,
            interactive: true,
            bubbling_mouse_events: true,
            markers_inherit_options: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: GeoJsonOptions =
            serde_json::from_str(r#"{ "attribution": "OSM", "interactive": false }"#)
                .expect("valid options");
        assert_eq!(
            options,
            GeoJsonOptions {
                attribution: Some("OSM".into()),
                interactive: false,
                ..GeoJsonOptions::default()
            }
        );
        assert_eq!(options.pane, "overlayPane");
    }

    #[test]
    fn style_uses_camel_case_and_skips_unset() {
        let style = PathStyle {
            fill_color: Some("#f00".into()),
            ..PathStyle::color("blue")
        };
        let json = serde_json::to_value(&style).expect("serializable");
        assert_eq!(json, serde_json::json!({ "color": "blue", "fillColor": "#f00" }));
    }
}
