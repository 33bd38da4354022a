use std::fmt;

use serde_json::Value;
use tether_core::{Callback, EventMap};

/// Events a GeoJSON layer group can emit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayerEvent {
    Click,
    DblClick,
    MouseDown,
    MouseUp,
    MouseOver,
    MouseOut,
    ContextMenu,
    Add,
    Remove,
    PopupOpen,
    PopupClose,
    TooltipOpen,
    TooltipClose,
}

impl LayerEvent {
    pub const ALL: [LayerEvent; 13] = [
        LayerEvent::Click,
        LayerEvent::DblClick,
        LayerEvent::MouseDown,
        LayerEvent::MouseUp,
        LayerEvent::MouseOver,
        LayerEvent::MouseOut,
        LayerEvent::ContextMenu,
        LayerEvent::Add,
        LayerEvent::Remove,
        LayerEvent::PopupOpen,
        LayerEvent::PopupClose,
        LayerEvent::TooltipOpen,
        LayerEvent::TooltipClose,
    ];

    /// Name used by the layer library.
    pub fn as_str(self) -> &'static str {
        match self {
            LayerEvent::Click => "click",
            LayerEvent::DblClick => "dblclick",
            LayerEvent::MouseDown => "mousedown",
            LayerEvent::MouseUp => "mouseup",
            LayerEvent::MouseOver => "mouseover",
            LayerEvent::MouseOut => "mouseout",
            LayerEvent::ContextMenu => "contextmenu",
            LayerEvent::Add => "add",
            LayerEvent::Remove => "remove",
            LayerEvent::PopupOpen => "popupopen",
            LayerEvent::PopupClose => "popupclose",
            LayerEvent::TooltipOpen => "tooltipopen",
            LayerEvent::TooltipClose => "tooltipclose",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for LayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a subscribed callback receives.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerEventPayload {
    pub event: LayerEvent,
    /// Child layer the event targeted, if any.
    pub layer: Option<usize>,
    /// GeoJSON `properties` of the targeted feature.
    pub properties: Option<Value>,
}

pub type LayerCallback = Callback<LayerEventPayload>;

/// Declared event callbacks of one render.
///
/// Callbacks are compared by identity between renders. Keep a
/// [`LayerCallback`] around and pass it with [`with`](Self::with) to avoid
/// re-subscribing on every render.
#[derive(Clone, Debug, Default)]
pub struct LayerEvents {
    map: EventMap<LayerEvent, LayerEventPayload>,
}

impl LayerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, event: LayerEvent, callback: &LayerCallback) -> Self {
        self.map.insert(event, callback.clone());
        self
    }

    /// Subscribe a fresh closure; its identity is new on every call.
    pub fn on(self, event: LayerEvent, f: impl Fn(&LayerEventPayload) + 'static) -> Self {
        self.with(event, &Callback::new(f))
    }

    pub fn as_map(&self) -> &EventMap<LayerEvent, LayerEventPayload> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
