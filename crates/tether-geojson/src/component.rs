use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde_json::Value;
use tether_core::{
    Callback, Component, ConstructionError, ContainerRef, Element, HandleSlot, HandlerTable,
    LayerGroup, PeerHandle, Props, ReconcileOptions, RenderError, RenderInput, RenderReport,
    RuntimeHandle,
};

use crate::events::LayerEvents;
use crate::layer::GeoJsonLayer;
use crate::options::{GeoJsonOptions, PathStyle};

/// Declared state of a GeoJSON layer.
///
/// `data` is compared by reference: pass a new `Rc` to replace the features,
/// reuse the old one to keep them.
#[derive(Clone, Debug, Props)]
pub struct GeoJsonProps {
    #[props(ptr_eq)]
    pub data: Rc<Value>,
    pub style: Option<PathStyle>,
    pub pane: String,
    pub attribution: Option<String>,
    pub interactive: bool,
    pub bubbling_mouse_events: bool,
    pub markers_inherit_options: bool,
}

impl GeoJsonProps {
    pub fn new(data: Value) -> Self {
        Self::with_options(Rc::new(data), GeoJsonOptions::default())
    }

    pub fn with_options(data: Rc<Value>, options: GeoJsonOptions) -> Self {
        Self {
            data,
            style: None,
            pane: options.pane,
            attribution: options.attribution,
            interactive: options.interactive,
            bubbling_mouse_events: options.bubbling_mouse_events,
            markers_inherit_options: options.markers_inherit_options,
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Rc::new(data);
        self
    }

    pub fn style(mut self, style: PathStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn options(&self) -> GeoJsonOptions {
        GeoJsonOptions {
            pane: self.pane.clone(),
            attribution: self.attribution.clone(),
            interactive: self.interactive,
            bubbling_mouse_events: self.bubbling_mouse_events,
            markers_inherit_options: self.markers_inherit_options,
        }
    }
}

/// Binds [`GeoJsonProps`] to a layer implementation.
pub struct GeoJsonComponent<L>(PhantomData<fn() -> L>);

impl<L: GeoJsonLayer> Component for GeoJsonComponent<L> {
    type Peer = L;
    type Props = GeoJsonProps;

    fn construct(props: &GeoJsonProps) -> Result<L, ConstructionError> {
        L::create(&props.data, props.style.as_ref(), &props.options())
    }

    fn handlers() -> HandlerTable<L, GeoJsonProps> {
        HandlerTable::new()
            // New features must wait for the layer library's own update pass.
            .on_structural(
                GeoJsonPropsField::Data,
                |props: &GeoJsonProps| &props.data,
                L::clear_layers,
                |layer: &mut L, data: Rc<Value>| match layer.add_data(&data) {
                    Ok(added) => log::trace!("added {added} GeoJSON layers"),
                    Err(err) => log::warn!("discarding GeoJSON data: {err}"),
                },
            )
            .on_field(
                GeoJsonPropsField::Style,
                |props: &GeoJsonProps| &props.style,
                |_, next, layer: &mut L| {
                    layer.set_style(&next.clone().unwrap_or_default());
                    Ok(())
                },
            )
            .catch_all(|changes, layer: &mut L| {
                layer.set_options(&changes.next().options());
                Ok(())
            })
    }

    fn requires_rebuild(prev: &GeoJsonProps, next: &GeoJsonProps) -> bool {
        prev.pane != next.pane
    }
}

/// GeoJSON layer element.
pub struct GeoJson<L: GeoJsonLayer> {
    element: Element<GeoJsonComponent<L>>,
}

impl<L: GeoJsonLayer> GeoJson<L> {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self {
            element: Element::new(runtime),
        }
    }

    pub fn with_options(self, options: ReconcileOptions) -> Self {
        Self {
            element: self.element.with_options(options),
        }
    }

    /// Expose the live layer through `slot`.
    pub fn with_ref(self, slot: HandleSlot<L>) -> Self {
        Self {
            element: self.element.with_handle(slot),
        }
    }

    /// Reconcile the layer against `props` and `events`.
    ///
    /// `on_each_layer` runs over every child layer when the layer or the
    /// callback changed since the last render.
    pub fn render(
        &mut self,
        container: &ContainerRef<L>,
        props: &GeoJsonProps,
        events: &LayerEvents,
        on_each_layer: Option<&Callback<<L as LayerGroup>::Layer>>,
    ) -> Result<RenderReport<GeoJsonComponent<L>>, RenderError> {
        let report = self.element.render(RenderInput {
            container,
            props,
            events: events.as_map(),
        })?;
        self.element.visit_layers(on_each_layer);
        Ok(report)
    }

    pub fn layer(&self) -> Option<&PeerHandle<L>> {
        self.element.peer()
    }

    pub fn element(&self) -> &Element<GeoJsonComponent<L>> {
        &self.element
    }

    pub fn teardown(&mut self) {
        self.element.teardown();
    }
}

impl<L: GeoJsonLayer> fmt::Debug for GeoJson<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoJson")
            .field("element", &self.element)
            .finish()
    }
}
