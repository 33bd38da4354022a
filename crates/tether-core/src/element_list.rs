//! Keyed occurrences of one component, as a host renders a list.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::collections::SeenKeys;
use crate::element::{Component, Element, RenderInput, RenderReport};
use crate::error::RenderError;
use crate::handle::HandleSlot;
use crate::runtime::RuntimeHandle;
use crate::update::ReconcileOptions;

/// Elements keyed by list key.
///
/// Each commit renders some keys; keys not rendered by the end of the commit
/// are torn down. A key that comes back later gets a fresh node identity.
pub struct ElementList<C: Component, K> {
    runtime: RuntimeHandle,
    options: ReconcileOptions,
    entries: IndexMap<K, Element<C>>,
}

impl<C, K> ElementList<C, K>
where
    C: Component,
    K: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self {
            runtime,
            options: ReconcileOptions::default(),
            entries: IndexMap::new(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&Element<C>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn commit(&mut self) -> ListCommit<'_, C, K> {
        ListCommit {
            list: self,
            seen: SeenKeys::default(),
            finished: false,
        }
    }
}

impl<C: Component, K> fmt::Debug for ElementList<C, K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementList")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One host commit over an [`ElementList`].
///
/// Dropping the commit finishes it.
pub struct ListCommit<'a, C: Component, K>
where
    K: Clone + Eq + Hash + fmt::Debug,
{
    list: &'a mut ElementList<C, K>,
    seen: SeenKeys<K>,
    finished: bool,
}

impl<C, K> ListCommit<'_, C, K>
where
    C: Component,
    K: Clone + Eq + Hash + fmt::Debug,
{
    pub fn render(&mut self, key: K, input: RenderInput<'_, C>) -> Result<RenderReport<C>, RenderError> {
        self.render_with_handle(key, input, None)
    }

    /// Render `key` and publish its peer into `handle`.
    ///
    /// The slot is re-pointed on every call; passing `None` (or calling
    /// [`render`](Self::render)) empties a slot given earlier.
    pub fn render_with_handle(
        &mut self,
        key: K,
        input: RenderInput<'_, C>,
        handle: Option<&HandleSlot<C::Peer>>,
    ) -> Result<RenderReport<C>, RenderError> {
        self.seen.insert(key.clone());
        let runtime = &self.list.runtime;
        let options = self.list.options;
        let element = self
            .list
            .entries
            .entry(key.clone())
            .or_insert_with(|| Element::new(runtime.clone()).with_options(options));
        element.set_handle(handle.cloned());
        element
            .render(input)
            .inspect_err(|err| log::error!("list entry {key:?}: {err}"))
    }

    /// Tear down every entry not rendered in this commit.
    pub fn finish(mut self) -> Vec<K> {
        self.sweep()
    }

    fn sweep(&mut self) -> Vec<K> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let stale: Vec<K> = self
            .list
            .entries
            .keys()
            .filter(|key| !self.seen.contains(*key))
            .cloned()
            .collect();
        for key in &stale {
            if let Some(mut element) = self.list.entries.shift_remove(key) {
                log::debug!("list entry {key:?} removed; tearing down {}", element.identity());
                element.teardown();
            }
        }
        stale
    }
}

impl<C, K> Drop for ListCommit<'_, C, K>
where
    C: Component,
    K: Clone + Eq + Hash + fmt::Debug,
{
    fn drop(&mut self) {
        self.sweep();
    }
}
