//! Per-render state shared by the processor and the plugins it runs.
//!
//! A [`RenderContext`] owns the named image buffers of one render and the
//! expression context their steps are evaluated in. Several names can refer
//! to the same buffer (a step with more than one output name). Every buffer
//! still held when the context is dropped is closed through the adapter, so
//! a render that fails half way releases what it opened.

use crate::adapter::{ImageAdapter, ImageContainer};
use crate::core::model::{Display, Frame, Item};
use crate::expression::Context;
use indexmap::IndexMap;
use log::{trace, warn};
use std::rc::Rc;

/// Buffers and expression context of a single render.
pub struct RenderContext<'a> {
    adapter: &'a dyn ImageAdapter,
    expressions: Context,
    buffers: IndexMap<String, Rc<ImageContainer>>,
    display: &'a Display,
    frame: &'a Frame,
    item: &'a Item,
}

impl<'a> RenderContext<'a> {
    /// Create a context without buffers.
    pub fn new(
        adapter: &'a dyn ImageAdapter,
        expressions: Context,
        display: &'a Display,
        frame: &'a Frame,
        item: &'a Item,
    ) -> Self {
        Self {
            adapter,
            expressions,
            buffers: IndexMap::new(),
            display,
            frame,
            item,
        }
    }

    /// Image adapter of the render.
    pub fn adapter(&self) -> &'a dyn ImageAdapter {
        self.adapter
    }

    /// Expression context steps are evaluated in.
    pub fn expressions(&self) -> &Context {
        &self.expressions
    }

    pub fn display(&self) -> &'a Display {
        self.display
    }

    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    pub fn item(&self) -> &'a Item {
        self.item
    }

    /// Buffer stored under `name`.
    pub fn buffer(&self, name: &str) -> Option<&ImageContainer> {
        self.buffers.get(name).map(Rc::as_ref)
    }

    /// Names of all buffers in creation order.
    pub fn buffer_names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Whether two names refer to the same buffer.
    pub fn is_aliased(&self, a: &str, b: &str) -> bool {
        match (self.buffers.get(a), self.buffers.get(b)) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Store a buffer under one name, closing whatever it replaces.
    pub fn insert_buffer(&mut self, name: impl Into<String>, image: ImageContainer) {
        self.store(&[name.into()], image);
    }

    /// Names of `requested` that hold a buffer. Missing names are logged and
    /// left out.
    pub fn resolve_inputs(&self, requested: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|name| {
                let present = self.buffers.contains_key(name.as_str());
                if !present {
                    warn!("Image '{}' does not exist, skipping it as input", name);
                }
                present
            })
            .cloned()
            .collect()
    }

    /// Collect the input buffers of a step into one container.
    ///
    /// Inputs the step also writes are moved out of the buffer set (copied
    /// when another name still refers to them); every other input is copied
    /// so the step can not change a buffer it does not own.
    pub fn take_inputs(&mut self, inputs: &[String], outputs: &[String]) -> ImageContainer {
        let mut image = ImageContainer::new();
        for name in inputs {
            if outputs.contains(name) {
                let Some(shared) = self.buffers.shift_remove(name) else {
                    continue;
                };
                match Rc::try_unwrap(shared) {
                    Ok(owned) => image.absorb(owned),
                    Err(shared) => image.absorb(self.adapter.clone_image(&shared)),
                }
            } else if let Some(shared) = self.buffers.get(name) {
                trace!("Cloning image '{}' for a step that does not write it", name);
                image.absorb(self.adapter.clone_image(shared));
            }
        }
        image
    }

    /// Store a step result under every output name. Buffers previously held
    /// under those names are closed unless still referenced elsewhere. An
    /// empty result is closed instead of stored.
    pub fn store(&mut self, outputs: &[String], image: ImageContainer) {
        if image.is_empty() {
            self.adapter.close(image);
            return;
        }
        let shared = Rc::new(image);
        for name in outputs {
            if let Some(previous) = self.buffers.insert(name.clone(), Rc::clone(&shared)) {
                self.release(previous);
            }
        }
        if outputs.is_empty() {
            self.release(shared);
        }
    }

    /// Remove a buffer from the set, copying it when other names still
    /// refer to it.
    pub fn take_buffer(&mut self, name: &str) -> Option<ImageContainer> {
        let shared = self.buffers.shift_remove(name)?;
        Some(match Rc::try_unwrap(shared) {
            Ok(owned) => owned,
            Err(shared) => self.adapter.clone_image(&shared),
        })
    }

    /// Close a buffer if this was its last reference.
    fn release(&self, shared: Rc<ImageContainer>) {
        if let Ok(owned) = Rc::try_unwrap(shared) {
            self.adapter.close(owned);
        }
    }
}

impl Drop for RenderContext<'_> {
    fn drop(&mut self) {
        let buffers: Vec<Rc<ImageContainer>> = self.buffers.drain(..).map(|(_, image)| image).collect();
        for image in buffers {
            self.release(image);
        }
    }
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("buffers", &self.buffers)
            .field("expressions", &self.expressions)
            .finish()
    }
}
