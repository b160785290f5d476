//! The finishing pipeline.
//!
//! A render opens the item's image into the default buffer, runs every
//! effectively enabled finishing of the frame in tree order followed by the
//! watermark steps, and encodes whatever the default buffer holds at the
//! end. Each step selects its input buffers, is evaluated against the
//! current render state and stores its result under its output names.
//!
//! A stored step naming an unknown plugin is skipped. Any other failure
//! aborts the render; buffers opened so far are released either way.

use crate::adapter::{ImageAdapter, ImageContainer};
use crate::core::error::{AdapterError, RenderError};
use crate::core::model::{Display, Finishing, Frame, FrameContext, Item, PluginModel, DEFAULT_IMAGE_NAME};
use crate::core::value::Value;
use crate::execution::context::RenderContext;
use crate::execution::options::RenderOptions;
use crate::expression::{Context, EnvironmentResolver, MapResolver, ObjectResolver};
use crate::plugins::contexts::{ContextPlugin, ContextRegistry};
use crate::plugins::finishings::{FinishingPlugin, FinishingRegistry};
use crate::plugins::registry::Records;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexMap;
use log::{debug, info};

// ============================================================================
// Request and Result
// ============================================================================

/// Records a single render reads.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Display the image is rendered for.
    pub display: &'a Display,
    /// Frame owning the finishings.
    pub frame: &'a Frame,
    /// Item whose image is rendered.
    pub item: &'a Item,
    /// Finishings of the frame; none means only the watermark runs.
    pub finishings: Option<Records<'a, Finishing>>,
    /// Context records of the frame.
    pub contexts: &'a [FrameContext],
}

impl<'a> RenderRequest<'a> {
    /// Create a request without finishings or contexts.
    pub fn new(display: &'a Display, frame: &'a Frame, item: &'a Item) -> Self {
        Self {
            display,
            frame,
            item,
            finishings: None,
            contexts: &[],
        }
    }

    /// Set the frame's finishings (a tree or a flat list).
    pub fn with_finishings(mut self, finishings: impl Into<Records<'a, Finishing>>) -> Self {
        self.finishings = Some(finishings.into());
        self
    }

    /// Set the frame's context records.
    pub fn with_contexts(mut self, contexts: &'a [FrameContext]) -> Self {
        self.contexts = contexts;
        self
    }
}

/// Encoded output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Final image in its output format.
    pub data: Vec<u8>,
    /// Downscaled copy in the same format.
    pub preview: Vec<u8>,
    /// Final width in pixels.
    pub width: u32,
    /// Final height in pixels.
    pub height: u32,
    /// MIME type of both encodings.
    pub mime: String,
}

impl ProcessingResult {
    /// Preview as a `data:` URL.
    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.preview))
    }

    /// Final image as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Runs the finishing pipeline of a frame over an item.
pub struct FinishingProcessor<'r> {
    adapter: &'r dyn ImageAdapter,
    finishings: &'r FinishingRegistry,
    contexts: &'r ContextRegistry,
    options: RenderOptions,
}

impl<'r> FinishingProcessor<'r> {
    /// Create a processor with default options.
    pub fn new(adapter: &'r dyn ImageAdapter, finishings: &'r FinishingRegistry, contexts: &'r ContextRegistry) -> Self {
        Self {
            adapter,
            finishings,
            contexts,
            options: RenderOptions::default(),
        }
    }

    /// Set render options.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Get render options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render an item. Returns `None` when the item has no URL or the
    /// display or frame is disabled.
    pub fn process(&self, request: &RenderRequest<'_>) -> Result<Option<ProcessingResult>, RenderError> {
        let Some(url) = request.item.url.as_deref().filter(|_| request.item.has_url()) else {
            debug!("Item {} has no URL, nothing to render", request.item.id);
            return Ok(None);
        };
        if !request.display.enabled || !request.frame.enabled {
            debug!(
                "Display '{}' or frame '{}' is disabled, nothing to render",
                request.display.name, request.frame.name
            );
            return Ok(None);
        }
        info!("Finishing '{}' for display '{}'", url, request.display.name);

        let watermark = self
            .options
            .watermark
            .finishings(self.options.watermark_shift, self.options.watermark_scale);
        let mut steps = match request.finishings {
            Some(records) => self.finishings.get_enabled(records),
            None => Vec::new(),
        };
        steps.extend(self.finishings.get_all(&watermark));
        let contexts = self.contexts.get_enabled(request.contexts);

        let mut ctx = RenderContext::new(
            self.adapter,
            Context::with_limits(self.options.limits),
            request.display,
            request.frame,
            request.item,
        );
        let source = self.adapter.open(url, None).map_err(RenderError::Open)?;
        ctx.insert_buffer(DEFAULT_IMAGE_NAME, source);

        let instances = Instances::collect(&steps, &contexts);
        instances.enter();
        let result = steps
            .iter()
            .try_for_each(|(plugin, finishing)| self.run_step(&mut ctx, plugin, finishing, &contexts))
            .and_then(|()| self.finalize(&mut ctx));
        instances.leave();
        result.map(Some)
    }

    fn run_step(
        &self,
        ctx: &mut RenderContext<'_>,
        plugin: &FinishingPlugin,
        finishing: &Finishing,
        contexts: &[(&ContextPlugin, &FrameContext)],
    ) -> Result<(), RenderError> {
        let step = step_name(finishing);
        let inputs = ctx.resolve_inputs(&finishing.image_names_in());
        let outputs = finishing.image_names_out();
        debug!("Step '{}': {:?} -> {:?}", step, inputs, outputs);

        // evaluated while every buffer, the inputs included, is still in the set
        self.register_resolvers(ctx, inputs.first().map(String::as_str));
        self.run_contexts(ctx, contexts)?;
        let config = ctx
            .expressions()
            .evaluate_model(finishing)
            .map_err(|source| RenderError::Evaluate {
                step: step.clone(),
                source,
            })?;

        let mut image = ctx.take_inputs(&inputs, &outputs);
        let result = match plugin.run(finishing, &config, &mut image, ctx) {
            Ok(Some(output)) if !output.is_empty() => {
                self.adapter.close(image);
                debug!("Step '{}' produced {:?}", step, output);
                output
            }
            Ok(Some(empty)) => {
                debug!("Step '{}' produced no image, keeping its input", step);
                self.adapter.close(empty);
                image
            }
            Ok(None) => image,
            Err(source) => {
                self.adapter.close(image);
                return Err(RenderError::Step { step, source });
            }
        };
        ctx.store(&outputs, result);
        Ok(())
    }

    /// Expose the render state to the step about to be evaluated. `input`
    /// is the first input buffer of the step, which defines `image` and
    /// `exif`.
    fn register_resolvers(&self, ctx: &RenderContext<'_>, input: Option<&str>) {
        let expressions = ctx.expressions();
        expressions.set_resolver("display", ObjectResolver::new(ctx.display()));
        expressions.set_resolver("frame", ObjectResolver::new(ctx.frame()));
        expressions.set_resolver("item", ObjectResolver::new(ctx.item()));
        expressions.set_resolver("var", MapResolver::new(IndexMap::new()));
        expressions.set_resolver("env", EnvironmentResolver);

        let image = input.and_then(|name| ctx.buffer(name));
        let meta = image
            .and_then(|image| self.adapter.meta(image).ok())
            .map(|m| m.to_map())
            .unwrap_or_default();
        expressions.set_resolver("image", MapResolver::new(meta));

        let images: IndexMap<String, Value> = ctx
            .buffer_names()
            .filter_map(|name| {
                let meta = self.adapter.meta(ctx.buffer(name)?).ok()?;
                Some((name.to_string(), Value::Map(meta.to_map())))
            })
            .collect();
        expressions.set_resolver("images", MapResolver::new(images));
        let exif = image.map(|image| self.adapter.exif(image)).unwrap_or_default();
        expressions.set_resolver("exif", MapResolver::new(exif));
    }

    fn run_contexts(
        &self,
        ctx: &RenderContext<'_>,
        contexts: &[(&ContextPlugin, &FrameContext)],
    ) -> Result<(), RenderError> {
        for (plugin, record) in contexts {
            let step = step_name(*record);
            let config = ctx
                .expressions()
                .evaluate_model(*record)
                .map_err(|source| RenderError::Evaluate {
                    step: step.clone(),
                    source,
                })?;
            let contributed = plugin
                .run(record, &config, ctx)
                .map_err(|source| RenderError::Step { step, source })?;
            for (name, resolver) in contributed {
                ctx.expressions().set_shared_resolver(name, resolver);
            }
        }
        Ok(())
    }

    fn finalize(&self, ctx: &mut RenderContext<'_>) -> Result<ProcessingResult, RenderError> {
        let mut image = ctx
            .take_buffer(DEFAULT_IMAGE_NAME)
            .ok_or(RenderError::Finalize(AdapterError::EmptyContainer))?;
        if let Some(format) = self.options.output_format() {
            image = image.with_format(format);
        }
        let result = self.encode(&image);
        self.adapter.close(image);
        result
    }

    fn encode(&self, image: &ImageContainer) -> Result<ProcessingResult, RenderError> {
        let data = self.adapter.data(image).map_err(RenderError::Finalize)?;
        let meta = self.adapter.meta(image).map_err(RenderError::Finalize)?;

        let mut preview = self.adapter.clone_image(image);
        let (width, height) = self.options.preview_size;
        self.adapter.resize(&mut preview, width, height, true);
        let preview_data = self.adapter.data(&preview);
        self.adapter.close(preview);
        let preview = preview_data.map_err(RenderError::Finalize)?;

        info!("Result: {}x{} pixels, {} bytes", meta.width, meta.height, data.len());
        Ok(ProcessingResult {
            data,
            preview,
            width: meta.width,
            height: meta.height,
            mime: meta.mime,
        })
    }
}

impl std::fmt::Debug for FinishingProcessor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishingProcessor")
            .field("finishings", &self.finishings.len())
            .field("contexts", &self.contexts.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Title of a record, or its plugin key when untitled.
fn step_name<M: PluginModel>(model: &M) -> String {
    if model.title().is_empty() {
        model.plugin().to_string()
    } else {
        model.title().to_string()
    }
}

/// Implementation instances used by one render. Each is entered once before
/// the first step and left once after the last.
struct Instances<'p> {
    finishings: Vec<(&'p FinishingPlugin, String)>,
    contexts: Vec<(&'p ContextPlugin, String)>,
}

impl<'p> Instances<'p> {
    fn collect(steps: &[(&'p FinishingPlugin, &Finishing)], contexts: &[(&'p ContextPlugin, &FrameContext)]) -> Self {
        let mut instances = Self {
            finishings: Vec::new(),
            contexts: Vec::new(),
        };
        for (plugin, model) in steps {
            let key = (*plugin, model.instance_name());
            if !instances.finishings.iter().any(|(p, i)| p.name() == key.0.name() && *i == key.1) {
                instances.finishings.push(key);
            }
        }
        for (plugin, model) in contexts {
            let key = (*plugin, model.instance_name());
            if !instances.contexts.iter().any(|(p, i)| p.name() == key.0.name() && *i == key.1) {
                instances.contexts.push(key);
            }
        }
        instances
    }

    fn enter(&self) {
        self.finishings.iter().for_each(|(plugin, instance)| plugin.enter(instance));
        self.contexts.iter().for_each(|(plugin, instance)| plugin.enter(instance));
    }

    fn leave(&self) {
        self.finishings.iter().for_each(|(plugin, instance)| plugin.leave(instance));
        self.contexts.iter().for_each(|(plugin, instance)| plugin.leave(instance));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::{Counters, RecordingAdapter};
    use crate::core::error::{PluginError, PluginResult};
    use crate::execution::watermark::WatermarkStyle;
    use crate::expression::Evaluated;
    use crate::plugins::finishings::FinishingImplementation;
    use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};
    use crate::tree::FinishingTree;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixture {
        adapter: RecordingAdapter,
        finishings: FinishingRegistry,
        contexts: ContextRegistry,
        display: Display,
        frame: Frame,
        item: Item,
    }

    impl Fixture {
        fn new(url: &str) -> Self {
            Self {
                adapter: RecordingAdapter::new(),
                finishings: FinishingRegistry::with_builtins(),
                contexts: ContextRegistry::with_builtins(),
                display: Display::new("kitchen", 800, 480),
                frame: Frame::new("holidays"),
                item: Item::new(url),
            }
        }

        fn processor(&self) -> FinishingProcessor<'_> {
            FinishingProcessor::new(&self.adapter, &self.finishings, &self.contexts)
                .with_options(RenderOptions::new().without_watermark())
        }

        fn request(&self) -> RenderRequest<'_> {
            RenderRequest::new(&self.display, &self.frame, &self.item)
        }
    }

    fn tree(steps: Vec<Finishing>) -> FinishingTree {
        let mut tree = FinishingTree::default();
        for step in steps {
            tree.append(None, step).unwrap();
        }
        tree
    }

    fn resize(x: &str, y: &str) -> Finishing {
        Finishing::new("resize")
            .with_config("resize_x", x)
            .with_config("resize_y", y)
            .with_config("keep_aspect", true)
    }

    #[test]
    fn test_resize_keeps_aspect() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![resize("100", "100")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
        assert_eq!(result.mime, "image/png");
        assert!(result.preview_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_nothing_to_render() {
        let mut fixture = Fixture::new("mem://4x4");
        fixture.item.url = None;
        assert!(fixture.processor().process(&fixture.request()).unwrap().is_none());

        let mut fixture = Fixture::new("mem://4x4");
        fixture.display.enabled = false;
        assert!(fixture.processor().process(&fixture.request()).unwrap().is_none());

        let mut fixture = Fixture::new("mem://4x4");
        fixture.frame.enabled = false;
        assert!(fixture.processor().process(&fixture.request()).unwrap().is_none());
        assert_eq!(Counters::get(&fixture.adapter.counters.opened), 0);
    }

    #[test]
    fn test_missing_input_is_skipped() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![resize("10", "10").with_image_in("missing")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (400, 200));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_unknown_plugin_is_skipped() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![Finishing::new("sepia"), resize("200", "")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (200, 100));
    }

    #[test]
    fn test_disabled_group_is_skipped() {
        let fixture = Fixture::new("mem://400x200");
        let mut steps = FinishingTree::default();
        let group = steps
            .append(None, Finishing::new("group").with_enabled(false))
            .unwrap();
        steps.append(Some(group), resize("10", "10")).unwrap();
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!(result.width, 400);
    }

    #[test]
    fn test_aliased_outputs_stay_independent() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![
            resize("100", "100").with_image_out("default copy"),
            resize("10", "10").with_image_in("copy").with_image_out("copy"),
        ]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_templates_see_other_buffers() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![
            Finishing::new("image")
                .with_config("url", "mem://30x20")
                .with_image_out("logo"),
            Finishing::new("resize")
                .with_config("resize_x", "{images[\"logo\"][\"width\"]}")
                .with_config("resize_y", "{images[\"logo\"][\"height\"]}"),
        ]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (30, 20));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_context_variables() {
        let fixture = Fixture::new("mem://400x200");
        let mut variables = IndexMap::new();
        variables.insert("quarter".to_string(), Value::from("{image[\"width\"] / 4}"));
        let contexts = vec![FrameContext::new("vars", "layout").with_config("variables", Value::Map(variables))];
        let steps = tree(vec![resize("{layout[\"quarter\"]}", "")]);
        let request = fixture.request().with_finishings(&steps).with_contexts(&contexts);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
    }

    #[test]
    fn test_in_place_steps_see_default_buffer() {
        let fixture = Fixture::new("mem://400x200");
        let half = "{images[\"default\"][\"width\"] / 2}";
        let steps = tree(vec![resize(half, ""), resize(half, "")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_in_place_steps_see_exif() {
        let fixture = Fixture::new("mem://400x200#imagewidth=200");
        let steps = tree(vec![
            resize("{exif[\"imagewidth\"]}", ""),
            resize("{exif[\"imagewidth\"] / 4}", ""),
        ]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (50, 25));

        // the exif context reads the same buffer
        let contexts = vec![FrameContext::new("exif", "").with_config("image", "default")];
        let request = request.with_contexts(&contexts);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (50, 25));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[test]
    fn test_missing_values_pass_through_arithmetic() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![resize("{image[\"missing\"] + 100}", "")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
    }

    #[test]
    fn test_evaluation_error_names_field() {
        let fixture = Fixture::new("mem://400x200");
        let steps = tree(vec![resize("{1 +}", "10").with_title("broken")]);
        let request = fixture.request().with_finishings(&steps);
        let err = fixture.processor().process(&request).unwrap_err();
        assert_eq!(err.step(), Some("broken"));
        match err {
            RenderError::Evaluate { source, .. } => assert_eq!(source.field(), Some("resize_x")),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    struct Explode;

    impl Lifecycle for Explode {}

    impl FinishingImplementation for Explode {
        fn run(
            &mut self,
            _config: &Evaluated,
            _image: &mut ImageContainer,
            _ctx: &RenderContext<'_>,
        ) -> PluginResult<Option<ImageContainer>> {
            Err(PluginError::Execution {
                plugin: "explode".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_failing_step_aborts_and_releases() {
        let mut fixture = Fixture::new("mem://400x200");
        fixture
            .finishings
            .register(Plugin::new(PluginMetadata::new("explode", "Explode", "Always fails"), || {
                Box::new(Explode) as Box<dyn FinishingImplementation>
            }));
        let steps = tree(vec![
            Finishing::new("image").with_config("url", "mem://8x8").with_image_out("logo"),
            Finishing::new("explode").with_image_in("default logo"),
            resize("10", "10"),
        ]);
        let request = fixture.request().with_finishings(&steps);
        let err = fixture.processor().process(&request).unwrap_err();
        assert!(matches!(err, RenderError::Step { .. }));
        assert_eq!(err.step(), Some("explode"));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    struct Vanish;

    impl Lifecycle for Vanish {}

    impl FinishingImplementation for Vanish {
        fn run(
            &mut self,
            _config: &Evaluated,
            _image: &mut ImageContainer,
            _ctx: &RenderContext<'_>,
        ) -> PluginResult<Option<ImageContainer>> {
            Ok(Some(ImageContainer::new()))
        }
    }

    #[test]
    fn test_empty_result_keeps_input() {
        let mut fixture = Fixture::new("mem://400x200");
        fixture
            .finishings
            .register(Plugin::new(PluginMetadata::new("vanish", "Vanish", "Yields nothing"), || {
                Box::new(Vanish) as Box<dyn FinishingImplementation>
            }));
        let steps = tree(vec![Finishing::new("vanish"), resize("100", "100")]);
        let request = fixture.request().with_finishings(&steps);
        let result = fixture.processor().process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (100, 50));
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }

    #[derive(Clone, Default)]
    struct Hooks {
        entered: Arc<AtomicUsize>,
        left: Arc<AtomicUsize>,
    }

    impl Lifecycle for Hooks {
        fn enter(&mut self) {
            self.entered.fetch_add(1, Ordering::SeqCst);
        }

        fn leave(&mut self) {
            self.left.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FinishingImplementation for Hooks {
        fn run(
            &mut self,
            _config: &Evaluated,
            _image: &mut ImageContainer,
            _ctx: &RenderContext<'_>,
        ) -> PluginResult<Option<ImageContainer>> {
            Ok(None)
        }
    }

    #[test]
    fn test_lifecycle_once_per_render() {
        let mut fixture = Fixture::new("mem://4x4");
        let hooks = Hooks::default();
        let factory = hooks.clone();
        fixture.finishings.register(Plugin::new(
            PluginMetadata::new("hooks", "Hooks", "Counts lifecycle calls"),
            move || Box::new(factory.clone()) as Box<dyn FinishingImplementation>,
        ));
        let steps = tree(vec![Finishing::new("hooks"), Finishing::new("hooks")]);
        let request = fixture.request().with_finishings(&steps);
        fixture.processor().process(&request).unwrap();
        assert_eq!(hooks.entered.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.left.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watermark_is_drawn() {
        let fixture = Fixture::new("mem://400x200");
        let processor = FinishingProcessor::new(&fixture.adapter, &fixture.finishings, &fixture.contexts)
            .with_options(RenderOptions::new().with_watermark(WatermarkStyle::HBars));
        let result = processor.process(&fixture.request()).unwrap().unwrap();
        let decoded = image::load_from_memory(&result.data).unwrap().to_rgba8();
        assert_ne!(decoded.get_pixel(200, 16).0, [255, 255, 255, 255]);
        assert_eq!(decoded.get_pixel(200, 100).0, [255, 255, 255, 255]);
        assert_eq!(fixture.adapter.outstanding_frames(), 0);
    }
}
