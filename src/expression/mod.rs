//! Template expressions evaluated against layered resolvers.
//!
//! Plugin configuration is stored as strings that may embed `{expression}`
//! segments. Before a step runs, every field is rendered through a
//! [`Context`] holding the resolvers of the current render (display, frame,
//! item, image metadata, EXIF, environment, frame variables).

pub mod context;
pub mod resolver;
pub mod template;

pub use context::{Context, Evaluated, SandboxLimits};
pub use resolver::{
    ChainedResolver, EnvironmentResolver, EvaluatedResolver, MapResolver, ObjectResolver, Resolver,
    SharedResolver,
};
pub use template::{Segment, Template};
