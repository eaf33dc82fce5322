//! Report rendering.
//!
//! A cached template plus caller data goes to a [`RenderEngine`]; the
//! resulting report can optionally be cached next to its template. The engine
//! itself is an external program ([`CommandRenderEngine`]) and stays behind a
//! trait so the HTTP layer and tests can swap it.

mod command;
mod dispatch;
mod naming;
mod types;

pub use command::CommandRenderEngine;
pub use dispatch::{RenderService, RenderServiceError, RenderedReport};
pub use naming::resolve_target;
pub use types::{RenderEngine, RenderError, RenderJob, RenderOptions, RenderTarget};

pub(crate) use dispatch::METRIC_RENDER_MS;
