//! Asynchronous, dependency-ordered state data.
//!
//! States declare [`Resolvable`]s; a [`ResolveContext`] evaluates them for
//! one transition, shallowest node first, running independent keys
//! concurrently and memoizing every value.

mod context;
mod injector;
mod resolvable;

pub use context::ResolveContext;
pub(crate) use context::Progress;
pub use injector::Injector;
pub use resolvable::{
    ResolveArgs, ResolveError, ResolveFailure, ResolveFn, ResolveFuture, ResolvePolicy, Resolvable,
};
