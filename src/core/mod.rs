//! Core state tree types and logic.
//!
//! This module contains the pure part of the router:
//! - Registered states and the validated [`StateRegistry`]
//! - Navigation targets and their options
//! - Paths through the tree and the diff between two of them
//! - Guard predicates for hook criteria
//! - Immutable navigation history
//!
//! Nothing here performs I/O or awaits; the async pipeline lives in
//! [`transition`](crate::transition).

mod guard;
mod history;
mod path;
mod registry;
mod state;
mod target;

pub use guard::Guard;
pub use history::{Location, NavigationHistory, NavigationRecord};
pub use path::{Locals, Path, PathNode, TreeChanges};
pub use registry::StateRegistry;
pub use state::{State, StateDeclaration, ViewDeclaration, DEFAULT_VIEW};
pub use target::{InvalidTarget, LocationMode, Reload, TargetState, TransitionOptions};
