//! Wayfinder: a hierarchical state router
//!
//! Applications are described as a tree of named states (`app`,
//! `app.users`, `app.users.detail`). Each state may declare a URL fragment,
//! typed parameters, views and async resolvables. Navigating moves the
//! router from its committed path to a target through a phased transition
//! pipeline that hooks can observe, cancel or redirect. Starting a new
//! transition supersedes the running one; only the current transition may
//! commit.
//!
//! # Core Concepts
//!
//! - **States**: declared with [`StateBuilder`](builder::StateBuilder),
//!   registered in a [`StateRegistry`](core::StateRegistry)
//! - **Params and URLs**: [`params`] and [`url`] map between typed values and URL text
//! - **Resolvables**: async producers with dependencies, see [`resolve`]
//! - **Transitions**: the phased pipeline and its hooks, see [`transition`]
//! - **Router**: the entry point tying them together, see [`router`]
//!
//! # Example
//!
//! ```rust
//! use wayfinder::builder::StateBuilder;
//! use wayfinder::params;
//! use wayfinder::router::RouterBuilder;
//!
//! let router = RouterBuilder::new()
//!     .state(StateBuilder::new("home").url("/home").build())
//!     .state(StateBuilder::new("about").url("/about").build())
//!     .build()
//!     .unwrap();
//!
//! let outcome = futures::executor::block_on(router.go("about", params! {}));
//! assert!(outcome.is_success());
//! assert_eq!(router.current().name(), "about");
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod params;
pub mod resolve;
pub mod router;
pub mod transition;
pub mod url;

// Used by the `params!` macro
pub use serde_json;

// Re-export commonly used types
pub use builder::StateBuilder;
pub use core::{State, StateDeclaration, TargetState, TransitionOptions};
pub use router::{Router, RouterBuilder, RouterConfig};
pub use transition::{HookCallback, HookResult, MatchCriteria, Outcome, TransitionError};
