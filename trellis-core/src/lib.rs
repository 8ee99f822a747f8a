//! Trellis Core
//!
//! This crate provides the reconciler of the Trellis declarative UI
//! runtime. Given a tree of immutable element descriptions, it maintains a
//! persistent tree of work nodes, computes the minimal set of host
//! mutations between two renders and applies them through a pluggable host
//! adapter. It implements:
//!
//! - Function components with positional hooks (state, effects, context,
//!   refs, memoisation, transitions, suspending reads)
//! - Keyed child reconciliation with move detection
//! - Lane-based update priorities with interruptible, time-sliced rendering
//! - Suspense boundaries that show a fallback while a dependency is pending
//! - A commit phase that applies mutations atomically and runs passive
//!   effects afterwards
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `element`: element descriptors and builders
//! - `fiber`: work nodes, their arena and double buffering
//! - `reconcile`: diffing of a node's children
//! - `hooks`: the hook state machine behind [`RenderCx`]
//! - `work_loop`: the begin/complete traversal, unwinding and suspension
//! - `commit`: host mutations, refs and passive effects
//! - `root`: per-root state and the scheduling driver
//! - `testing`: an in-memory host and a manual scheduler
//!
//! # Example
//!
//! ```rust
//! use trellis_core::element::{el, h, text, Component};
//! use trellis_core::testing::TestRuntime;
//!
//! let counter = Component::new("Counter", |cx, _props| {
//!     let (count, set_count) = cx.use_state(0)?;
//!     Ok(h("button")
//!         .attr("id", "inc")
//!         .on("on_click", move || set_count.update(|c| c + 1))
//!         .child(text(count.to_string()))
//!         .into())
//! });
//!
//! let rt = TestRuntime::new();
//! let root = rt.create_root();
//! root.render(el(&counter));
//! rt.run_until_idle();
//! assert_eq!(rt.dump(&root), "<button id=\"inc\">0</button>");
//!
//! rt.click(&root, "inc");
//! rt.run_until_idle();
//! assert_eq!(rt.dump(&root), "<button id=\"inc\">1</button>");
//! ```

pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod host;
pub mod lanes;
pub mod logging;
pub mod scheduler;
pub mod testing;
pub mod thenable;
pub mod update_queue;

mod commit;
mod fiber;
mod hooks;
mod reconcile;
mod reconciler;
mod root;
mod work_loop;

pub use config::ReconcilerConfig;
pub use context::Context;
pub use element::{Child, Component, Element, ElementBuilder, Props};
pub use error::{ConfigError, ReconcilerError, RenderError, RenderResult, Result, ThrownError, UsageError};
pub use fiber::FiberId;
pub use hooks::{cleanup, Cleanup, RefObject, RenderCx, SetState, StartTransition};
pub use lanes::{Lane, Lanes};
pub use reconciler::Reconciler;
pub use root::RootHandle;
pub use thenable::{Thenable, ThenableState};
