//! Error types.
//!
//! Three families of failure flow through the reconciler:
//!
//! - [`UsageError`]: the embedding code broke a contract (hook order, tree
//!   invariants). Fatal for the render pass that hit it.
//! - [`RenderError`]: what a component returns instead of children. It may
//!   be a suspense signal, a usage error, or an arbitrary thrown value.
//! - [`ReconcilerError`]: what a root reports back to its owner.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::fiber::FiberId;
use crate::thenable::Wakeable;

/// Contract violations by the code driving the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("hook #{index} changed kind between renders: expected {expected}, found {found}")]
    HookMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("rendered more hooks than during the previous render ({count} so far)")]
    MoreHooksThanPreviousRender { count: usize },

    #[error("rendered fewer hooks than expected ({rendered} instead of {previous})")]
    FewerHooksThanPreviousRender { rendered: usize, previous: usize },

    #[error("no host parent found for {fiber:?}")]
    HostParentNotFound { fiber: FiberId },
}

/// Non-suspense value thrown by a component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ThrownError {
    message: Rc<str>,
}

impl ThrownError {
    pub fn new(message: impl Into<Rc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Sentinel carried out of a component that read an unresolved dependency.
#[derive(Clone)]
pub struct SuspendSignal {
    pub(crate) wakeable: Rc<dyn Wakeable>,
}

impl SuspendSignal {
    pub fn new(wakeable: Rc<dyn Wakeable>) -> Self {
        Self { wakeable }
    }
}

impl fmt::Debug for SuspendSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendSignal")
            .field("wakeable", &self.wakeable.id())
            .finish()
    }
}

/// Why a component did not produce children.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("component suspended on {0:?}")]
    Suspended(SuspendSignal),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("component threw: {0}")]
    Thrown(#[from] ThrownError),
}

/// Result type returned by components and hooks.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Failures configuration parsing can report.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid reconciler config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("nested_update_limit must be at least 1")]
    ZeroNestedUpdateLimit,
}

/// Errors a root reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("render pass abandoned: {0}")]
    Thrown(#[from] ThrownError),

    #[error("maximum update depth exceeded: {limit} nested synchronous commits")]
    NestedUpdateLimit { limit: u32 },
}

/// Crate-wide result alias.
pub type Result<T, E = ReconcilerError> = std::result::Result<T, E>;
