//! Error taxonomy surfaced through [`crate::system::System::new`]'s
//! `on_error` callback.

use std::fmt;

/// Errors the runtime itself can raise about an actor's lifecycle or
/// message delivery. User code returns `Result<(), FrameworkError>` (or its
/// own error wrapped via [`FrameworkError::UserSupplied`]) from fallible
/// hooks; the runtime never panics on these paths.
#[derive(Debug, thiserror::Error, Clone)]
pub enum FrameworkError {
    #[error("request timed out waiting for a response")]
    RequestTimeout,
    #[error("plugin init failed: {0}")]
    PluginInitFailed(String),
    #[error("shutdown did not complete within the configured timeout")]
    ShutdownTimeout,
    #[error("request was cancelled before a response arrived")]
    Cancelled,
    #[error("destination actor's queue is closed")]
    ActorClosed,
    #[error("{0}")]
    UserSupplied(String),
}

/// One link in an [`ErrorChain`]: the context a layer attached plus the
/// error it was wrapping when it re-raised.
#[derive(Debug, Clone)]
pub struct ErrorLink {
    pub context: String,
    pub error: String,
}

/// Newest-first chain of causally related errors.
///
/// Built up as a failure propagates from its origin through supervisors
/// escalating it toward the root (spec §6, §7): each supervisor that
/// re-raises pushes a new link onto the front, so the chain reads
/// outermost-context-first and the original failure is always `root()`.
#[derive(Debug, Clone, Default)]
pub struct ErrorChain {
    links: Vec<ErrorLink>,
}

impl ErrorChain {
    pub fn new(context: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut chain = Self::default();
        chain.push(context, error);
        chain
    }

    /// Prepend a link representing a layer further from the original cause.
    pub fn push(&mut self, context: impl Into<String>, error: impl fmt::Display) -> &mut Self {
        self.links.insert(0, ErrorLink { context: context.into(), error: error.to_string() });
        self
    }

    /// The innermost, original failure.
    pub fn root(&self) -> Option<&ErrorLink> {
        self.links.last()
    }

    /// The outermost, most-recently-attached context.
    pub fn newest(&self) -> Option<&ErrorLink> {
        self.links.first()
    }

    pub fn links(&self) -> &[ErrorLink] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl fmt::Display for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                write!(f, " <- ")?;
            }
            write!(f, "{}: {}", link.context, link.error)?;
        }
        Ok(())
    }
}
