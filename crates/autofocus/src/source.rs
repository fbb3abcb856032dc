use std::{any::type_name, fmt, rc::Rc};

use tracing::warn;

use crate::error::{Error, Result};

/// A zero-argument action that moves focus to a participant.
#[derive(Clone)]
pub struct FocusHandler(Rc<dyn Fn()>);

impl FocusHandler {
    /// Wrap a closure as a focus handler.
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Run the handler.
    pub fn invoke(&self) {
        (self.0)();
    }
}

impl fmt::Debug for FocusHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FocusHandler")
    }
}

/// The object backing a participant: whatever actually receives focus.
pub trait Focusable {
    /// Name used in diagnostics.
    fn type_name(&self) -> &str {
        type_name::<Self>()
    }

    /// Bind the method called `method` into a focus handler, or `None` if the
    /// object has no such method.
    fn bind(self: Rc<Self>, method: &str) -> Option<FocusHandler>;
}

/// A shared handle to a focusable object.
pub type Target = Rc<dyn Focusable>;

/// Produces a focus handler from a backing object.
pub type Extractor = Rc<dyn Fn(&Target) -> Option<FocusHandler>>;

/// How a participant's focus handler is derived from its backing object.
///
/// Resolved once at registration; traversal only ever sees the resulting
/// handler or its absence.
#[derive(Clone, Default)]
pub enum FocusSource {
    /// A function from the backing object to a bound action.
    Extractor(Extractor),
    /// The name of a method to bind on the backing object.
    Method(String),
    /// No source was given. The participant is skipped, with a warning.
    #[default]
    Absent,
    /// The participant is deliberately skipped. No warning is emitted.
    Skip,
}

impl fmt::Debug for FocusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extractor(_) => f.write_str("Extractor"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Self::Absent => f.write_str("Absent"),
            Self::Skip => f.write_str("Skip"),
        }
    }
}

impl From<&str> for FocusSource {
    fn from(name: &str) -> Self {
        Self::Method(name.to_string())
    }
}

impl From<String> for FocusSource {
    fn from(name: String) -> Self {
        Self::Method(name)
    }
}

impl FocusSource {
    /// Source from an extractor closure.
    pub fn extractor(f: impl Fn(&Target) -> Option<FocusHandler> + 'static) -> Self {
        Self::Extractor(Rc::new(f))
    }

    /// Source naming a method on the backing object.
    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }

    /// Resolve into a concrete handler for `target`.
    ///
    /// `warn_absent` controls whether [`FocusSource::Absent`] is reported.
    pub fn resolve(&self, target: &Target, warn_absent: bool) -> Result<Option<FocusHandler>> {
        match self {
            Self::Extractor(extract) => extract(target).map(Some).ok_or_else(|| {
                Error::InvalidFocusExtractor(format!(
                    "extractor for {} did not produce a focus action",
                    target.type_name()
                ))
            }),
            Self::Method(name) => Rc::clone(target).bind(name).map(Some).ok_or_else(|| {
                Error::InvalidFocusExtractor(format!(
                    "{} has no focus method {name:?}",
                    target.type_name()
                ))
            }),
            Self::Absent => {
                if warn_absent {
                    warn!(
                        target_type = target.type_name(),
                        "no focus source given, focus will skip this participant; \
                         use FocusSource::Skip to skip silently"
                    );
                }
                Ok(None)
            }
            Self::Skip => Ok(None),
        }
    }
}
