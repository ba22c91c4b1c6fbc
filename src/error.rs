use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no renderer registered for element kind `{0}`")]
    NoRenderer(&'static str),
    #[error("{message}")]
    RendererFailed {
        message: Cow<'static, str>,
        trace: Trace,
    },
    #[error("expected context `{expected}` on top of the stack, found {found}")]
    ContextMismatch {
        expected: &'static str,
        found: Cow<'static, str>,
    },
    #[error("context stack unbalanced after `{kind}`: depth {expected} before, {found} after")]
    ContextImbalance {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("state `{key}` holds `{stored}`, requested `{requested}`")]
    StateTypeMismatch {
        key: String,
        stored: &'static str,
        requested: &'static str,
    },
    #[error("state key `{0}` claimed by two elements in the same pass")]
    DuplicateStateKey(String),
    #[error("state scopes unbalanced after `{kind}`: depth {expected} before, {found} after")]
    ScopeImbalance {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("state scope stack popped past its root")]
    StateScopeUnderflow,
    #[error("render pass already in progress")]
    AlreadyRendering,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Backtrace captured where a renderer failure was raised.
#[derive(Debug)]
pub struct Trace(pub Backtrace);

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Error {
    /// A renderer failure with a captured backtrace.
    ///
    /// The backtrace is only populated when `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`
    /// enable it.
    pub fn failed(message: impl Into<Cow<'static, str>>) -> Self {
        Error::RendererFailed {
            message: message.into(),
            trace: Trace(Backtrace::capture()),
        }
    }

    /// Backtrace attached to a renderer failure, if one was captured.
    pub fn captured_trace(&self) -> Option<&Backtrace> {
        match self {
            Error::RendererFailed { trace, .. }
                if trace.0.status() == BacktraceStatus::Captured =>
            {
                Some(&trace.0)
            }
            _ => None,
        }
    }

    /// Orchestration failures indicate a broken caller contract and abort the pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ContextImbalance { .. }
                | Error::ScopeImbalance { .. }
                | Error::StateScopeUnderflow
                | Error::AlreadyRendering
        )
    }
}

/// What the failure boundary shows in place of an element that failed to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    /// Short element kind name.
    pub kind: &'static str,
    pub message: String,
    /// First frame of the captured backtrace, if one was captured.
    pub first_frame: Option<String>,
}

impl FailureReport {
    pub(crate) fn from_error(kind: &'static str, error: &Error) -> Self {
        let first_frame = match error {
            Error::RendererFailed { trace, .. } => first_frame(&trace.0),
            _ => None,
        };
        Self {
            kind,
            message: error.to_string(),
            first_frame,
        }
    }

    pub(crate) fn from_panic(
        kind: &'static str,
        payload: &(dyn std::any::Any + Send),
        backtrace: Option<&Backtrace>,
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "renderer panicked".to_string()
        };
        Self {
            kind,
            message,
            first_frame: backtrace.and_then(first_frame),
        }
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Chain a panic hook that keeps the panicking thread's backtrace for the failure
/// boundary. Installed once per process; the previous hook still runs.
pub(crate) fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::capture()));
            previous(info);
        }));
    });
}

/// Backtrace recorded by the hook for the most recent panic on this thread.
pub(crate) fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

/// The first symbolized frame outside the std/backtrace machinery.
fn first_frame(backtrace: &Backtrace) -> Option<String> {
    if backtrace.status() != BacktraceStatus::Captured {
        return None;
    }
    let text = backtrace.to_string();
    text.lines()
        .map(str::trim)
        .filter(|line| line.contains(": "))
        .map(|line| line.split_once(": ").map_or(line, |(_, f)| f))
        .find(|frame| {
            !frame.starts_with("std::")
                && !frame.starts_with("core::")
                && !frame.starts_with("alloc::")
                && !frame.starts_with("<alloc::")
                && !frame.starts_with("rust_begin_unwind")
                && !frame.starts_with("__rust")
                && !frame.starts_with("strata::error::")
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message() {
        let err = Error::failed("slider out of range");
        assert_eq!(err.to_string(), "slider out of range");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::AlreadyRendering.is_fatal());
        assert!(Error::StateScopeUnderflow.is_fatal());
        assert!(!Error::NoRenderer("Label").is_fatal());
        assert!(!Error::DuplicateStateKey("a".into()).is_fatal());
    }

    #[test]
    fn test_report_from_panic_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let report = FailureReport::from_panic("Button", payload.as_ref(), None);
        assert_eq!(report.message, "boom");
        assert_eq!(report.kind, "Button");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        let report = FailureReport::from_panic("Button", payload.as_ref(), None);
        assert_eq!(report.message, "owned boom");
        assert_eq!(report.first_frame, None);
    }

    #[test]
    fn test_panic_hook_records_trace() {
        install_panic_hook();
        let _ = take_panic_trace();
        let result = panic::catch_unwind(|| panic!("hooked"));
        assert!(result.is_err());
        assert!(take_panic_trace().is_some());
        assert!(take_panic_trace().is_none());
    }

    #[test]
    fn test_force_captured_backtrace_has_frame() {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() == BacktraceStatus::Captured {
            assert!(first_frame(&backtrace).is_some());
        }
    }
}
