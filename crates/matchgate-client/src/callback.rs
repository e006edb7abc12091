//! User callbacks and the wrapper that keeps their failures contained.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{BoxError, CallbackError};

/// What a user callback returns. An `Err` is logged and dropped.
pub type CallbackResult = Result<(), BoxError>;

pub(crate) type EventFn = Arc<dyn Fn() -> CallbackResult + Send + Sync>;
pub(crate) type MessageFn = Arc<dyn Fn(&str) -> CallbackResult + Send + Sync>;

/// The three event callbacks. Every slot starts as a no-op.
#[derive(Clone)]
pub(crate) struct Handlers {
    pub(crate) open: EventFn,
    pub(crate) close: EventFn,
    pub(crate) message: MessageFn,
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            open: Arc::new(|| Ok(())),
            close: Arc::new(|| Ok(())),
            message: Arc::new(|_| Ok(())),
        }
    }
}

impl Handlers {
    pub(crate) fn on_open(&self) {
        report(invoke_isolated("open", || (self.open)()));
    }

    pub(crate) fn on_close(&self) {
        report(invoke_isolated("close", || (self.close)()));
    }

    pub(crate) fn on_message(&self, payload: &str) {
        report(invoke_isolated("message", || (self.message)(payload)));
    }
}

/// Runs `f`, turning both an `Err` return and a panic into a
/// [`CallbackError`].
pub(crate) fn invoke_isolated<F>(event: &'static str, f: F) -> Result<(), CallbackError>
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(CallbackError::Failed { event, source }),
        Err(panic) => Err(CallbackError::Panicked {
            event,
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn report(result: Result<(), CallbackError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "callback failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_callback_passes_through() {
        assert!(invoke_isolated("open", || Ok(())).is_ok());
    }

    #[test]
    fn test_err_callback_is_captured() {
        let err = invoke_isolated("message", || Err("boom".into())).unwrap_err();
        assert!(matches!(err, CallbackError::Failed { event: "message", .. }));
        assert_eq!(err.to_string(), "message handler failed: boom");
    }

    #[test]
    fn test_panicking_callback_is_captured() {
        let err = invoke_isolated("close", || panic!("kaboom")).unwrap_err();
        match err {
            CallbackError::Panicked { event, message } => {
                assert_eq!(event, "close");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_formatted_panic_message_is_kept() {
        let n = 3;
        let err = invoke_isolated("open", || panic!("bad frame {n}")).unwrap_err();
        assert!(err.to_string().contains("bad frame 3"));
    }

    #[test]
    fn test_default_handlers_are_noops() {
        let handlers = Handlers::default();
        handlers.on_open();
        handlers.on_close();
        handlers.on_message("anything");
    }
}
