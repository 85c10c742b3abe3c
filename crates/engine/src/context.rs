//! Pooled execution contexts
//!
//! Contexts are borrowed from the engine pool for a single call and handed
//! back when the guard drops, on every path.

use std::ops::Deref;

use scripthook_sdk::{ContextRef, EngineRef, ScriptContext};

use crate::error::CallError;

/// A context borrowed from the engine pool, returned on drop
pub struct OwningContext {
    engine: EngineRef,
    context: Option<ContextRef>,
}

impl OwningContext {
    /// Request a context from `engine`
    pub fn acquire(engine: EngineRef) -> Result<Self, CallError> {
        let context = engine
            .request_context()
            .map_err(CallError::ContextUnavailable)?;

        tracing::trace!("Borrowed script context from pool");

        Ok(Self {
            engine,
            context: Some(context),
        })
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }
}

impl Deref for OwningContext {
    type Target = dyn ScriptContext;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the context out.
        match &self.context {
            Some(context) => &**context,
            None => unreachable!("context already returned to pool"),
        }
    }
}

impl Drop for OwningContext {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.engine.return_context(context);
            tracing::trace!("Returned script context to pool");
        }
    }
}

/// Run `f` with `context`, or with a context borrowed from `engine` when
/// none is supplied.
///
/// `engine` is only evaluated when a context has to be borrowed.
pub fn with_context<R>(
    context: Option<&dyn ScriptContext>,
    engine: impl FnOnce() -> EngineRef,
    f: impl FnOnce(&dyn ScriptContext) -> R,
) -> Result<R, CallError> {
    match context {
        Some(context) => Ok(f(context)),
        None => {
            let owned = OwningContext::acquire(engine())?;
            Ok(f(&*owned))
        }
    }
}
