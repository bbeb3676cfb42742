//! Correlation sources for log records
//!
//! Every log statement names the activity it belongs to. Either pass a bare
//! [`ActivityId`] or the [`AsyncContext`] being processed; a context carries
//! its correlation, parent and activity ids so that a whole causal chain of
//! statements shares one correlation id.

use cpio_core_async::{ActivityId, AsyncContext};

/// Anything that can identify the activity a log record belongs to
pub trait LogCorrelation {
    /// Id shared by every activity in one causal chain
    fn correlation_id(&self) -> ActivityId;

    /// Activity that spawned this one, or [`ActivityId::ZERO`]
    fn parent_activity_id(&self) -> ActivityId;

    fn activity_id(&self) -> ActivityId;
}

/// A bare id correlates only itself
impl LogCorrelation for ActivityId {
    fn correlation_id(&self) -> ActivityId {
        *self
    }

    fn parent_activity_id(&self) -> ActivityId {
        ActivityId::ZERO
    }

    fn activity_id(&self) -> ActivityId {
        *self
    }
}

impl<Req, Resp> LogCorrelation for AsyncContext<Req, Resp> {
    fn correlation_id(&self) -> ActivityId {
        AsyncContext::correlation_id(self)
    }

    fn parent_activity_id(&self) -> ActivityId {
        AsyncContext::parent_activity_id(self).unwrap_or(ActivityId::ZERO)
    }

    fn activity_id(&self) -> ActivityId {
        AsyncContext::activity_id(self)
    }
}

impl<T: LogCorrelation + ?Sized> LogCorrelation for &T {
    fn correlation_id(&self) -> ActivityId {
        (**self).correlation_id()
    }

    fn parent_activity_id(&self) -> ActivityId {
        (**self).parent_activity_id()
    }

    fn activity_id(&self) -> ActivityId {
        (**self).activity_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_activity_id_correlation() {
        let id = ActivityId::generate();
        assert_eq!(LogCorrelation::correlation_id(&id), id);
        assert_eq!(LogCorrelation::activity_id(&id), id);
        assert!(LogCorrelation::parent_activity_id(&id).is_zero());
    }

    #[test]
    fn test_context_correlation() {
        let parent: AsyncContext<(), ()> = AsyncContext::new(Arc::new(()), |_| {});
        let child: AsyncContext<(), ()> = AsyncContext::from_parent(&parent, Arc::new(()), |_| {});

        let by_ref: &dyn LogCorrelation = &&child;
        assert_eq!(by_ref.correlation_id(), parent.activity_id());
        assert_eq!(by_ref.parent_activity_id(), parent.activity_id());
        assert_eq!(by_ref.activity_id(), child.activity_id());
        assert!(LogCorrelation::parent_activity_id(&parent).is_zero());
    }
}
