//! Logging macros
//!
//! Every macro takes a component name, a correlation source (an
//! [`ActivityId`](cpio_core_async::ActivityId) or a reference to an
//! [`AsyncContext`](cpio_core_async::AsyncContext)) and a format string.
//! An optional `logger = <expr>;` prefix routes the record to an injected
//! [`Logger`](crate::Logger) (or `Option<Logger>`); without it, or when the
//! option is `None`, the global logger is used.
//!
//! ```
//! use cpio_observability::{cpio_info, log_every_n, Severity};
//! use cpio_observability::testing::CapturingLogProvider;
//! use cpio_core_async::ActivityId;
//!
//! let capture = CapturingLogProvider::new();
//! let logger = capture.logger();
//! let id = ActivityId::generate();
//!
//! cpio_info!(logger = logger; "Example", id, "started {}", "work");
//! for i in 0..10 {
//!     log_every_n!(logger = logger; Severity::Debug, 5, "Example", id, "tick {}", i);
//! }
//!
//! assert_eq!(capture.messages(), ["started work", "tick 0", "tick 5"]);
//! ```

/// Log at an explicit [`Severity`](crate::Severity)
#[macro_export]
macro_rules! cpio_log {
    (logger = $logger:expr; $severity:expr, $component:expr, $correlation:expr, $($arg:tt)+) => {
        $crate::__private::emit(
            $crate::__private::MaybeLogger::maybe_logger(&$logger),
            $severity,
            $component,
            &$correlation,
            ::core::file!(),
            ::core::line!(),
            ::core::format_args!($($arg)+),
        )
    };
    ($severity:expr, $component:expr, $correlation:expr, $($arg:tt)+) => {
        $crate::__private::emit(
            ::core::option::Option::None,
            $severity,
            $component,
            &$correlation,
            ::core::file!(),
            ::core::line!(),
            ::core::format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! cpio_debug {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Debug, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Debug, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_info {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Info, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Info, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_warning {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Warning, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Warning, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_error {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Error, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Error, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_critical {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Critical, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Critical, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_alert {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Alert, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Alert, $($rest)+)
    };
}

#[macro_export]
macro_rules! cpio_emergency {
    (logger = $logger:expr; $($rest:tt)+) => {
        $crate::cpio_log!(logger = $logger; $crate::Severity::Emergency, $($rest)+)
    };
    ($($rest:tt)+) => {
        $crate::cpio_log!($crate::Severity::Emergency, $($rest)+)
    };
}

/// Log at most once per `period` from this call site.
///
/// `log_every_period!(severity, period, component, correlation, fmt, args...)`
#[macro_export]
macro_rules! log_every_period {
    (logger = $logger:expr; $severity:expr, $period:expr, $($rest:tt)+) => {{
        static __CPIO_THROTTLE: $crate::throttle::EveryPeriod = $crate::throttle::EveryPeriod::new();
        if __CPIO_THROTTLE.should_log($period) {
            $crate::cpio_log!(logger = $logger; $severity, $($rest)+);
        }
    }};
    ($severity:expr, $period:expr, $($rest:tt)+) => {{
        static __CPIO_THROTTLE: $crate::throttle::EveryPeriod = $crate::throttle::EveryPeriod::new();
        if __CPIO_THROTTLE.should_log($period) {
            $crate::cpio_log!($severity, $($rest)+);
        }
    }};
}

/// Log on calls 1, n+1, 2n+1, ... of this call site.
///
/// `log_every_n!(severity, n, component, correlation, fmt, args...)`
#[macro_export]
macro_rules! log_every_n {
    (logger = $logger:expr; $severity:expr, $n:expr, $($rest:tt)+) => {{
        static __CPIO_THROTTLE: $crate::throttle::EveryN = $crate::throttle::EveryN::new();
        if __CPIO_THROTTLE.should_log($n) {
            $crate::cpio_log!(logger = $logger; $severity, $($rest)+);
        }
    }};
    ($severity:expr, $n:expr, $($rest:tt)+) => {{
        static __CPIO_THROTTLE: $crate::throttle::EveryN = $crate::throttle::EveryN::new();
        if __CPIO_THROTTLE.should_log($n) {
            $crate::cpio_log!($severity, $($rest)+);
        }
    }};
}

/// Log an error with the status and registered message of `result` attached.
///
/// `log_error_context!(component, correlation, result, fmt, args...)`
#[macro_export]
macro_rules! log_error_context {
    (logger = $logger:expr; $component:expr, $correlation:expr, $result:expr, $($arg:tt)+) => {{
        let __cpio_result: $crate::__private::core::ExecutionResult = $result;
        $crate::cpio_log!(
            logger = $logger;
            $crate::Severity::Error,
            $component,
            $correlation,
            "{} [{:?} {:#010x}: {}]",
            ::core::format_args!($($arg)+),
            __cpio_result.status(),
            __cpio_result.status_code(),
            __cpio_result.message()
        );
    }};
    ($component:expr, $correlation:expr, $result:expr, $($arg:tt)+) => {{
        let __cpio_result: $crate::__private::core::ExecutionResult = $result;
        $crate::cpio_log!(
            $crate::Severity::Error,
            $component,
            $correlation,
            "{} [{:?} {:#010x}: {}]",
            ::core::format_args!($($arg)+),
            __cpio_result.status(),
            __cpio_result.status_code(),
            __cpio_result.message()
        );
    }};
}

/// Return `result` from the enclosing function, logged as an error, unless it
/// is successful.
///
/// The enclosing function may return `ExecutionResult` or any type that
/// implements `From<ExecutionResult>`.
#[macro_export]
macro_rules! return_and_log_if_failure {
    (logger = $logger:expr; $component:expr, $correlation:expr, $result:expr, $($arg:tt)+) => {{
        let __cpio_result: $crate::__private::core::ExecutionResult = $result;
        if !__cpio_result.successful() {
            $crate::log_error_context!(
                logger = $logger; $component, $correlation, __cpio_result, $($arg)+
            );
            return ::core::convert::From::from(__cpio_result);
        }
    }};
    ($component:expr, $correlation:expr, $result:expr, $($arg:tt)+) => {{
        let __cpio_result: $crate::__private::core::ExecutionResult = $result;
        if !__cpio_result.successful() {
            $crate::log_error_context!($component, $correlation, __cpio_result, $($arg)+);
            return ::core::convert::From::from(__cpio_result);
        }
    }};
}
