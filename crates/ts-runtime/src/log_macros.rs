/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so every event can be filtered by the
/// part of the reader it came from: `sys`, `io`, `live`, `tune`, `conf`.
///
/// ```ignore
/// ts_info!(io, target = %path.display(), realtime = true, "stream opened");
/// ts_warn!(live, give_ups = n, "producer stalled");
/// ```
///
/// The domain is a bare identifier, not a string.

#[doc(hidden)]
macro_rules! ts_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! ts_error {
    ($domain:ident, $($rest:tt)*) => {
        ts_log!(error, $domain, $($rest)*)
    };
}

macro_rules! ts_warn {
    ($domain:ident, $($rest:tt)*) => {
        ts_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! ts_info {
    ($domain:ident, $($rest:tt)*) => {
        ts_log!(info, $domain, $($rest)*)
    };
}

macro_rules! ts_debug {
    ($domain:ident, $($rest:tt)*) => {
        ts_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! ts_trace {
    ($domain:ident, $($rest:tt)*) => {
        ts_log!(trace, $domain, $($rest)*)
    };
}
