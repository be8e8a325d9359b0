//! Logging macros that tag every event with a `domain` field.
//!
//! Domains: `sys` (lifecycle), `conn` (sources), `pipe` (dispatch and
//! workers), `rule` (control plane), `res` (sinks), `conf` (configuration).
//!
//! ```ignore
//! fd_info!(sys, partitions = 4, "engine started");
//! fd_warn!(conn, file = %path.display(), line = n, "malformed event skipped");
//! ```

#[doc(hidden)]
macro_rules! fd_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! fd_error {
    ($domain:ident, $($rest:tt)*) => {
        fd_log!(error, $domain, $($rest)*)
    };
}

macro_rules! fd_warn {
    ($domain:ident, $($rest:tt)*) => {
        fd_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! fd_info {
    ($domain:ident, $($rest:tt)*) => {
        fd_log!(info, $domain, $($rest)*)
    };
}

macro_rules! fd_debug {
    ($domain:ident, $($rest:tt)*) => {
        fd_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! fd_trace {
    ($domain:ident, $($rest:tt)*) => {
        fd_log!(trace, $domain, $($rest)*)
    };
}
