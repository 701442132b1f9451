//! Logging shims for transient collaborator failures.
//!
//! With the `defmt` feature enabled the macros forward to `defmt`; otherwise
//! they only evaluate their arguments. Failures are additionally returned in
//! step outcomes, so host callers never depend on these for reporting.

#[cfg(feature = "defmt")]
macro_rules! bridge_warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! bridge_warn {
    ($($arg:expr),* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

#[cfg(feature = "defmt")]
macro_rules! bridge_debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! bridge_debug {
    ($($arg:expr),* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}
