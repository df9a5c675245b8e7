//! Logging macros
//!
//! Forward to `defmt` when the `defmt` feature is enabled and expand to an
//! unused `format_args!` otherwise, so host builds carry no logger but still
//! type-check the arguments. Format strings must stay within the subset both
//! `defmt` and `core::fmt` accept (`{}` and `{:?}`).

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);

        #[cfg(not(feature = "defmt"))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);

        #[cfg(not(feature = "defmt"))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);

        #[cfg(not(feature = "defmt"))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);

        #[cfg(not(feature = "defmt"))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}
