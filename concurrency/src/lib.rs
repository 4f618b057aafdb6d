// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

//! Synchronization facade.
//!
//! Crates in this workspace import their locks, condition variables and threads from here instead
//! of from `std` directly. With the `shuttle` feature enabled the same names resolve to the
//! [shuttle] model-checking primitives so that the path synchronizer and the chain identifier
//! allocator can be exercised under randomized schedules.
//!
//! [shuttle]: https://docs.rs/shuttle

#[cfg(not(feature = "shuttle"))]
pub use std::sync;

#[cfg(not(feature = "shuttle"))]
pub use std::thread;

#[cfg(feature = "shuttle")]
pub use shuttle::sync;

#[cfg(feature = "shuttle")]
pub use shuttle::thread;

/// Compile the enclosed items only when the *concurrency* crate is built with `shuttle`.
///
/// The feature flag checked is the one of the *concurrency* crate, not of the crate where the
/// macro is expanded.
///
/// # Example
/// ```
/// # use sfc_concurrency::with_shuttle;
/// with_shuttle! {
///     fn only_compiled_with_shuttle() {}
/// }
/// ```
#[cfg(feature = "shuttle")]
#[macro_export]
macro_rules! with_shuttle {
    ($($item:item)*) => {
        $(
            $item
        )*
    };
}

/// Compile the enclosed items only when the *concurrency* crate is built with `shuttle`.
#[cfg(not(feature = "shuttle"))]
#[macro_export]
macro_rules! with_shuttle {
    ($($item:item)*) => {};
}

/// Compile the enclosed items only when the *concurrency* crate uses the `std` primitives.
///
/// # Example
/// ```
/// # use sfc_concurrency::with_std;
/// with_std! {
///     fn only_compiled_with_std() {}
/// }
/// ```
#[cfg(not(feature = "shuttle"))]
#[macro_export]
macro_rules! with_std {
    ($($item:item)*) => {
        $(
            $item
        )*
    };
}

/// Compile the enclosed items only when the *concurrency* crate uses the `std` primitives.
#[cfg(feature = "shuttle")]
#[macro_export]
macro_rules! with_std {
    ($($item:item)*) => {};
}
