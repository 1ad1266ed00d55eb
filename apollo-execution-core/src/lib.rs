//! Concurrency coordination for GraphQL field execution.
//!
//! Field values may be materialized synchronously or arrive later through a [`Pending`]
//! computation. This crate combines such [`Outcome`]s in declaration order, drives sequential
//! evaluation without growing the stack, classifies completed values into [`FieldValueInfo`]
//! trees and assembles the final [`ExecutionResult`].

#![cfg_attr(feature = "failfast", allow(unreachable_code))]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

mod combiner;
mod configuration;
mod context;
mod error;
mod field_value;
mod json_ext;
mod outcome;
mod parallel;
mod results;
mod sequential;
mod strategy;
mod unify;

pub use combiner::*;
pub use configuration::*;
pub use context::*;
pub use error::*;
pub use field_value::*;
pub use json_ext::*;
pub use outcome::*;
pub use parallel::*;
pub use results::*;
pub use sequential::*;
pub use strategy::*;
pub use unify::*;

pub mod prelude {
    // NOTE: only traits can be added here! Everything else is reachable from the crate root.
    pub use crate::combiner::CombinedBuilder;
    pub use crate::context::ErrorCollector;
    pub use crate::error::ErrorExtension;
    pub use crate::strategy::FieldResolver;
}
