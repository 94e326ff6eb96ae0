//! # Sum Types
//!
//! Closed variant sets used both as value types and as dispatch keys.
//!
//! ## Overview
//!
//! A [`SumType`] is declared once with an explicit builder and then shared by `Arc`:
//!
//! ```rust
//! use solorouter::sum::SumType;
//!
//! let provider = SumType::builder("solo.apps.accounts.AuthProvider")
//!     .variant("GITHUB", "github")
//!     .variant("FACEBOOK", "facebook")
//!     .contract(["auth_provider_impl"])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(provider.match_value("github").unwrap().name(), "GITHUB");
//! assert!(provider.match_value("twitter").is_err());
//! ```
//!
//! ## Matching
//!
//! - [`SumType::match_value`] resolves primitives by equality and payload objects by type.
//!   The first variant in declaration order wins.
//! - [`SumType::match_segment`] resolves the text of a URL segment.
//! - [`SumType::inline_match`] builds an exhaustive dispatch table; a missing, duplicate or
//!   unknown case name is rejected up front.
//!
//! ## Contracts
//!
//! A sum type may name contract terms. Every variant has to bind an [`Implementation`] for
//! every term through [`SumTypeRegistry::bind`]; [`SumTypeRegistry::check_consistency`] runs
//! once all packages are scanned, so bindings can come from any package, in any order.

mod core;
mod registry;
#[cfg(test)]
mod tests;

pub use core::{
    InlineMatch, Literal, PatternFault, Scrutinee, SumError, SumType, SumTypeBuilder, TypeTag,
    Variant, VariantInstance, VariantTag,
};
pub use registry::{ContractBinding, Implementation, SumTypeRegistry};
