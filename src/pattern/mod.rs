//! # Pattern Compiler
//!
//! Parses route patterns with typed placeholders into a [`CompiledPattern`] and renders
//! the anchored regular expression the [`router`](crate::router) matches with.
//!
//! ## Syntax
//!
//! | Placeholder | Accepts |
//! |---|---|
//! | `{name}` | one path segment (`[^/]+`) |
//! | `{name:regex}` | the regular expression; nested braces such as `\d{1,3}` are fine |
//! | `{name:<dotted.path.SumType>}` | exactly the values of the sum type's literal variants |
//!
//! Placeholder names must be identifiers and unique within a pattern. An unterminated
//! `{` fails with "Unexpected end of a route definition" and the offending fragment.
//!
//! ## Example
//!
//! ```rust
//! use solorouter::pattern::{compile, render_runtime_pattern};
//! use solorouter::sum::SumTypeRegistry;
//!
//! let sums = SumTypeRegistry::new();
//! let compiled = compile("/items/{id:\\d{1,3}}", "/api", &sums).unwrap();
//! assert_eq!(compiled.pattern(), "/api/items/{id}");
//! assert_eq!(render_runtime_pattern(&compiled), "^/api/items/(?P<id>(?:\\d{1,3}))$");
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{
    compile, join_prefix, render_runtime_pattern, CompiledPattern, RegexRule, Rule, RuleMap,
    Segment, DEFAULT_SEGMENT_RULE,
};
