//! # CLI Module
//!
//! Command-line access to a configured application, using the bundled packages.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print every route with its views, renderer and predicate chain:
//!
//! ```bash
//! solo --config config/solo.yaml routes
//! ```
//!
//! ### `check`
//!
//! Run include, scan, setup directives and the final consistency checks, failing on the
//! first configuration error:
//!
//! ```bash
//! solo check
//! ```
//!
//! ### `request`
//!
//! Dispatch one request through the full pipeline on a current-thread tokio runtime:
//!
//! ```bash
//! solo request /hello/
//! solo request -X POST /login/github
//! solo request /users/me -H 'cookie: SOLO_SESSION=01J...'
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands};
