//! # CLI Module
//!
//! Command-line tooling for CORS configuration files.
//!
//! ## Commands
//!
//! ### `show`
//!
//! Print the resolved policy (the default policy when no file is given):
//!
//! ```bash
//! brrtcors show --config config/cors.yaml
//! ```
//!
//! ### `validate`
//!
//! Load a configuration and run policy validation; exits non-zero on error:
//!
//! ```bash
//! brrtcors validate --config config/cors.yaml
//! ```
//!
//! ### `check`
//!
//! Evaluate a synthetic request against a policy and print the response status
//! and CORS headers:
//!
//! ```bash
//! brrtcors check --config config/cors.yaml \
//!     --origin https://app.example.com \
//!     --method OPTIONS \
//!     --request-method DELETE \
//!     --request-headers "Content-Type, X-Trace"
//! ```

mod commands;


pub use commands::{check_request, run_cli, CheckArgs, Cli, Commands};
