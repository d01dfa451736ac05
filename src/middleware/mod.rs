mod core;
mod cors;

pub use core::Middleware;
pub use cors::{
    cors_middleware, default_policy, CorsBuilder, CorsConfigError, CorsMiddleware, CorsPolicy,
    CorsPolicySource, OriginValidator, DEFAULT_MAX_AGE,
};
