use std::time::Duration;

use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// A request/response hook run by the [`Dispatcher`](crate::dispatcher::Dispatcher)
///
/// `before()` may short-circuit the handler by returning a response;
/// `after()` may decorate whatever response is about to be sent.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        None
    }
    fn after(&self, _req: &HandlerRequest, _res: &mut HandlerResponse, _latency: Duration) {}
}
