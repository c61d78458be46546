use http::Request;
use tower::Layer;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{Trace, TraceLayer};
use tracing::{Span, field, info_span};

type HttpTraceService<S> = Trace<S, SharedClassifier<ServerErrorsAsFailures>, MakeSpan>;

// A HTTP tracing layer. Starts a span per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHttpServiceLayer;

impl<S> Layer<S> for TracingHttpServiceLayer {
    type Service = HttpTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceLayer::new_for_http().make_span_with(MakeSpan).layer(inner)
    }
}

/// The way [`Span`]s will be created for [`Trace`].
///
/// `user_id` is recorded by the authentication middleware once the
/// request is authenticated.
#[derive(Debug, Clone, Copy)]
pub struct MakeSpan;

impl<B> tower_http::trace::MakeSpan<B> for MakeSpan {
    /// Creates a new tracing span for an incoming request.
    fn make_span(&mut self, req: &Request<B>) -> Span {
        info_span!(
            "request",
            method = %req.method(),
            uri = %req.uri(),
            user_id = field::Empty,
        )
    }
}
