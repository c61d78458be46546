use appleid::{
    AccountDetails, Authenticator, IdentityRecord, KeySetFetcher, Now, PROVIDER, TokenCache,
    VerificationError,
};
use axum::body::Body;
use axum::response::IntoResponse as _;
use core::pin::Pin;
use http::{HeaderMap, HeaderName, Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::async_trait;
use tower::{Layer, Service};
use tracing::{Span, info, warn};

/// Header naming the authentication method of the request.
pub const TOKEN_TYPE_HEADER: HeaderName = HeaderName::from_static("x-token-type");

/// Header carrying the identity token.
pub const ACCESS_TOKEN_HEADER: HeaderName = HeaderName::from_static("access_token");

/// Header carrying the JSON encoded [`AccountDetails`].
pub const ACCOUNT_DETAILS_HEADER: HeaderName = HeaderName::from_static("x-account-details");

const UNAUTHORIZED_BODY: &str = "authentication failed";

#[cfg_attr(test, mock::async_client)]
#[async_trait]
pub trait SignInAuthenticator: Send + Sync + 'static {
    /// Authenticates an identity token.
    ///
    /// # Returns
    /// - the [`IdentityRecord`] of the user if the token is valid
    /// - the [`VerificationError`] explaining the rejection otherwise
    async fn authenticate(
        &self,
        token: &str,
        account_details: Option<&AccountDetails>,
    ) -> Result<IdentityRecord, VerificationError>;
}

#[async_trait]
impl<F, C, N> SignInAuthenticator for Authenticator<F, C, N>
where
    F: KeySetFetcher,
    C: TokenCache,
    N: Now,
{
    async fn authenticate(
        &self,
        token: &str,
        account_details: Option<&AccountDetails>,
    ) -> Result<IdentityRecord, VerificationError> {
        Authenticator::authenticate(self, token, account_details).await
    }
}

/// Service produced by [`AppleSignInLayer`] that authenticates requests
/// with a Sign in with Apple identity token.
pub struct AppleSignInService<S, A> {
    /// The inner service.
    pub inner: S,

    /// The authenticator that verifies the token.
    pub authenticator: Arc<A>,

    /// Request uri paths for which authentication should be skipped.
    pub no_auth: Vec<String>,
}

impl<S: Clone, A> Clone for AppleSignInService<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            authenticator: Arc::clone(&self.authenticator),
            no_auth: self.no_auth.clone(),
        }
    }
}

/// Authentication layer for requests carrying a Sign in with Apple
/// identity token.
///
/// Requests must send `X-token-type: AppleSignInToken` and the token in
/// the `access_token` header. After successful authentication the
/// middleware inserts the [`IdentityRecord`] into the request's extensions
/// allowing handlers to access the user. Any failure is answered with 401.
pub struct AppleSignInLayer<A> {
    /// The authenticator that verifies the token.
    pub authenticator: Arc<A>,

    /// Request uri paths for which authentication should be skipped.
    /// A `*` segment matches any single path segment.
    pub no_auth_endpoints: Vec<String>,
}

impl<A> AppleSignInLayer<A> {
    /// Creates a new [`AppleSignInLayer`].
    pub fn new(authenticator: Arc<A>, no_auth_endpoints: Vec<String>) -> Self {
        Self {
            authenticator,
            no_auth_endpoints,
        }
    }
}

impl<A> Clone for AppleSignInLayer<A> {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            no_auth_endpoints: self.no_auth_endpoints.clone(),
        }
    }
}

impl<S, A> Layer<S> for AppleSignInLayer<A> {
    type Service = AppleSignInService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        AppleSignInService {
            inner,
            authenticator: Arc::clone(&self.authenticator),
            no_auth: self.no_auth_endpoints.clone(),
        }
    }
}

impl<S, ReqBody, A> Service<Request<ReqBody>> for AppleSignInService<S, A>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    A: SignInAuthenticator,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // Allow preflight
        if request.method() == Method::OPTIONS {
            return Box::pin(self.inner.call(request));
        }

        // Allow certain paths with no auth
        let req_path = request.uri().path();
        if self.no_auth.iter().any(|p| matches_pattern(p, req_path)) {
            return Box::pin(self.inner.call(request));
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = Arc::clone(&self.authenticator);

        Box::pin(async move {
            let headers = request.headers();

            let token_type = headers
                .get(&TOKEN_TYPE_HEADER)
                .and_then(|value| value.to_str().ok());
            if token_type != Some(PROVIDER) {
                info!(token_type, "rejecting request with unsupported token type");
                return Ok(unauthorized());
            }

            let Some(token) = headers
                .get(&ACCESS_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
            else {
                info!("rejecting request without identity token");
                return Ok(unauthorized());
            };

            let account_details = account_details(headers);

            match authenticator
                .authenticate(&token, account_details.as_ref())
                .await
            {
                Ok(identity) => {
                    Span::current().record("user_id", identity.id.as_str());
                    request.extensions_mut().insert(identity);
                    inner.call(request).await
                }
                Err(err) => {
                    info!(reason = %err, "authentication failed");
                    Ok(unauthorized())
                }
            }
        })
    }
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

fn unauthorized() -> Response<Body> {
    (StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY).into_response()
}

/// Decodes the optional account details header. A malformed header is
/// ignored since the details are informational only.
fn account_details(headers: &HeaderMap) -> Option<AccountDetails> {
    let value = headers.get(&ACCOUNT_DETAILS_HEADER)?;

    let details = value
        .to_str()
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str(raw).map_err(|err| err.to_string()));

    match details {
        Ok(details) => Some(details),
        Err(err) => {
            warn!(error = %err, "ignoring malformed account details header");
            None
        }
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(path_parts.iter())
        .all(|(pattern, path)| *pattern == "*" || pattern == path)
}

#[cfg(test)]
mod tests {
    use std::future::Ready;
    use std::future::ready;
    use std::sync::Mutex;

    use appleid::{FetchError, IdentityName};
    use rstest::rstest;
    use tower::Service;

    use super::*;

    const TOKEN: &str = "eyJraWQiOiJXNldjT0tCIiwiYWxnIjoiUlMyNTYifQ.e30.c2ln";

    fn fixture_identity() -> IdentityRecord {
        IdentityRecord {
            id: "001234.abcdef".to_string(),
            display_name: "Christopher Prince".to_string(),
            name: IdentityName {
                family_name: "Prince".to_string(),
                given_name: "Christopher".to_string(),
            },
            emails: vec!["chris@cprince.com".to_string()],
            provider: PROVIDER.to_string(),
            expires_at: None,
        }
    }

    fn signed_in_request() -> http::request::Builder {
        Request::builder()
            .header("X-token-type", PROVIDER)
            .header("access_token", TOKEN)
    }

    #[rstest]
    #[case::authenticated(
        signed_in_request().body(()).unwrap(),
        Some(Ok(fixture_identity())),
        Vec::new(),
        StatusCode::OK,
        Some(fixture_identity())
    )]
    #[case::skip_preflight_requests(
        Request::builder().method("OPTIONS").body(()).unwrap(),
        None,
        Vec::new(),
        StatusCode::OK,
        None
    )]
    #[case::skip_no_auth_endpoints(
        Request::builder().uri("/health").body(()).unwrap(),
        None,
        vec![String::from("/health")],
        StatusCode::OK,
        None
    )]
    #[case::skip_no_auth_endpoints_with_wildcard(
        Request::builder().uri("/apple/health").body(()).unwrap(),
        None,
        vec![String::from("/*/health")],
        StatusCode::OK,
        None
    )]
    #[case::missing_token_type(
        Request::builder().header("access_token", TOKEN).body(()).unwrap(),
        None,
        Vec::new(),
        StatusCode::UNAUTHORIZED,
        None
    )]
    #[case::wrong_token_type(
        Request::builder()
            .header("X-token-type", "GoogleToken")
            .header("access_token", TOKEN)
            .body(())
            .unwrap(),
        None,
        Vec::new(),
        StatusCode::UNAUTHORIZED,
        None
    )]
    #[case::missing_access_token(
        Request::builder().header("X-token-type", PROVIDER).body(()).unwrap(),
        None,
        Vec::new(),
        StatusCode::UNAUTHORIZED,
        None
    )]
    #[case::invalid_token(
        signed_in_request().body(()).unwrap(),
        Some(Err(VerificationError::SignatureInvalid)),
        Vec::new(),
        StatusCode::UNAUTHORIZED,
        None
    )]
    #[case::key_fetch_failed(
        signed_in_request().body(()).unwrap(),
        Some(Err(VerificationError::KeyFetchFailed(FetchError::Timeout))),
        Vec::new(),
        StatusCode::UNAUTHORIZED,
        None
    )]
    #[case::malformed_account_details_are_ignored(
        signed_in_request()
            .header("X-account-details", "{not json")
            .body(())
            .unwrap(),
        Some(Ok(fixture_identity())),
        Vec::new(),
        StatusCode::OK,
        Some(fixture_identity())
    )]
    #[tokio::test]
    async fn test_auth_middleware(
        #[case] request: Request<()>,
        #[case] authentication_result: Option<Result<IdentityRecord, VerificationError>>,
        #[case] no_auth: Vec<String>,
        #[case] want_status: StatusCode,
        #[case] want_identity: Option<IdentityRecord>,
    ) {
        // given
        let want_calls = usize::from(authentication_result.is_some());
        let mut authenticator = MockSignInAuthenticator::default();
        if let Some(result) = authentication_result {
            authenticator = authenticator.with_authenticate(result);
        }
        let authenticator = Arc::new(authenticator);
        let inner = MockService::default();
        let mut service = AppleSignInService {
            inner: inner.clone(),
            authenticator: Arc::clone(&authenticator),
            no_auth,
        };

        // when
        let resp = service.call(request).await.unwrap();

        // then
        assert_eq!(resp.status(), want_status);
        assert_eq!(authenticator.authenticate_calls(), want_calls);
        assert_eq!(inner.seen_identity(), want_identity);
    }

    #[tokio::test]
    async fn test_auth_middleware_unauthorized_body_is_generic() {
        // given
        let authenticator = Arc::new(
            MockSignInAuthenticator::default()
                .with_authenticate(Err(VerificationError::BadAudience("com.evil".to_string()))),
        );
        let mut service = AppleSignInService {
            inner: MockService::default(),
            authenticator,
            no_auth: Vec::new(),
        };

        // when
        let resp = service.call(signed_in_request().body(()).unwrap()).await.unwrap();

        // then
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], UNAUTHORIZED_BODY.as_bytes());
    }

    #[rstest]
    #[case::valid(
        r#"{"firstName":"Christopher","lastName":"Prince","fullName":"Christopher Prince"}"#,
        Some(AccountDetails {
            first_name: Some("Christopher".to_string()),
            last_name: Some("Prince".to_string()),
            full_name: Some("Christopher Prince".to_string()),
            email: None,
        })
    )]
    #[case::empty_object("{}", Some(AccountDetails::default()))]
    #[case::not_json("Christopher Prince", None)]
    fn test_account_details(#[case] raw: &str, #[case] want: Option<AccountDetails>) {
        // given
        let mut headers = HeaderMap::new();
        headers.insert(ACCOUNT_DETAILS_HEADER, raw.parse().unwrap());

        // when
        let got = account_details(&headers);

        // then
        assert_eq!(got, want);
    }

    #[rstest]
    #[case::exact("/health", "/health", true)]
    #[case::wildcard("/*/health", "/apple/health", true)]
    #[case::different_length("/health", "/apple/health", false)]
    #[case::different_segment("/health", "/me", false)]
    fn test_matches_pattern(#[case] pattern: &str, #[case] path: &str, #[case] want: bool) {
        assert_eq!(matches_pattern(pattern, path), want);
    }

    #[derive(Clone, Default)]
    struct MockService {
        identity: Arc<Mutex<Option<IdentityRecord>>>,
    }

    impl MockService {
        fn seen_identity(&self) -> Option<IdentityRecord> {
            self.identity.lock().unwrap().clone()
        }
    }

    impl<ReqBody> Service<Request<ReqBody>> for MockService
    where
        ReqBody: Send + 'static,
    {
        type Response = Response<Body>;
        type Error = std::convert::Infallible;
        type Future = Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
            *self.identity.lock().unwrap() = req.extensions().get::<IdentityRecord>().cloned();
            ready(Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Body::empty())
                .unwrap()))
        }
    }
}
