use async_trait::async_trait;
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tower::util::ServiceExt;
use uuid::Uuid;
use worko_users::{
    AppState, InMemoryUserRepository, create_router,
    auth::{AuthUser, Claims},
    config::{AppConfig, Env},
    models::{NewUser, User, UserChanges},
    repository::{RepositoryResult, UserRepository},
};

const TEST_JWT_SECRET: &str = "super-secure-test-secret-value";

// --- Counting Repository ---

/// Delegates to the in-memory store and counts every call that reaches it.
#[derive(Default)]
struct CountingRepo {
    inner: InMemoryUserRepository,
    calls: AtomicUsize,
}

impl CountingRepo {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for CountingRepo {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        self.tick();
        self.inner.create_user(user).await
    }
    async fn get_user_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        self.tick();
        self.inner.get_user_by_id(id).await
    }
    async fn get_users(&self) -> RepositoryResult<Vec<User>> {
        self.tick();
        self.inner.get_users().await
    }
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        self.tick();
        self.inner.update_user(id, changes).await
    }
    async fn delete_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        self.tick();
        self.inner.delete_user(id).await
    }
}

// --- Helpers ---

fn now() -> usize {
    chrono::Utc::now().timestamp() as usize
}

/// Signs a token for `sub` that expires `ttl_secs` from now (negative for the past).
fn create_token(sub: &str, ttl_secs: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now().timestamp() + ttl_secs) as usize,
        iat: now(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn config_with_secret(secret: Option<&str>) -> AppConfig {
    AppConfig {
        env: Env::Production,
        jwt_secret: secret.map(str::to_string),
        ..AppConfig::default()
    }
}

fn create_app_state(repo: Arc<CountingRepo>, secret: Option<&str>) -> AppState {
    AppState::new(repo, config_with_secret(secret))
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_pass_through_without_secret() {
    let app_state = create_app_state(Arc::new(CountingRepo::default()), None);
    let mut parts = get_request_parts(Method::GET, "/worko/user".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user, Ok(AuthUser::anonymous()));
}

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = create_app_state(Arc::new(CountingRepo::default()), Some(TEST_JWT_SECRET));
    let mut parts = get_request_parts(Method::GET, "/worko/user".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", create_token("alice", 3600))).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(auth_user.subject.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Arc::new(CountingRepo::default()), Some(TEST_JWT_SECRET));
    let mut parts = get_request_parts(Method::GET, "/worko/user".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state = create_app_state(Arc::new(CountingRepo::default()), Some(TEST_JWT_SECRET));
    let mut parts = get_request_parts(Method::GET, "/worko/user".parse().unwrap());
    // Well past the default 60 second leeway.
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", create_token("alice", -3600))).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let app_state = create_app_state(Arc::new(CountingRepo::default()), Some("another-secret"));
    let mut parts = get_request_parts(Method::GET, "/worko/user".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", create_token("alice", 3600))).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user, Err(StatusCode::UNAUTHORIZED));
}

// --- Router Gate Tests ---

#[tokio::test]
async fn test_gate_rejection_never_reaches_the_store() {
    let repo = Arc::new(CountingRepo::default());
    let app = create_router(create_app_state(repo.clone(), Some(TEST_JWT_SECRET)));

    for (method, uri) in [
        ("GET", "/worko/user".to_string()),
        ("GET", format!("/worko/user/{}", Uuid::new_v4())),
        ("DELETE", format!("/worko/user/{}", Uuid::new_v4())),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gate_admits_valid_token_and_leaves_health_public() {
    let repo = Arc::new(CountingRepo::default());
    let app = create_router(create_app_state(repo.clone(), Some(TEST_JWT_SECRET)));

    let listed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/worko/user")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", create_token("alice", 3600)),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 1);

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_gate_leaves_unmatched_paths_as_not_found() {
    let repo = Arc::new(CountingRepo::default());
    let app = create_router(create_app_state(repo.clone(), Some(TEST_JWT_SECRET)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/worko/nothing-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
}
