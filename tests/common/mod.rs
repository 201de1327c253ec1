use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use compliance_backend::auth::jwt::JwtService;
use compliance_backend::config::AppConfig;
use compliance_backend::db::{self, PgPool};
use compliance_backend::models::NewUser;
use compliance_backend::routes;
use compliance_backend::state::{AppState, Buckets};
use compliance_backend::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_MAX_UPLOAD_BYTES: usize = 4096;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        content_disposition: Option<String>,
    ) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        let disposition = content_disposition
            .as_deref()
            .and_then(|value| value.split(';').next())
            .unwrap_or("none");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}&disposition={disposition}",
            expires_in.as_secs()
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

/// A file part for multipart uploads.
pub struct FilePart<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> FilePart<'a> {
    #[allow(dead_code)]
    pub fn pdf(bytes: &'a [u8]) -> Self {
        Self {
            name: "scan.pdf",
            content_type: "application/pdf",
            bytes,
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    documents: Arc<FakeStorage>,
    policies: Arc<FakeStorage>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_documents_bucket: "test-documents".to_string(),
            s3_policies_bucket: "test-policies".to_string(),
            max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
            profile_insert_attempts: 5,
            profile_insert_backoff_ms: 0,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let documents = Arc::new(FakeStorage::default());
        let policies = Arc::new(FakeStorage::default());
        let buckets = Buckets {
            documents: documents.clone(),
            policies: policies.clone(),
        };
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, buckets, jwt);
        let router = routes::create_router(state.clone()).map_err(|err| anyhow!("{err}"))?;

        Ok(Self {
            state,
            router,
            documents,
            policies,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn documents_bucket(&self) -> Arc<FakeStorage> {
        self.documents.clone()
    }

    #[allow(dead_code)]
    pub fn policies_bucket(&self) -> Arc<FakeStorage> {
        self.policies.clone()
    }

    /// Registers through the API and returns the new user's id and access token.
    pub async fn register(
        &self,
        email: &str,
        designation: &str,
        department: &str,
    ) -> Result<(Uuid, String)> {
        let (first_name, last_name) = email
            .split_once('@')
            .map(|(local, _)| (local, "Tester"))
            .unwrap_or((email, "Tester"));
        let response = self
            .post_json(
                "/api/auth/register",
                &json!({
                    "email": email,
                    "password": "correct-horse",
                    "first_name": first_name,
                    "last_name": last_name,
                    "department": department,
                    "designation": designation,
                    "phone": "+92 300 0000000",
                }),
                None,
            )
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "registration failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct Registered {
            access_token: String,
            profile: RegisteredProfile,
        }
        #[derive(serde::Deserialize)]
        struct RegisteredProfile {
            id: Uuid,
        }
        let parsed: Registered = read_json(response).await?;
        Ok((parsed.profile.id, parsed.access_token))
    }

    /// Registers an HR officer; the role is assigned out of band like the
    /// maintenance CLI does.
    #[allow(dead_code)]
    pub async fn register_hr(&self, email: &str, department: &str) -> Result<(Uuid, String)> {
        let (id, token) = self.register(email, "officer", department).await?;
        self.with_conn(move |conn| {
            use compliance_backend::schema::profiles;
            diesel::update(profiles::table.find(id))
                .set(profiles::role.eq("hr"))
                .execute(conn)
                .context("failed to grant hr role")?;
            Ok(())
        })
        .await?;
        Ok((id, token))
    }

    /// Creates an identity without a profile, as if the account predates registration.
    #[allow(dead_code)]
    pub async fn insert_user(&self, email: &str, password: &str) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        self.with_conn(move |conn| {
            let password_hash = compliance_backend::auth::password::hash_password(&password)?;
            let user = NewUser {
                id: Uuid::new_v4(),
                email,
                password_hash,
            };
            diesel::insert_into(compliance_backend::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post_json(
                "/api/auth/login",
                &json!({ "email": email, "password": password }),
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.access_token)
    }

    #[allow(dead_code)]
    pub async fn count_rows(&self, table: &'static str, owner: Uuid) -> Result<i64> {
        self.with_conn(move |conn| {
            use compliance_backend::schema::{documents, profiles};
            let count = match table {
                "documents" => documents::table
                    .filter(documents::uploaded_by.eq(owner))
                    .count()
                    .get_result(conn)?,
                "profiles" => profiles::table
                    .filter(profiles::id.eq(owner))
                    .count()
                    .get_result(conn)?,
                other => return Err(anyhow!("unsupported table {other}")),
            };
            Ok(count)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str, token: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, Some(token)).await
    }

    #[allow(dead_code)]
    pub async fn post_with_cookie(
        &self,
        path: &str,
        cookie: &str,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("cookie", cookie)
            .body(Body::empty())?;
        self.dispatch(request).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, Some(token)).await
    }

    #[allow(dead_code)]
    pub async fn upload(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: Option<FilePart<'_>>,
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        if let Some(file) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    file.name
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend(file.bytes);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        self.dispatch(request).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.dispatch(builder.body(Body::from(body))?).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.dispatch(builder.body(Body::empty())?).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE company_policies, documents, profiles, refresh_tokens, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
