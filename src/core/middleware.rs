use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase",
];

enum Credentials {
    ServiceAccount {
        key: ServiceAccountKey,
        authenticator: OnceCell<DefaultAuthenticator>,
    },
    /// Fixed bearer token, used against the local emulators and in tests.
    Static(String),
}

/// Injects an OAuth2 bearer token into every outgoing Firebase request.
#[derive(Clone)]
pub struct AuthMiddleware {
    credentials: Arc<Credentials>,
}

impl AuthMiddleware {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self {
            credentials: Arc::new(Credentials::ServiceAccount {
                key,
                authenticator: OnceCell::new(),
            }),
        }
    }

    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            credentials: Arc::new(Credentials::Static(token.into())),
        }
    }

    /// The project id carried by the service account key, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self.credentials.as_ref() {
            Credentials::ServiceAccount { key, .. } => key.project_id.as_deref(),
            Credentials::Static(_) => None,
        }
    }

    async fn get_token(&self) -> Result<String, anyhow::Error> {
        match self.credentials.as_ref() {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ServiceAccount { key, authenticator } => {
                let auth = authenticator
                    .get_or_try_init(|| async {
                        ServiceAccountAuthenticator::builder(key.clone()).build().await
                    })
                    .await?;

                let token = auth.token(SCOPES).await?;

                Ok(token
                    .token()
                    .ok_or_else(|| anyhow::anyhow!("No token found"))?
                    .to_string())
            }
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.get_token().await.map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Failed to get auth token: {}", e))
        })?;

        let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid auth token: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
