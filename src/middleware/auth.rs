use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::auth::JWTKeys;
use crate::error::WorkflowError;

/// The signed-in user, as asserted by the session token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthenticatedUser {
    /// Name shown on the dashboard: the profile name, else the email's local part.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            if let Some(local) = email.split('@').next().filter(|l| !l.is_empty()) {
                return local.to_string();
            }
        }
        "User".to_string()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        ready(user.ok_or_else(|| WorkflowError::Unauthorized.into()))
    }
}

pub struct Authentication {
    pub keys: Arc<JWTKeys>,
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service,
            keys: self.keys.clone(),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
    keys: Arc<JWTKeys>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        // Missing or invalid tokens pass through; handlers needing a user reject via the extractor.
        match auth_header {
            Some(token) => match self.keys.verify(token) {
                Ok(claims) => {
                    debug!("Authenticated user: {}", &claims.sub);
                    req.extensions_mut().insert(AuthenticatedUser {
                        user_id: claims.sub,
                        name: claims.name,
                        email: claims.email,
                    });
                }
                Err(e) => {
                    warn!("Invalid token: {:?}", e);
                }
            },
            None => {
                debug!("No Authorization header found for {}", req.path());
            }
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}
