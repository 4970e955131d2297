use crate::core::AppError;
use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Paths reachable without a bearer token
const PUBLIC_PATHS: &[&str] = &["/health", "/ready", "/payments/webhook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::unauthorized("Unknown role")),
        }
    }
}

/// Authenticated principal attached to the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may act on a user's resources
    pub fn ensure_can_access(&self, owner_id: &str) -> crate::core::Result<()> {
        if self.is_admin() || self.user_id == owner_id {
            return Ok(());
        }
        Err(AppError::forbidden("Resource belongs to another user"))
    }

    pub fn ensure_admin(&self) -> crate::core::Result<()> {
        if self.is_admin() {
            return Ok(());
        }
        Err(AppError::forbidden("Administrator role required"))
    }
}

impl FromRequest for Caller {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Caller>()
                .cloned()
                .ok_or_else(|| AppError::unauthorized("Authentication required").into()),
        )
    }
}

/// Signs and checks bearer tokens of the form
/// `<user_id>.<role>.<expires_unix>.<hex hmac-sha256>`
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<Vec<u8>>,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::new(secret.as_ref().to_vec()),
        }
    }

    fn mac(&self, claims: &str) -> crate::core::Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Configuration(format!("Invalid token secret: {}", e)))?;
        mac.update(claims.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, user_id: &str, role: Role, expires_at: DateTime<Utc>) -> crate::core::Result<String> {
        if user_id.is_empty() {
            return Err(AppError::validation("User ID cannot be empty"));
        }
        let claims = format!("{}.{}.{}", user_id, role, expires_at.timestamp());
        let signature = hex::encode(self.mac(&claims)?.finalize().into_bytes());
        Ok(format!("{}.{}", claims, signature))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> crate::core::Result<Caller> {
        // User ids may contain dots, so split from the right.
        let mut parts = token.rsplitn(4, '.');
        let (Some(signature), Some(expires), Some(role), Some(user_id)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::unauthorized("Malformed token"));
        };
        if user_id.is_empty() {
            return Err(AppError::unauthorized("Malformed token"));
        }

        let signature =
            hex::decode(signature).map_err(|_| AppError::unauthorized("Malformed token"))?;
        let claims = format!("{}.{}.{}", user_id, role, expires);
        self.mac(&claims)?
            .verify_slice(&signature)
            .map_err(|_| AppError::unauthorized("Invalid token signature"))?;

        let expires: i64 = expires
            .parse()
            .map_err(|_| AppError::unauthorized("Malformed token"))?;
        if expires <= now.timestamp() {
            return Err(AppError::unauthorized("Token expired"));
        }

        Ok(Caller::new(user_id, role.parse()?))
    }
}

/// Bearer token authentication middleware
pub struct TokenAuth {
    verifier: TokenVerifier,
}

impl TokenAuth {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type InitError = ();
    type Transform = TokenAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenAuthMiddleware {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct TokenAuthMiddleware<S> {
    service: Rc<S>,
    verifier: TokenVerifier,
}

impl<S, B> Service<ServiceRequest> for TokenAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<BoxBody, B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let verifier = self.verifier.clone();

        Box::pin(async move {
            if PUBLIC_PATHS.contains(&req.path()) {
                return svc.call(req).await.map(|res| res.map_into_right_body());
            }

            let token = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim);

            let caller = match token {
                Some(token) => verifier.verify(token, Utc::now()),
                None => Err(AppError::unauthorized("Missing bearer token")),
            };

            match caller {
                Ok(caller) => {
                    req.extensions_mut().insert(caller);
                    svc.call(req).await.map(|res| res.map_into_right_body())
                }
                Err(e) => {
                    if token.is_some() {
                        tracing::warn!(
                            security_event = true,
                            path = %req.path(),
                            peer = ?req.peer_addr(),
                            error = %e,
                            "Rejected bearer token"
                        );
                    }
                    let response = e.error_response();
                    Ok(req.into_response(response).map_into_left_body())
                }
            }
        })
    }
}
