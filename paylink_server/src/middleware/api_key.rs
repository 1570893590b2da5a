//! API key middleware for Actix Web.
//!
//! Every route under `/api` is for the merchant's own back office. Callers authenticate with the key configured in
//! `PLG_API_KEY`, sent as `Authorization: Bearer <key>`. A missing or wrong key gets a 401. If no key is configured,
//! every request is refused.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use plg_common::Secret;

use crate::{
    errors::ServerError,
    helpers::{bearer_token, keys_match},
};

pub struct ApiKeyMiddlewareFactory {
    key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorised = !self.key.is_blank()
            && bearer_token(req.request()).is_some_and(|token| keys_match(&token, self.key.reveal()));
        Box::pin(async move {
            if authorised {
                trace!("🔐️ API key check for {} ✅️", req.path());
                service.call(req).await
            } else {
                warn!("🔐️ Refused {} {}. Missing or invalid API key.", req.method(), req.path());
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}
