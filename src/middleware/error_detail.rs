/// Internal error detail echo
///
/// `AppError` always renders 500s without detail. Wrapped around the app
/// with an environment that allows it, this middleware re-renders those
/// responses with the `error` field filled in.
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::configuration::Environment;
use crate::error::AppError;

pub struct ErrorDetail {
    expose: bool,
}

impl ErrorDetail {
    pub fn new(environment: Environment) -> Self {
        Self {
            expose: environment.exposes_error_detail(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ErrorDetail
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ErrorDetailService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ErrorDetailService {
            service: Rc::new(service),
            expose: self.expose,
        }))
    }
}

pub struct ErrorDetailService<S> {
    service: Rc<S>,
    expose: bool,
}

impl<S, B> Service<ServiceRequest> for ErrorDetailService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let expose = self.expose;

        Box::pin(async move {
            let res = service.call(req).await?;
            if !expose {
                return Ok(res.map_into_left_body());
            }

            let detailed = res
                .response()
                .error()
                .and_then(|err| err.as_error::<AppError>())
                .filter(|err| err.internal_detail().is_some())
                .map(|err| err.render(true));

            match detailed {
                Some(response) => Ok(res.into_response(response).map_into_right_body()),
                None => Ok(res.map_into_left_body()),
            }
        })
    }
}
