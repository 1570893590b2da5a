//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into the engine APIs. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which in turn awaits the
//! database and the processor, so nothing blocks.
//!
//! Routes:
//! * `GET /health`
//! * `POST /paystack/webhook`: processor callbacks. The raw body and the `x-paystack-signature` header go to the
//!   [`WebhookApi`] untouched.
//! * `GET /pay/{reference}`: redirects the customer to the processor's checkout page while the link is payable.
//! * The `/api` scope, behind the API key, for the merchant's back office.
use actix_web::{get, http::header::LOCATION, web, HttpRequest, HttpResponse, Responder};
use log::*;
use paylink_engine::{
    db_types::{NewOrder, OrderId},
    MessagingChannel,
    OrderApi,
    PaylinkDatabase,
    PaymentLinkApi,
    PaymentProcessor,
    ReminderApi,
    WebhookApi,
};
use paystack_tools::SIGNATURE_HEADER;
use serde_json::json;

use crate::{
    data_objects::{
        CancelOrderRequest,
        CreateLinkRequest,
        FireReminderRequest,
        JsonResponse,
        NewOrderRequest,
        OptOutRequest,
        OptOutResponse,
        OrderDetails,
        OrderRegistration,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(paystack_webhook => Post "/webhook" impl PaylinkDatabase, PaymentProcessor);
/// Processor callbacks. The response code is all the processor looks at: 200 means done (including duplicates and
/// events we ignore), 400 malformed, 401 bad signature, and 500 asks for a redelivery.
pub async fn paystack_webhook<B, P>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    trace!("💻️ Received webhook delivery of {} bytes", body.len());
    let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let ack = api.ingest(&body, signature).await.map_err(|e| {
        debug!("💻️ Webhook delivery was not accepted. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(json!({ "status": ack })))
}

//----------------------------------------------   Pay  ----------------------------------------------------
route!(pay => Get "/pay/{reference}" impl PaylinkDatabase, PaymentProcessor);
pub async fn pay<B, P>(path: web::Path<String>, api: web::Data<PaymentLinkApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    let reference = path.into_inner();
    trace!("💻️ Customer opened payment link {reference}");
    let link = api.ensure_payable(&reference).await?;
    Ok(HttpResponse::Found().insert_header((LOCATION, link.authorization_url)).finish())
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(register_order => Post "/orders" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
/// Records the order and schedules its reminder cascade. Returns 201 for a new order, 200 if it was already known.
/// A repeated registration fills in any reminders a failed earlier attempt did not schedule.
pub async fn register_order<B, P, M>(
    body: web::Json<NewOrderRequest>,
    orders: web::Data<OrderApi<B>>,
    reminders: web::Data<ReminderApi<B, P, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let order = NewOrder::try_from(body.into_inner())?;
    trace!("💻️ Registering order {}", order.id);
    let (order, created) = orders.register(order).await?;
    let reminders = reminders.ensure_scheduled(&order).await?;
    let result = OrderRegistration { order, created, reminders };
    let res = if created { HttpResponse::Created().json(result) } else { HttpResponse::Ok().json(result) };
    Ok(res)
}

route!(order_by_id => Get "/orders/{id}" impl PaylinkDatabase);
pub async fn order_by_id<B: PaylinkDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId(path.into_inner());
    let order = api.fetch(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {id}")))?;
    let notes = api.notes(id).await?;
    Ok(HttpResponse::Ok().json(OrderDetails { order, notes }))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl PaylinkDatabase);
pub async fn cancel_order<B: PaylinkDatabase>(
    path: web::Path<i64>,
    body: Option<web::Json<CancelOrderRequest>>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId(path.into_inner());
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ Cancel request for order {id}");
    let order = api.cancel(id, reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_reminders => Get "/orders/{id}/reminders" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
pub async fn order_reminders<B, P, M>(
    path: web::Path<i64>,
    api: web::Data<ReminderApi<B, P, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let reminders = api.reminders_for_order(OrderId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(reminders))
}

//----------------------------------------------   Links  ----------------------------------------------------
route!(create_link => Post "/links" impl PaylinkDatabase, PaymentProcessor);
pub async fn create_link<B, P>(
    body: web::Json<CreateLinkRequest>,
    api: web::Data<PaymentLinkApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    let CreateLinkRequest { request, options } = body.into_inner();
    let link = api.create(request, options).await?;
    Ok(HttpResponse::Ok().json(link))
}

route!(link_status => Get "/links/{reference}" impl PaylinkDatabase, PaymentProcessor);
pub async fn link_status<B, P>(
    path: web::Path<String>,
    api: web::Data<PaymentLinkApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    let report = api.status(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(expire_link => Post "/links/{reference}/expire" impl PaylinkDatabase, PaymentProcessor);
pub async fn expire_link<B, P>(
    path: web::Path<String>,
    api: web::Data<PaymentLinkApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
{
    let reference = path.into_inner();
    let result = if api.expire(&reference).await? {
        JsonResponse::success(format!("Link {reference} has been expired."))
    } else {
        JsonResponse::failure(format!("Link {reference} was not active."))
    };
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Reminders  ----------------------------------------------------
route!(fire_reminder => Post "/reminders/fire" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
/// The per-reminder entry point for an external scheduler.
pub async fn fire_reminder<B, P, M>(
    body: web::Json<FireReminderRequest>,
    api: web::Data<ReminderApi<B, P, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let FireReminderRequest { order_id, contact, sequence } = body.into_inner();
    let outcome = api.fire(OrderId(order_id), &contact, sequence).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(sweep => Post "/reminders/sweep" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
pub async fn sweep<B, P, M>(api: web::Data<ReminderApi<B, P, M>>) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let report = api.sweep().await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(opt_out => Post "/opt_out" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
pub async fn opt_out<B, P, M>(
    body: web::Json<OptOutRequest>,
    api: web::Data<ReminderApi<B, P, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let OptOutRequest { contact, reason } = body.into_inner();
    let cancelled_reminders = api.opt_out(&contact, reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(OptOutResponse { contact, cancelled_reminders }))
}

route!(opt_in => Delete "/opt_out/{contact}" impl PaylinkDatabase, PaymentProcessor, MessagingChannel);
pub async fn opt_in<B, P, M>(
    path: web::Path<String>,
    api: web::Data<ReminderApi<B, P, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaylinkDatabase,
    P: PaymentProcessor,
    M: MessagingChannel,
{
    let contact = path.into_inner();
    let result = if api.opt_in(&contact).await? {
        JsonResponse::success(format!("{contact} will receive reminders for new orders."))
    } else {
        JsonResponse::failure(format!("{contact} had not opted out."))
    };
    Ok(HttpResponse::Ok().json(result))
}
