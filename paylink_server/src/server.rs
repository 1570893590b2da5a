use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::future::{ok, FutureExt};
use log::*;
use paylink_engine::{
    events::{EventHandlers, EventHooks},
    OrderApi,
    PaymentLinkApi,
    ReminderApi,
    ReminderManagement,
    SqliteDatabase,
    TransactionValidator,
    WebhookApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    helpers::get_remote_ip,
    integrations::{messaging::HttpMessenger, paystack::GatewayProcessor},
    middleware::ApiKeyMiddlewareFactory,
    routes::{
        health,
        CancelOrderRoute,
        CreateLinkRoute,
        ExpireLinkRoute,
        FireReminderRoute,
        LinkStatusRoute,
        OptInRoute,
        OptOutRoute,
        OrderByIdRoute,
        OrderRemindersRoute,
        PayRoute,
        PaystackWebhookRoute,
        RegisterOrderRoute,
        SweepRoute,
    },
    workers::{start_reminder_worker, start_sweep_worker},
};

pub type GatewayLinkApi = PaymentLinkApi<SqliteDatabase, GatewayProcessor>;
pub type GatewayWebhookApi = WebhookApi<SqliteDatabase, GatewayProcessor>;
pub type GatewayReminderApi = ReminderApi<SqliteDatabase, GatewayProcessor, HttpMessenger>;
pub type GatewayOrderApi = OrderApi<SqliteDatabase>;

/// The engine APIs shared by every worker thread.
#[derive(Clone)]
pub struct GatewayApis {
    pub orders: GatewayOrderApi,
    pub links: GatewayLinkApi,
    pub webhooks: GatewayWebhookApi,
    pub reminders: GatewayReminderApi,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let apis = build_apis(&config, db).await?;
    if apis.reminders.config().enabled {
        let _ = start_reminder_worker(apis.reminders.clone(), config.reminder_poll_interval);
    } else {
        info!("⏰️ Reminders are disabled. The reminder worker will not be started");
    }
    let _ = start_sweep_worker(apis.reminders.clone(), config.sweep_interval);
    let srv = create_server_instance(config, apis)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wires the processor, the messaging relay and the event hooks into the engine APIs.
pub async fn build_apis(config: &ServerConfig, db: SqliteDatabase) -> Result<GatewayApis, ServerError> {
    let processor = Arc::new(GatewayProcessor::from_config(config.paystack.clone()));
    if !processor.is_available() {
        warn!("💳️ Running without Paystack credentials. Links cannot be created and webhooks will be refused.");
    }
    let messenger = Arc::new(HttpMessenger::new(&config.messaging)?);
    let validator = Arc::new(TransactionValidator::new(config.validation.clone()));
    let handlers = EventHandlers::new(128, reminder_cancellation_hooks(db.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let links = PaymentLinkApi::new(db.clone(), processor, validator, config.links.clone(), producers.clone());
    let webhooks = WebhookApi::new(links.clone(), producers.clone());
    let reminders = ReminderApi::new(links.clone(), messenger, config.reminders.clone());
    let orders = OrderApi::new(db, producers);
    Ok(GatewayApis { orders, links, webhooks, reminders })
}

/// Pending reminders are cancelled as soon as their order is paid or annulled. The fire-time re-check still catches
/// any reminder that slips past these hooks.
pub fn reminder_cancellation_hooks(db: SqliteDatabase) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_db = db.clone();
    hooks.on_order_paid(move |ev| {
        let db = paid_db.clone();
        async move {
            match db.cancel_reminders_for_order(ev.order.id, "order paid").await {
                Ok(0) => trace!("📬️ Order {} paid. No reminders were pending", ev.order.id),
                Ok(n) => info!("📬️ Order {} paid via {}. {n} reminders cancelled", ev.order.id, ev.reference),
                Err(e) => error!("📬️ Could not cancel the reminders of paid order {}. {e}", ev.order.id),
            }
        }
        .boxed()
    });
    hooks.on_order_annulled(move |ev| {
        let db = db.clone();
        async move {
            let reason = format!("order {}", ev.status);
            match db.cancel_reminders_for_order(ev.order.id, &reason).await {
                Ok(n) => debug!("📬️ Order {} annulled. {n} reminders cancelled", ev.order.id),
                Err(e) => error!("📬️ Could not cancel the reminders of annulled order {}. {e}", ev.order.id),
            }
        }
        .boxed()
    });
    hooks
}

pub fn create_server_instance(config: ServerConfig, apis: GatewayApis) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let api_key = config.api_key.clone();
    if api_key.is_blank() {
        warn!("🔐️ PLG_API_KEY is not set. Every request to /api will be refused");
    }
    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("plg::access_log"))
            .app_data(web::Data::new(apis.orders.clone()))
            .app_data(web::Data::new(apis.links.clone()))
            .app_data(web::Data::new(apis.webhooks.clone()))
            .app_data(web::Data::new(apis.reminders.clone()));
        let api_scope = web::scope("/api")
            .wrap(ApiKeyMiddlewareFactory::new(api_key.clone()))
            .service(RegisterOrderRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(OrderRemindersRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new())
            .service(CreateLinkRoute::<SqliteDatabase, GatewayProcessor>::new())
            .service(LinkStatusRoute::<SqliteDatabase, GatewayProcessor>::new())
            .service(ExpireLinkRoute::<SqliteDatabase, GatewayProcessor>::new())
            .service(FireReminderRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new())
            .service(SweepRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new())
            .service(OptOutRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new())
            .service(OptInRoute::<SqliteDatabase, GatewayProcessor, HttpMessenger>::new());
        let options = options.clone();
        let paystack_scope = web::scope("/paystack")
            .wrap_fn(move |req, srv| {
                // The peer IP comes from x-forwarded-for or forwarded headers _only_ if the configuration trusts them.
                let peer_ip = get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded);
                let whitelisted = match (peer_ip, &options.webhook_whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("🪝️ Paystack webhook from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("🪝️ No IP address found in webhook request, denying access.");
                        false
                    },
                };
                if whitelisted {
                    srv.call(req)
                } else {
                    ok(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(PaystackWebhookRoute::<SqliteDatabase, GatewayProcessor>::new());
        app.service(health)
            .service(PayRoute::<SqliteDatabase, GatewayProcessor>::new())
            .service(paystack_scope)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
