use std::{env, net::IpAddr, time::Duration};

use log::*;
use paylink_engine::{
    plg_api::{
        link_objects::{LinkConfig, DEFAULT_LINK_TTL_HOURS, DEFAULT_REFERENCE_PREFIX},
        reminder_objects::{ReminderConfig, DEFAULT_MAX_REMINDERS, DEFAULT_REMINDER_DELAYS, DEFAULT_RETRY_DELAY_SECS},
    },
    ValidationRules,
};
use paystack_tools::PaystackConfig;
use plg_common::{parse_boolean_flag, parse_list, Secret};

const DEFAULT_PLG_HOST: &str = "127.0.0.1";
const DEFAULT_PLG_PORT: u16 = 8460;
const DEFAULT_ALLOWED_CHANNELS: &str = "card,bank,ussd,qr,mobile_money,bank_transfer";
const DEFAULT_MESSAGING_TIMEOUT_SECS: u64 = 20;
const DEFAULT_REMINDER_POLL_SECS: u64 = 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub paystack: PaystackConfig,
    /// Bearer key for the `/api` scope. When blank, every `/api` request is refused.
    pub api_key: Secret<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// If supplied, webhook deliveries are only accepted from these addresses.
    pub webhook_whitelist: Option<Vec<IpAddr>>,
    pub links: LinkConfig,
    pub reminders: ReminderConfig,
    pub validation: ValidationRules,
    pub messaging: MessagingConfig,
    pub reminder_poll_interval: Duration,
    pub sweep_interval: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct MessagingConfig {
    /// The endpoint reminders are POSTed to. Without it, reminders fail and are retried until the budget is spent.
    pub url: Option<String>,
    pub token: Secret<String>,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PLG_HOST.to_string(),
            port: DEFAULT_PLG_PORT,
            database_url: String::default(),
            paystack: PaystackConfig::default(),
            api_key: Secret::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            webhook_whitelist: None,
            links: LinkConfig::default(),
            reminders: ReminderConfig::default(),
            validation: ValidationRules::default(),
            messaging: MessagingConfig {
                timeout: Duration::from_secs(DEFAULT_MESSAGING_TIMEOUT_SECS),
                ..Default::default()
            },
            reminder_poll_interval: Duration::from_secs(DEFAULT_REMINDER_POLL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PLG_HOST").ok().unwrap_or_else(|| DEFAULT_PLG_HOST.into());
        let port = env::var("PLG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PLG_PORT. {e} Using the default, {DEFAULT_PLG_PORT}, instead."
                    );
                    DEFAULT_PLG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PLG_PORT);
        let database_url = env::var("PLG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PLG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let paystack = PaystackConfig::new_from_env_or_default();
        let api_key = Secret::new(env::var("PLG_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ PLG_API_KEY is not set. All /api requests will be refused.");
            String::default()
        }));
        let use_x_forwarded_for = parse_boolean_flag(env::var("PLG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("PLG_USE_FORWARDED").ok(), false);
        let webhook_whitelist = configure_whitelist();
        let links = configure_links();
        let messaging = MessagingConfig {
            url: env::var("PLG_MESSAGING_URL").ok().filter(|s| !s.trim().is_empty()),
            token: Secret::new(env::var("PLG_MESSAGING_TOKEN").ok().unwrap_or_default()),
            timeout: Duration::from_secs(env_secs("PLG_MESSAGING_TIMEOUT_SECS", DEFAULT_MESSAGING_TIMEOUT_SECS)),
        };
        let reminders = configure_reminders(messaging.timeout);
        if messaging.url.is_none() && reminders.enabled {
            warn!("🪛️ PLG_MESSAGING_URL is not set. Reminders are enabled but cannot be delivered.");
        }
        let validation = ValidationRules::default().with_channels(links.channels.clone());
        Self {
            host,
            port,
            database_url,
            paystack,
            api_key,
            use_x_forwarded_for,
            use_forwarded,
            webhook_whitelist,
            links,
            reminders,
            validation,
            messaging,
            reminder_poll_interval: Duration::from_secs(env_secs("PLG_REMINDER_POLL_SECS", DEFAULT_REMINDER_POLL_SECS)),
            sweep_interval: Duration::from_secs(env_secs("PLG_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)),
        }
    }
}

fn configure_whitelist() -> Option<Vec<IpAddr>> {
    let whitelist = env::var("PLG_PAYSTACK_IP_WHITELIST").ok().and_then(|s| {
        if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
            info!(
                "🪛️ Paystack IP whitelist is disabled. If this is not what you want, set PLG_PAYSTACK_IP_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = parse_list(&s)
            .into_iter()
            .filter_map(|s| {
                s.parse()
                    .map_err(|e| {
                        warn!("🪛️ Ignoring invalid IP address ({s}) in PLG_PAYSTACK_IP_WHITELIST: {e}");
                    })
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The Paystack IP whitelist was configured, but is empty.  The server will run, but won't accept any \
                 webhook deliveries."
            );
        },
        None => {
            info!("🪛️ No Paystack IP whitelist is set. Only signature validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Paystack IP whitelist: {addrs}");
        },
    }
    whitelist
}

fn configure_links() -> LinkConfig {
    let ttl_hours = env::var("PLG_LINK_TTL_HOURS")
        .map_err(|_| info!("🪛️ PLG_LINK_TTL_HOURS is not set. Using the default value of {DEFAULT_LINK_TTL_HOURS} hrs."))
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for PLG_LINK_TTL_HOURS. {e}"))
                .and_then(|h| if h > 0 { Ok(h) } else { Err(warn!("🪛️ PLG_LINK_TTL_HOURS must be positive")) })
        })
        .ok()
        .unwrap_or(DEFAULT_LINK_TTL_HOURS);
    let reference_prefix = env::var("PLG_REFERENCE_PREFIX")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REFERENCE_PREFIX.to_string());
    let callback_url = env::var("PLG_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
    let channels = parse_list(&env::var("PLG_ALLOWED_CHANNELS").unwrap_or_else(|_| DEFAULT_ALLOWED_CHANNELS.into()));
    LinkConfig { ttl: chrono::Duration::hours(ttl_hours), reference_prefix, callback_url, channels }
}

/// Reminder sends are given as long as the messaging relay itself is allowed.
fn configure_reminders(send_timeout: Duration) -> ReminderConfig {
    let enabled = parse_boolean_flag(env::var("PLG_REMINDERS_ENABLED").ok(), true);
    let max_reminders = env::var("PLG_REMINDER_MAX")
        .ok()
        .and_then(|s| s.parse::<usize>().map_err(|e| warn!("🪛️ Invalid configuration value for PLG_REMINDER_MAX. {e}")).ok())
        .unwrap_or(DEFAULT_MAX_REMINDERS);
    let delays = match env::var("PLG_REMINDER_DELAYS") {
        Ok(s) => parse_delays(&s).unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for PLG_REMINDER_DELAYS. {e} Using the defaults.");
            default_delays()
        }),
        Err(_) => default_delays(),
    };
    let retry_delay = Duration::from_secs(env_secs("PLG_REMINDER_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY_SECS));
    if !enabled {
        info!("🪛️ Reminders are disabled");
    }
    ReminderConfig { enabled, delays, max_reminders, retry_delay, send_timeout, ..ReminderConfig::default() }
}

fn default_delays() -> Vec<Duration> {
    DEFAULT_REMINDER_DELAYS.iter().map(|s| Duration::from_secs(*s)).collect()
}

/// Parses a comma-separated list of delays in seconds.
pub fn parse_delays(s: &str) -> Result<Vec<Duration>, String> {
    let delays = parse_list(s)
        .iter()
        .map(|v| v.parse::<u64>().map(Duration::from_secs).map_err(|e| format!("'{v}' is not a number of seconds. {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    if delays.is_empty() {
        return Err("No delays were given.".into());
    }
    Ok(delays)
}

fn env_secs(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub webhook_whitelist: Option<Vec<IpAddr>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            webhook_whitelist: config.webhook_whitelist.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reminder_delays() {
        let delays = parse_delays("3600, 86400,259200").unwrap();
        assert_eq!(delays, vec![Duration::from_secs(3600), Duration::from_secs(86_400), Duration::from_secs(259_200)]);
        assert!(parse_delays("60,soon").is_err());
        assert!(parse_delays(" , ").is_err());
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8460);
        assert_eq!(config.links.ttl, chrono::Duration::hours(24));
        assert_eq!(config.reminders.cascade_length(), 3);
        assert!(config.api_key.is_blank());
        assert!(config.webhook_whitelist.is_none());
        assert_eq!(config.reminders.send_timeout, config.messaging.timeout);
    }

    #[test]
    fn reminder_sends_use_the_messaging_timeout() {
        let reminders = configure_reminders(Duration::from_secs(45));
        assert_eq!(reminders.send_timeout, Duration::from_secs(45));
    }
}
