use anyhow::{Context, Result, bail};
use kernel_domain::eventing::{BackpressurePolicy, BusConfig, EventEngineConfig};
use std::str::FromStr;
use std::time::Duration;

/// 服务配置，从 `REVIEW_*` 环境变量读取
///
/// 每项都有适用于单进程部署的默认值。
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    // 事件总线
    pub bus_capacity: usize,
    pub backpressure: BackpressurePolicy,

    // 对账
    pub reconcile_interval: Duration,
    pub stuck_grace: Duration,

    // 通知
    pub notify_channel: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bus_capacity: BusConfig::default().capacity,
            backpressure: BackpressurePolicy::DropNewest,
            reconcile_interval: EventEngineConfig::default().reconcile_interval,
            stuck_grace: Duration::from_secs(30),
            notify_channel: "reviews".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_values();
        Ok(config)
    }

    /// 从任意键值查找函数构造配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bus_capacity: parse(&lookup, "REVIEW_BUS_CAPACITY")?.unwrap_or(defaults.bus_capacity),
            backpressure: match lookup("REVIEW_BUS_BACKPRESSURE").as_deref() {
                None => defaults.backpressure,
                Some("drop") | Some("drop-newest") => BackpressurePolicy::DropNewest,
                Some("block") => BackpressurePolicy::Block,
                Some(other) => {
                    bail!("REVIEW_BUS_BACKPRESSURE must be `drop` or `block`, got `{other}`")
                }
            },
            reconcile_interval: parse(&lookup, "REVIEW_RECONCILE_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            stuck_grace: parse(&lookup, "REVIEW_STUCK_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.stuck_grace),
            notify_channel: lookup("REVIEW_NOTIFY_CHANNEL").unwrap_or(defaults.notify_channel),
        };

        if config.bus_capacity == 0 {
            bail!("REVIEW_BUS_CAPACITY must be greater than zero");
        }
        if config.reconcile_interval.is_zero() {
            bail!("REVIEW_RECONCILE_INTERVAL_SECS must be greater than zero");
        }
        Ok(config)
    }

    pub fn bus(&self) -> BusConfig {
        BusConfig {
            capacity: self.bus_capacity,
            policy: self.backpressure,
        }
    }

    pub fn engine(&self) -> EventEngineConfig {
        EventEngineConfig {
            reconcile_interval: self.reconcile_interval,
        }
    }

    fn log_values(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  REVIEW_BUS_CAPACITY: {}", self.bus_capacity);
        tracing::info!("  REVIEW_BUS_BACKPRESSURE: {:?}", self.backpressure);
        tracing::info!("  REVIEW_RECONCILE_INTERVAL_SECS: {}", self.reconcile_interval.as_secs());
        tracing::info!("  REVIEW_STUCK_GRACE_SECS: {}", self.stuck_grace.as_secs());
        tracing::info!("  REVIEW_NOTIFY_CHANNEL: {}", self.notify_channel);
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: `{raw}`")))
        .transpose()
}
