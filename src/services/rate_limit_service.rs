//! Throttling for both surfaces: per-IP request limits on the REST API (enforced by
//! `tower_governor`) and per-connection event limits on the gateway.

use crate::config::GatewayConfig;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Http,
    Gateway,
}

impl Scope {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Gateway => "gateway",
        }
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    decisions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            decisions_total: meter
                .u64_counter("reeltalk_rate_limit_decisions_total")
                .with_description("Rate limit decisions by scope and outcome")
                .build(),
        }
    }

    fn record(&self, scope: Scope, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "throttled" };
        self.decisions_total.add(1, &[KeyValue::new("scope", scope.as_str()), KeyValue::new("outcome", outcome)]);
    }
}

/// Networks whose `X-Forwarded-For` header is believed.
#[derive(Clone, Debug, Default)]
pub struct TrustedProxies(Vec<IpNetwork>);

impl TrustedProxies {
    #[must_use]
    pub const fn new(networks: Vec<IpNetwork>) -> Self {
        Self(networks)
    }

    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|net| net.contains(ip))
    }

    /// The client behind `peer`. A forwarded chain is only consulted when `peer` is a trusted
    /// proxy, and then the rightmost hop outside the trusted networks wins.
    #[must_use]
    pub fn client_ip(&self, forwarded_for: Option<&str>, peer: IpAddr) -> IpAddr {
        if !self.contains(peer) {
            return peer;
        }
        forwarded_for
            .into_iter()
            .flat_map(|chain| chain.rsplit(','))
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|ip| !self.contains(*ip))
            .unwrap_or(peer)
    }
}

/// Keys REST rate limits by resolved client IP.
#[derive(Clone, Debug)]
pub struct IpKeyExtractor {
    proxies: TrustedProxies,
}

impl IpKeyExtractor {
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        self.proxies.client_ip(headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()), peer)
    }
}

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) =
            req.extensions().get::<ConnectInfo<SocketAddr>>().ok_or(GovernorError::UnableToExtractKey)?;
        Ok(self.client_ip(req.headers(), peer.ip()))
    }
}

/// A token bucket owned by one gateway connection.
pub struct EventLimiter {
    limiter: DefaultDirectRateLimiter,
    per_second: NonZeroU32,
    burst: NonZeroU32,
}

impl std::fmt::Debug for EventLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLimiter").field("per_second", &self.per_second).field("burst", &self.burst).finish()
    }
}

impl EventLimiter {
    /// Zero rates are raised to one.
    #[must_use]
    pub fn new(per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self { limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)), per_second, burst }
    }

    /// Takes one token, returning false when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitService {
    pub extractor: IpKeyExtractor,
    gateway: GatewayConfig,
    metrics: Metrics,
}

impl RateLimitService {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>, gateway: GatewayConfig) -> Self {
        Self {
            extractor: IpKeyExtractor { proxies: TrustedProxies::new(trusted_proxies) },
            gateway,
            metrics: Metrics::new(),
        }
    }

    /// Records the outcome of a REST request that passed through the governor layer.
    pub fn log_decision(&self, status: StatusCode, retry_after: Option<String>) {
        let throttled = status == StatusCode::TOO_MANY_REQUESTS;
        if throttled {
            tracing::warn!(retry_after_secs = retry_after.as_deref().unwrap_or("unknown"), "Rate limit exceeded");
        }
        self.metrics.record(Scope::Http, !throttled);
    }

    /// A fresh bucket for a newly joined gateway connection.
    #[must_use]
    pub fn connection_limiter(&self) -> EventLimiter {
        EventLimiter::new(self.gateway.messages_per_second, self.gateway.message_burst)
    }

    /// Admits or throttles one gateway event against the connection's bucket.
    pub fn admit_event(&self, limiter: &EventLimiter) -> bool {
        let allowed = limiter.try_acquire();
        if !allowed {
            tracing::warn!("Gateway event rate limit exceeded");
        }
        self.metrics.record(Scope::Gateway, allowed);
        allowed
    }
}
