// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Per-client request rate limiting
//!
//! Clients are counted in fixed windows that start with their first request.
//! Once the post-increment count exceeds the configured maximum the request is
//! rejected with 429 until the window resets.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{config::RateLimitingConfig, error::ServerError, metrics};

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const UNKNOWN_CLIENT: &str = "unknown";
const FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

/// `RateLimit-Policy` response header
pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
/// `RateLimit-Limit` response header
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
/// `RateLimit-Remaining` response header
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
/// `RateLimit-Reset` response header
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Rate limiting middleware state
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitingConfig,
    // Lock-free concurrent rate limiting using DashMap
    requests: Arc<DashMap<String, RequestCounter>>,
}

#[derive(Debug, Clone)]
struct RequestCounter {
    count: u32,
    window_start: Instant,
}

/// Outcome of counting one request against a client's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Requests counted in the current window, including this one
    pub count: u32,
    /// Window length
    pub window: Duration,
    /// Time until the current window resets
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whether this request exceeded the limit
    pub fn is_limited(&self) -> bool {
        self.count > self.limit
    }

    /// Requests left in the current window
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    /// Write the standard `RateLimit-*` headers
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        if let Ok(policy) =
            HeaderValue::from_str(&format!("{};w={}", self.limit, self.window.as_secs()))
        {
            headers.insert(RATELIMIT_POLICY, policy);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining()));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(self.reset_after)));
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimitingConfig) -> Self {
        Self {
            config,
            requests: Arc::new(DashMap::new()),
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether clients are identified by `X-Forwarded-For`
    pub fn trusts_proxy(&self) -> bool {
        self.config.trust_proxy
    }

    /// Number of clients with a tracked window
    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }

    /// Count a request for `client` and report the resulting window state
    ///
    /// Returns `None` when rate limiting is disabled.
    pub fn check(&self, client: &str) -> Option<RateLimitDecision> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let window = self.config.window;

        // Periodically clean up expired entries to prevent memory leaks
        if self.requests.len() > MAX_RATE_LIMIT_ENTRIES {
            self.cleanup_expired_entries(now, window);
        }

        // The entry guard holds the shard lock, so read-modify-write is atomic per client
        let counter = self
            .requests
            .entry(client.to_string())
            .and_modify(|counter| {
                if now.duration_since(counter.window_start) >= window {
                    counter.count = 1;
                    counter.window_start = now;
                } else {
                    counter.count = counter.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RequestCounter {
                count: 1,
                window_start: now,
            });

        let decision = RateLimitDecision {
            limit: self.config.max_requests,
            count: counter.count,
            window,
            reset_after: window.saturating_sub(now.duration_since(counter.window_start)),
        };
        drop(counter);

        if decision.is_limited() {
            debug!("rate limiting client: {} ({} requests)", client, decision.count);
        }

        Some(decision)
    }

    #[cfg(test)]
    fn is_rate_limited(&self, client: &str) -> bool {
        self.check(client)
            .is_some_and(|decision| decision.is_limited())
    }

    /// Clean up expired entries using efficient retain operation
    fn cleanup_expired_entries(&self, now: Instant, window: Duration) {
        let entries_before = self.requests.len();

        self.requests
            .retain(|_, counter| now.duration_since(counter.window_start) < window);

        let entries_after = self.requests.len();
        let cleaned_up = entries_before.saturating_sub(entries_after);

        if cleaned_up > 0 {
            debug!("cleaned up {} expired rate limiter entries", cleaned_up);
        }

        // If still too many entries, remove oldest ones
        if entries_after > MAX_RATE_LIMIT_ENTRIES {
            warn!(
                "rate limiter still has {} entries after cleanup, removing oldest",
                entries_after
            );

            let mut oldest_entries: Vec<_> = self
                .requests
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().window_start))
                .collect();

            oldest_entries.sort_by_key(|(_, window_start)| *window_start);

            let entries_to_remove = entries_after - MAX_RATE_LIMIT_ENTRIES / 2;
            for (client, _) in oldest_entries.into_iter().take(entries_to_remove) {
                self.requests.remove(&client);
            }
        }
    }
}

/// Identify the client a request is counted against
///
/// With proxy trust enabled the last `X-Forwarded-For` hop wins, the one
/// appended by the single trusted proxy; otherwise the peer address recorded by
/// the listener is used.
pub fn client_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy
        && let Some(forwarded_for) = req.headers().get(FORWARDED_FOR_HEADER)
        && let Ok(forwarded_str) = forwarded_for.to_str()
        && let Some(proxy_hop) = forwarded_str
            .rsplit(',')
            .map(str::trim)
            .find(|hop| !hop.is_empty())
    {
        return proxy_hop.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |info| info.0.ip().to_string())
}

/// Rate limiting middleware function
pub async fn rate_limiting_middleware(
    State(rate_limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req, rate_limiter.trusts_proxy());

    let Some(decision) = rate_limiter.check(&client) else {
        return next.run(req).await;
    };

    if decision.is_limited() {
        warn!(
            client = %client,
            count = decision.count,
            limit = decision.limit,
            "rate limit exceeded"
        );
        metrics::record_rate_limited();

        let mut response = ServerError::RateLimited {
            retry_after: decision.reset_after,
        }
        .into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    decision.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use axum::body::Body;

    use super::*;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitingConfig {
            enabled: true,
            max_requests,
            window: Duration::from_secs(900),
            trust_proxy: false,
        })
    }

    #[test]
    fn rate_limiter_creation() {
        let limiter = limiter(10);
        assert!(limiter.is_enabled());
        assert!(!limiter.trusts_proxy());
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn rate_limiter_disabled() {
        let limiter = RateLimiter::new(RateLimitingConfig {
            enabled: false,
            max_requests: 1,
            ..RateLimitingConfig::default()
        });

        // Should never be rate limited when disabled
        for _ in 0..10 {
            assert!(limiter.check("127.0.0.1").is_none());
            assert!(!limiter.is_rate_limited("127.0.0.1"));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn rate_limiter_exceeds_limits() {
        let limiter = limiter(3);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("127.0.0.1").unwrap();
            assert!(!decision.is_limited());
            assert_eq!(decision.remaining(), expected_remaining);
        }

        // 4th request should be rate limited
        let decision = limiter.check("127.0.0.1").unwrap();
        assert!(decision.is_limited());
        assert_eq!(decision.remaining(), 0);

        // Subsequent requests should also be rate limited
        assert!(limiter.is_rate_limited("127.0.0.1"));
    }

    #[test]
    fn rate_limiter_different_clients() {
        let limiter = limiter(2);

        // Each client should have its own limit
        assert!(!limiter.is_rate_limited("127.0.0.1"));
        assert!(!limiter.is_rate_limited("192.168.1.1"));
        assert!(!limiter.is_rate_limited("127.0.0.1"));
        assert!(!limiter.is_rate_limited("192.168.1.1"));

        assert!(limiter.is_rate_limited("127.0.0.1"));
        assert!(limiter.is_rate_limited("192.168.1.1"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn window_expiry_resets_count() {
        let limiter = RateLimiter::new(RateLimitingConfig {
            enabled: true,
            max_requests: 1,
            window: Duration::from_millis(50),
            trust_proxy: false,
        });

        assert!(!limiter.is_rate_limited("10.0.0.1"));
        assert!(limiter.is_rate_limited("10.0.0.1"));

        sleep(Duration::from_millis(80));

        let decision = limiter.check("10.0.0.1").unwrap();
        assert!(!decision.is_limited());
        assert_eq!(decision.count, 1);
    }

    #[test]
    fn decision_headers() {
        let decision = RateLimitDecision {
            limit: 100,
            count: 40,
            window: Duration::from_secs(900),
            reset_after: Duration::from_millis(299_500),
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);

        assert_eq!(headers[RATELIMIT_POLICY], "100;w=900");
        assert_eq!(headers[RATELIMIT_LIMIT], "100");
        assert_eq!(headers[RATELIMIT_REMAINING], "60");
        assert_eq!(headers[RATELIMIT_RESET], "300");
    }

    #[test]
    fn client_key_from_forwarded_for_when_trusted() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "192.168.1.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_key(&request, true), "10.0.0.1");
        assert_eq!(client_key(&request, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn client_key_skips_trailing_empty_hops() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "192.168.1.1, 10.0.0.1, ")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_key(&request, true), "10.0.0.1");
    }

    #[test]
    fn spoofed_first_hop_does_not_change_client_key() {
        let keys: Vec<_> = (0..3)
            .map(|i| {
                let request = axum::http::Request::builder()
                    .header("x-forwarded-for", format!("10.9.9.{i}, 203.0.113.9"))
                    .body(Body::empty())
                    .unwrap();
                client_key(&request, true)
            })
            .collect();

        assert_eq!(keys, vec!["203.0.113.9"; 3]);
    }

    #[test]
    fn client_key_from_peer_address() {
        let mut request = axum::http::Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 7], 52_000))));

        assert_eq!(client_key(&request, false), "203.0.113.7");
        assert_eq!(client_key(&request, true), "203.0.113.7");
    }

    #[test]
    fn concurrent_requests_are_not_undercounted() {
        let limiter = limiter(1_000);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        limiter.check("198.51.100.1");
                    }
                });
            }
        });

        let decision = limiter.check("198.51.100.1").unwrap();
        assert_eq!(decision.count, 801);
    }
}
