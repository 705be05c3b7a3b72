//! 回调接口的错误请求限流
//!
//! 按客户端地址统计窗口内的错误请求数，超过上限后拒绝该客户端的后续回调。

use axum::http::HeaderMap;
use moka::future::Cache;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Clone)]
pub struct BadRequestLimiter {
    counts: Cache<String, u64>,
    limit: u64,
}

impl BadRequestLimiter {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            counts: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
            limit,
        }
    }

    pub async fn is_blocked(&self, client: &str) -> bool {
        self.counts
            .get(client)
            .await
            .is_some_and(|count| count >= self.limit)
    }

    /// 记录一次错误请求，返回窗口内累计次数
    pub async fn record(&self, client: &str) -> u64 {
        let entry = self
            .counts
            .entry_by_ref(client)
            .and_upsert_with(|current| async move {
                current.map(|entry| entry.into_value() + 1).unwrap_or(1)
            })
            .await;
        let count = entry.into_value();
        if count == self.limit {
            tracing::warn!(client = %client, count, "callback bad-request limit reached");
        }
        count
    }
}

/// 识别客户端：按连接的对端地址计数
///
/// 只有对端是受信任的代理时才读取转发头，否则转发头由调用方任意填写。
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer.ip()) {
        return peer.ip().to_string();
    }
    forwarded_client(headers).unwrap_or_else(|| peer.ip().to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').next().unwrap_or_default().trim().to_string())
            .filter(|value| !value.is_empty())
    };
    header("x-forwarded-for").or_else(|| header("x-real-ip"))
}
