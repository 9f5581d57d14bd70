//! DNS-over-HTTPS upstream using the JSON API (`application/dns-json`).

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::debug;

use super::{Upstream, http_client, with_timeout};
use crate::error::ResolveError;
use crate::record::Record;

const DNS_JSON_CONTENT_TYPE: &str = "application/dns-json";
const TYPE_A: u16 = 1;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    rtype: u16,
    #[serde(rename = "TTL")]
    ttl: i64,
    data: String,
}

/// Resolves through a DoH JSON endpoint such as Cloudflare's.
pub struct DohJsonUpstream {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DohJsonUpstream {
    pub const DEFAULT_URL: &'static str = "https://1.1.1.1/dns-query";

    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
            timeout,
        })
    }

    async fn fetch(&self, domain: &str) -> Result<DohResponse, ResolveError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("name", domain), ("type", "A")])
            .header(ACCEPT, DNS_JSON_CONTENT_TYPE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ResolveError::Malformed(e.to_string()))
    }
}

/// Turn a decoded payload into a record. Only `A` answers count; the TTL is
/// the smallest among them.
fn into_record(domain: &str, response: DohResponse) -> Record {
    if response.status != 0 {
        return Record::failed(domain, ResolveError::DnsStatus(response.status));
    }

    let mut ttl = i64::MAX;
    let mut records = Vec::new();
    for answer in response.answer.iter().filter(|a| a.rtype == TYPE_A) {
        if let Ok(addr) = answer.data.parse::<Ipv4Addr>() {
            ttl = ttl.min(answer.ttl);
            records.push(IpAddr::V4(addr));
        }
    }

    Record::resolved(domain, records, ttl)
}

#[async_trait]
impl Upstream for DohJsonUpstream {
    async fn query(&self, domain: &str) -> Record {
        match with_timeout(self.timeout, self.fetch(domain)).await {
            Ok(response) => into_record(domain, response),
            Err(e) => {
                debug!(domain, url = %self.url, error = %e, "DoH query failed");
                Record::failed(domain, e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "doh"
    }
}
