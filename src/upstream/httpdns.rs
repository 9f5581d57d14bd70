//! Plaintext HTTP DNS upstream (`GET /d?dn=<domain>&ttl=1`).
//!
//! The service answers with a single line: `ip1;ip2;...,ttl`.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::debug;

use super::{Upstream, http_client, with_timeout};
use crate::error::ResolveError;
use crate::record::Record;

/// Upper bound on addresses kept from one answer.
const MAX_RECORDS: usize = 20;

pub struct HttpDnsUpstream {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpDnsUpstream {
    pub const DEFAULT_URL: &'static str = "http://119.29.29.29/d";

    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
            timeout,
        })
    }

    async fn fetch(&self, domain: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("dn", domain), ("ttl", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

fn parse_body(domain: &str, body: &str) -> Record {
    let body = body.trim();
    if body.is_empty() {
        return Record::failed(domain, ResolveError::Empty);
    }

    let Some((addrs, ttl)) = body.split_once(',') else {
        return Record::failed(domain, ResolveError::Malformed(format!("no ttl in {body:?}")));
    };
    let ttl = match ttl.trim().parse::<i64>() {
        Ok(ttl) => ttl,
        Err(e) => return Record::failed(domain, ResolveError::Malformed(e.to_string())),
    };

    let records = addrs
        .split(';')
        .filter_map(|a| a.trim().parse::<Ipv4Addr>().ok())
        .map(IpAddr::V4)
        .take(MAX_RECORDS)
        .collect();

    Record::resolved(domain, records, ttl)
}

#[async_trait]
impl Upstream for HttpDnsUpstream {
    async fn query(&self, domain: &str) -> Record {
        match with_timeout(self.timeout, self.fetch(domain)).await {
            Ok(body) => parse_body(domain, &body),
            Err(e) => {
                debug!(domain, url = %self.url, error = %e, "HTTP DNS query failed");
                Record::failed(domain, e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "httpdns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn parse_body_reads_addresses_and_ttl() {
        let record = parse_body("a.com", "1.2.3.4;5.6.7.8,120\n");

        assert!(record.failure.is_none());
        assert_eq!(
            record.records,
            vec![
                IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
                IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)),
            ]
        );
        assert_eq!(record.ttl_secs, 120);
    }

    #[tokio::test]
    async fn parse_body_clamps_ttl() {
        assert_eq!(parse_body("a.com", "1.2.3.4,0").ttl_secs, 3);
        assert_eq!(parse_body("a.com", "1.2.3.4,99999").ttl_secs, 3600);
    }

    #[tokio::test]
    async fn parse_body_truncates_long_answers() {
        let addrs: Vec<String> = (1..=30).map(|i| format!("10.0.0.{i}")).collect();
        let body = format!("{},60", addrs.join(";"));

        assert_eq!(parse_body("a.com", &body).records.len(), MAX_RECORDS);
    }

    #[tokio::test]
    async fn parse_body_failures() {
        assert!(matches!(
            parse_body("a.com", "").failure,
            Some(ResolveError::Empty)
        ));
        assert!(matches!(
            parse_body("a.com", "1.2.3.4").failure,
            Some(ResolveError::Malformed(_))
        ));
        assert!(matches!(
            parse_body("a.com", "1.2.3.4,soon").failure,
            Some(ResolveError::Malformed(_))
        ));
        assert!(matches!(
            parse_body("a.com", "not-an-ip,60").failure,
            Some(ResolveError::Empty)
        ));
    }

    #[tokio::test]
    async fn query_hits_service_with_domain() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/d")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("dn".into(), "example.com".into()),
                Matcher::UrlEncoded("ttl".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body("93.184.216.34,300")
            .create_async()
            .await;
        let upstream =
            HttpDnsUpstream::new(format!("{}/d", server.url()), Duration::from_secs(3)).expect("client");

        let record = upstream.query("example.com").await;

        mock.assert_async().await;
        assert_eq!(record.records, vec![IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))]);
        assert_eq!(record.ttl_secs, 300);
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_failure() {
        let upstream =
            HttpDnsUpstream::new("http://127.0.0.1:1/d", Duration::from_secs(3)).expect("client");

        let record = upstream.query("example.com").await;

        assert!(matches!(record.failure, Some(ResolveError::Transport(_))));
    }
}
