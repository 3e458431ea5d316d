use std::net::IpAddr;
use std::time::Duration;

use doech_core::error::AppError;
use doech_core::models::RecordType;
use doech_core::svcb::{self, SvcbHttpsRecord};
use doech_core::traits::Resolver;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use url::Url;

/// Cloudflare's public DoH endpoint, which serves the JSON API.
pub const CLOUDFLARE_DOH_URL: &str = "https://cloudflare-dns.com/dns-query";

const DNS_JSON: &str = "application/dns-json";

/// JSON envelope returned by a DoH resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DohResponse {
    /// DNS RCODE.
    #[serde(rename = "Status")]
    pub status: u16,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohAnswer>,
}

/// One entry of the `Answer` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DohAnswer {
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    pub data: String,
}

/// DNS-over-HTTPS client for the JSON API.
///
/// Each lookup is exactly one GET request bounded by the client timeout.
/// Nothing is retried or cached.
#[derive(Clone)]
pub struct DohClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl DohClient {
    /// Client for [`CLOUDFLARE_DOH_URL`] with a 5 s timeout.
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("doech/0.1 (SVCB measurement)")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        let endpoint = Url::parse(CLOUDFLARE_DOH_URL)
            .map_err(|e| AppError::ConfigError(format!("Invalid DoH endpoint: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Points the client at another resolver speaking the same JSON API.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, AppError> {
        let url = Url::parse(endpoint)
            .map_err(|e| AppError::ConfigError(format!("Invalid DoH endpoint {endpoint}: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "DoH endpoint scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }
        self.endpoint = url;
        Ok(self)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Answers of type `rr_type` for `domain`.
    ///
    /// NOERROR and NXDOMAIN both yield the (possibly empty) answer list.
    /// Answers of other types, such as CNAME links, are dropped.
    pub async fn query(&self, domain: &str, rr_type: RecordType) -> Result<Vec<DohAnswer>, AppError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("name", domain)
            .append_pair("type", rr_type.as_str());

        let response = self
            .client
            .get(url)
            .header(ACCEPT, DNS_JSON)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::TransportError(format!(
                "HTTP {} from {} for {domain} {rr_type}",
                status.as_u16(),
                self.endpoint
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        let parsed: DohResponse = serde_json::from_slice(&body).map_err(|e| {
            AppError::MalformedResponse(format!("Invalid DoH JSON for {domain} {rr_type}: {e}"))
        })?;

        match parsed.status {
            0 | 3 => {}
            rcode => {
                return Err(AppError::TransportError(format!(
                    "DNS {} ({rcode}) for {domain} {rr_type}",
                    rcode_name(rcode)
                )));
            }
        }

        Ok(parsed
            .answer
            .into_iter()
            .filter(|answer| answer.rr_type == rr_type.code())
            .collect())
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else if e.is_connect() {
            AppError::TransportError(format!("Connection failed: {e}"))
        } else {
            AppError::TransportError(e.to_string())
        }
    }
}

impl Resolver for DohClient {
    async fn lookup_addresses(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> Result<Vec<IpAddr>, AppError> {
        if !matches!(rr_type, RecordType::A | RecordType::Aaaa) {
            return Err(AppError::ConfigError(format!(
                "{rr_type} is not an address record type"
            )));
        }

        self.query(domain, rr_type)
            .await?
            .iter()
            .map(|answer| {
                answer.data.trim().parse::<IpAddr>().map_err(|_| {
                    AppError::MalformedResponse(format!(
                        "{rr_type} answer for {domain} is not an IP address: {}",
                        answer.data
                    ))
                })
            })
            .collect()
    }

    async fn lookup_svcb(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> Result<Vec<SvcbHttpsRecord>, AppError> {
        let answers = self.query(domain, rr_type).await?;

        let mut records = Vec::with_capacity(answers.len());
        for answer in &answers {
            let Some(rdata) = parse_unknown_rdata(&answer.data) else {
                tracing::debug!(%domain, %rr_type, data = %answer.data, "Skipping non-RFC 3597 answer");
                continue;
            };
            records.push(svcb::decode(&answer.name, rr_type, &rdata)?);
        }
        Ok(records)
    }
}

/// Extracts the RDATA bytes from the RFC 3597 form `\# <len> <hex>`.
///
/// The hex may be split by whitespace. Returns `None` when the text is not
/// in this form or the declared length disagrees with the byte count.
pub fn parse_unknown_rdata(presentation: &str) -> Option<Vec<u8>> {
    let rest = presentation.trim().strip_prefix("\\#")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    let declared: usize = tokens.next()?.parse().ok()?;
    let hex_digits: String = tokens.collect();
    let bytes = hex::decode(hex_digits).ok()?;

    (bytes.len() == declared).then_some(bytes)
}

fn rcode_name(rcode: u16) -> &'static str {
    match rcode {
        1 => "FORMERR",
        2 => "SERVFAIL",
        4 => "NOTIMP",
        5 => "REFUSED",
        _ => "RCODE",
    }
}
