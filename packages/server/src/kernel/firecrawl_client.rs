//! Firecrawl implementation of `BaseCompanyResearcher`.
//!
//! Scrapes the lead's homepage with Firecrawl's structured JSON extraction
//! and maps the result onto `CompanyFacts`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{BaseCompanyResearcher, ProviderError};
use crate::domains::outreach::activities::research::company_name_from_domain;
use crate::domains::outreach::models::CompanyFacts;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

const EXTRACTION_PROMPT: &str = "Extract the company's name, a one-paragraph description, \
its main products, its services, its stated values and its industry.";

pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<&'static str>,
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
    #[serde(rename = "jsonOptions")]
    json_options: JsonOptions,
}

#[derive(Serialize)]
struct JsonOptions {
    prompt: &'static str,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    json: Option<ExtractedCompany>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedCompany {
    company_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    products: Vec<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    values: Vec<String>,
    industry: Option<String>,
}

fn company_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "companyName": { "type": "string" },
            "description": { "type": "string" },
            "products": { "type": "array", "items": { "type": "string" } },
            "services": { "type": "array", "items": { "type": "string" } },
            "values": { "type": "array", "items": { "type": "string" } },
            "industry": { "type": "string" }
        },
        "required": ["companyName"]
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create Firecrawl HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Point the client at a different API root (tests, self-hosted Firecrawl).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl BaseCompanyResearcher for FirecrawlClient {
    async fn research(&self, domain: &str) -> Result<CompanyFacts> {
        let request = ScrapeRequest {
            url: format!("https://{}", domain),
            formats: vec!["json"],
            only_main_content: true,
            json_options: JsonOptions {
                prompt: EXTRACTION_PROMPT,
                schema: company_schema(),
            },
        };

        debug!(domain = %domain, "Requesting Firecrawl scrape");

        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Firecrawl request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::status("Firecrawl", status, text).into());
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .context("Failed to parse Firecrawl response")?;

        if !body.success {
            return Err(ProviderError::Rejected {
                provider: "Firecrawl",
                reason: body.error.unwrap_or_default(),
            }
            .into());
        }

        let data = body.data.context("No data returned from Firecrawl")?;
        let extracted = data
            .json
            .context("Firecrawl returned no structured data")?;

        Ok(CompanyFacts {
            company_name: non_blank(extracted.company_name)
                .unwrap_or_else(|| company_name_from_domain(domain)),
            description: non_blank(extracted.description).unwrap_or_default(),
            products: extracted.products,
            services: extracted.services,
            values: extracted.values,
            industry: non_blank(extracted.industry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_maps_extracted_json_to_facts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrape"))
            .and(bearer_token("fc-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "json": {
                        "companyName": "Acme",
                        "description": "Anvils for everyone",
                        "products": ["Anvil"],
                        "industry": "Manufacturing"
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = FirecrawlClient::new("fc-test").unwrap().with_base_url(server.uri());
        let facts = client.research("acme.com").await.unwrap();

        assert_eq!(facts.company_name, "Acme");
        assert_eq!(facts.products, vec!["Anvil".to_string()]);
        assert_eq!(facts.industry.as_deref(), Some("Manufacturing"));
        assert!(facts.services.is_empty());
    }

    #[tokio::test]
    async fn test_missing_company_name_is_derived_from_domain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "json": { "companyName": " " } }
            })))
            .mount(&server)
            .await;

        let client = FirecrawlClient::new("fc-test").unwrap().with_base_url(server.uri());
        let facts = client.research("acme-tools.com").await.unwrap();

        assert_eq!(facts.company_name, "Acme Tools");
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrape"))
            .respond_with(ResponseTemplate::new(402).set_body_string("Payment required"))
            .mount(&server)
            .await;

        let client = FirecrawlClient::new("fc-test").unwrap().with_base_url(server.uri());
        let err = client.research("acme.com").await.unwrap_err();

        assert!(err.to_string().contains("402"));
    }
}
