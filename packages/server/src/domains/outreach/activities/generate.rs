//! Generation stage: render the company's prompt template against the lead
//! and the research facts, then ask the LLM for a subject/body pair.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::domains::outreach::models::{Company, CompanyFacts, Job, JobSource, PromptTemplate};
use crate::domains::outreach::store::CompanyDirectory;
use crate::kernel::{ProviderFailure, ServerDeps};

pub const DEFAULT_TONE: &str = "professional";
pub const DEFAULT_STYLE: &str = "concise";
pub const DEFAULT_MAX_LENGTH: i32 = 400;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No prompt template found")]
    NoTemplate,
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Provider(ProviderFailure),
    #[error("template lookup failed")]
    Store(String),
}

impl GenerationError {
    /// Full error text for logs.
    pub fn detail(&self) -> String {
        match self {
            GenerationError::Provider(failure) => failure.detail.clone(),
            GenerationError::Store(detail) => format!("template lookup failed: {}", detail),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEmail {
    pub subject: String,
    /// Plain text as returned by the model
    pub body_text: String,
    /// Escaped HTML paragraphs of the same body
    pub body_html: String,
}

#[derive(Deserialize)]
struct EmailJson {
    subject: Option<String>,
    body: Option<String>,
}

/// Demo jobs always use the company default; client jobs use their explicit
/// template id, else the default.
pub async fn select_template(
    job: &Job,
    deps: &ServerDeps,
) -> Result<PromptTemplate, GenerationError> {
    let explicit = match job.source() {
        JobSource::Demo => None,
        JobSource::ClientApi => job.template_id(),
    };

    let found = match explicit {
        Some(id) => deps.store.find_template(id, job.company_id).await,
        None => deps.store.find_default_template(job.company_id).await,
    };

    found
        .map_err(|e| GenerationError::Store(format!("{:#}", e)))?
        .ok_or(GenerationError::NoTemplate)
}

/// Values for every supported `{{placeholder}}`.
pub fn template_variables(
    job: &Job,
    facts: &CompanyFacts,
    company: &Company,
    template: &PromptTemplate,
) -> Vec<(&'static str, String)> {
    let sender_name = company
        .smtp_from_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| company.name.clone());

    vec![
        ("firstName", job.first_name.clone()),
        ("lastName", job.last_name.clone()),
        ("email", job.email.clone()),
        ("companyName", facts.company_name.clone()),
        ("companyDescription", facts.description.clone()),
        ("companyProducts", facts.products.join(", ")),
        ("companyServices", facts.services.join(", ")),
        ("companyValues", facts.values.join(", ")),
        ("industry", facts.industry.clone().unwrap_or_default()),
        ("senderName", sender_name),
        ("senderCompany", company.name.clone()),
        ("tone", tone(template).to_string()),
        ("style", style(template).to_string()),
        ("maxLength", max_length(template).to_string()),
    ]
}

/// Replace every occurrence of each known placeholder; unknown ones stay.
pub fn render_template(template: &str, variables: &[(&str, String)]) -> String {
    variables
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{{{}}}}}", name), value)
        })
}

fn tone(template: &PromptTemplate) -> &str {
    template.tone.as_deref().filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TONE)
}

fn style(template: &PromptTemplate) -> &str {
    template.style.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_STYLE)
}

fn max_length(template: &PromptTemplate) -> i32 {
    template.max_length.filter(|m| *m > 0).unwrap_or(DEFAULT_MAX_LENGTH)
}

pub fn system_prompt(template: &PromptTemplate) -> String {
    format!(
        "You are an expert email copywriter. Your task is to write a personalized email \
         based on the provided information. Use a {} tone and keep the email {}. \
         Maximum length: {} characters. Do not include a greeting line or a signature; \
         both are added separately. Respond with a JSON object with exactly two string \
         fields: \"subject\" and \"body\".",
        tone(template),
        style(template),
        max_length(template)
    )
}

/// Subject/body from the model's reply. Anything that is not the expected
/// JSON shape becomes the body under a generic subject.
pub fn parse_email(raw: &str, company_name: &str) -> (String, String) {
    let fallback_subject = format!("A quick idea for {}", company_name);

    match serde_json::from_str::<EmailJson>(raw.trim()) {
        Ok(EmailJson {
            subject,
            body: Some(body),
        }) if !body.trim().is_empty() => {
            let subject = subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback_subject);
            (subject, body.trim().to_string())
        }
        _ => {
            warn!("Model reply was not a subject/body object; using raw text as body");
            (fallback_subject, raw.trim().to_string())
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Plain text to HTML: blank lines split paragraphs, single newlines become `<br>`.
pub fn text_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn generate_email(
    job: &Job,
    facts: &CompanyFacts,
    company: &Company,
    deps: &ServerDeps,
) -> Result<GeneratedEmail, GenerationError> {
    let template = select_template(job, deps).await?;
    let prompt = render_template(
        &template.template,
        &template_variables(job, facts, company, &template),
    );
    let system = system_prompt(&template);

    info!(job_id = %job.id, template_id = %template.id, "Generating email");

    let deadline = deps.settings.stage_timeout;
    let raw = tokio::time::timeout(deadline, deps.ai.complete_json(&system, &prompt))
        .await
        .map_err(|_| GenerationError::Timeout(deadline))?
        .map_err(|e| GenerationError::Provider(e.into()))?;

    let (subject, body_text) = parse_email(&raw, &facts.company_name);
    let body_html = text_to_html(&body_text);

    Ok(GeneratedEmail {
        subject,
        body_text,
        body_html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CompanyId;

    fn template() -> PromptTemplate {
        PromptTemplate::builder()
            .company_id(CompanyId::new())
            .name("default")
            .template("Write to {{firstName}} at {{companyName}} ({{industry}}). {{firstName}}!")
            .build()
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let vars = vec![
            ("firstName", "Ada".to_string()),
            ("companyName", "Acme".to_string()),
            ("industry", "Tools".to_string()),
        ];
        assert_eq!(
            render_template(&template().template, &vars),
            "Write to Ada at Acme (Tools). Ada!"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = vec![("firstName", "Ada".to_string())];
        assert_eq!(
            render_template("Hi {{firstName}} from {{unknown}}", &vars),
            "Hi Ada from {{unknown}}"
        );
    }

    #[test]
    fn test_system_prompt_uses_defaults() {
        let prompt = system_prompt(&template());
        assert!(prompt.contains("professional tone"));
        assert!(prompt.contains("keep the email concise"));
        assert!(prompt.contains("Maximum length: 400 characters"));
    }

    #[test]
    fn test_system_prompt_honours_template_settings() {
        let mut t = template();
        t.tone = Some("playful".into());
        t.max_length = Some(250);
        let prompt = system_prompt(&t);
        assert!(prompt.contains("playful tone"));
        assert!(prompt.contains("Maximum length: 250"));
    }

    #[test]
    fn test_parse_structured_reply() {
        let (subject, body) = parse_email(r#"{"subject":"Hello","body":"Line one"}"#, "Acme");
        assert_eq!(subject, "Hello");
        assert_eq!(body, "Line one");
    }

    #[test]
    fn test_parse_falls_back_on_free_text() {
        let (subject, body) = parse_email("Just some prose.", "Acme");
        assert_eq!(subject, "A quick idea for Acme");
        assert_eq!(body, "Just some prose.");
    }

    #[test]
    fn test_parse_falls_back_when_body_missing() {
        let (subject, body) = parse_email(r#"{"subject":"Only subject"}"#, "Acme");
        assert_eq!(subject, "A quick idea for Acme");
        assert_eq!(body, r#"{"subject":"Only subject"}"#);
    }

    #[test]
    fn test_text_to_html_escapes_and_splits_paragraphs() {
        assert_eq!(
            text_to_html("First <b>line</b>\nsecond\n\nNext & last"),
            "<p>First &lt;b&gt;line&lt;/b&gt;<br>second</p>\n<p>Next &amp; last</p>"
        );
    }
}
