use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use crate::common::{CompanyId, TemplateId};

/// A company-owned prompt with `{{placeholder}}` variables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, TypedBuilder)]
pub struct PromptTemplate {
    #[builder(default = TemplateId::new())]
    pub id: TemplateId,
    pub company_id: CompanyId,
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub template: String,
    #[builder(default, setter(strip_option, into))]
    pub tone: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub style: Option<String>,
    #[builder(default, setter(strip_option))]
    pub max_length: Option<i32>,
    #[builder(default)]
    pub is_default: bool,
    #[builder(default = true)]
    pub active: bool,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl PromptTemplate {
    /// A specific active template, scoped to its owning company.
    pub async fn find_for_company(
        id: TemplateId,
        company_id: CompanyId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let template = sqlx::query_as::<_, PromptTemplate>(
            r#"
            SELECT id, company_id, name, template, tone, style, max_length, is_default, active
            FROM prompt_templates
            WHERE id = $1 AND company_id = $2 AND active = true
            "#,
        )
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
        Ok(template)
    }

    pub async fn find_default(company_id: CompanyId, pool: &PgPool) -> Result<Option<Self>> {
        let template = sqlx::query_as::<_, PromptTemplate>(
            r#"
            SELECT id, company_id, name, template, tone, style, max_length, is_default, active
            FROM prompt_templates
            WHERE company_id = $1 AND is_default = true AND active = true
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
        Ok(template)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prompt_templates
                (id, company_id, name, template, tone, style, max_length, is_default, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(self.id)
        .bind(self.company_id)
        .bind(&self.name)
        .bind(&self.template)
        .bind(&self.tone)
        .bind(&self.style)
        .bind(self.max_length)
        .bind(self.is_default)
        .bind(self.active)
        .execute(pool)
        .await?;
        Ok(())
    }
}
