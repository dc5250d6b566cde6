//! Leads module: search by field criteria and partial update by id

use crate::client::ZohoClient;
use crate::error::{Result, ZohoError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The subset of a Zoho lead the sync needs to pick a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRef {
    pub id: String,
    #[serde(rename = "Mobile", default)]
    pub mobile: Option<String>,
    #[serde(rename = "Lead_Source", default)]
    pub lead_source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<LeadRef>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    data: Vec<UpdateResult>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Escapes the characters Zoho treats as criteria syntax
pub fn escape_criteria_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '(' | ')' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builds `((Mobile:equals:<mobile>)and(Lead_Source:equals:<source>))`
pub fn lead_search_criteria(mobile: &str, lead_source: &str) -> String {
    format!(
        "((Mobile:equals:{})and(Lead_Source:equals:{}))",
        escape_criteria_value(mobile),
        escape_criteria_value(lead_source)
    )
}

impl ZohoClient {
    /// Searches leads by (Mobile, Lead_Source)
    ///
    /// Zoho answers `204 No Content` when nothing matches; that maps to an
    /// empty list, not an error.
    pub async fn search_leads(&self, token: &str, mobile: &str, lead_source: &str) -> Result<Vec<LeadRef>> {
        if mobile.trim().is_empty() {
            return Err(ZohoError::ValidationError("mobile must not be empty".to_string()));
        }

        let criteria = lead_search_criteria(mobile, lead_source);
        let response = self
            .get(
                token,
                "/crm/v2/Leads/search",
                &[("criteria", criteria.as_str()), ("fields", "id,Mobile,Lead_Source")],
            )
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            tracing::debug!("No leads for criteria {}", criteria);
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        // Search can also match on a prefix; drop leads whose source differs
        let leads = parsed
            .data
            .into_iter()
            .filter(|lead| {
                lead.lead_source
                    .as_deref()
                    .map_or(true, |source| source.eq_ignore_ascii_case(lead_source))
            })
            .collect();

        Ok(leads)
    }

    /// Updates only the given fields of one lead
    pub async fn update_lead(&self, token: &str, lead_id: &str, fields: &Map<String, Value>) -> Result<()> {
        if lead_id.trim().is_empty() {
            return Err(ZohoError::ValidationError("lead id must not be empty".to_string()));
        }
        if fields.is_empty() {
            return Err(ZohoError::ValidationError("update payload must not be empty".to_string()));
        }

        let endpoint = format!("/crm/v2/Leads/{}", urlencoding::encode(lead_id));
        let body = json!({ "data": [Value::Object(fields.clone())] });

        let response = self.put(token, &endpoint, &body).await?;
        let status = response.status().as_u16();
        let parsed: UpdateResponse = response.json().await?;

        match parsed.data.first() {
            Some(result) if result.status.eq_ignore_ascii_case("success") => {
                tracing::info!("Zoho lead {} updated ({})", lead_id, result.message);
                Ok(())
            }
            Some(result) => Err(ZohoError::ApiError {
                status,
                code: result.code.clone(),
                message: result.message.clone(),
            }),
            None => Err(ZohoError::ApiError {
                status,
                code: "EMPTY_RESPONSE".to_string(),
                message: "update returned no result rows".to_string(),
            }),
        }
    }
}
