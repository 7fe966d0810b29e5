//! `amocrm-client` — typed reqwest client for the amoCRM v4 deal API.
//!
//! Implements [`leadsync_core::CrmGateway`]: fetch/create/patch deals and
//! append notes, with bearer-token auth and typed error mapping. Stage
//! display names are not part of the lead payload, so the client keeps a
//! lazily loaded cache of the account's pipeline stages and resolves names
//! through it.

mod wire;

use async_trait::async_trait;
use leadsync_core::config::AmoCrmConfig;
use leadsync_core::{ContactInfo, CrmGateway, Deal, DealPatch, NewDeal, Result, StageRef, SyncError};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use wire::*;

const SERVICE: &str = "amocrm";

pub struct AmoCrmClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    phone_field_id: Option<i64>,
    email_field_id: Option<i64>,
    stages: RwLock<HashMap<i64, String>>,
}

impl AmoCrmClient {
    pub fn new(config: &AmoCrmConfig) -> Result<Self> {
        Self::with_base_url(
            format!("https://{}.amocrm.ru/api/v4", config.subdomain),
            &config.token,
            config.field_ids.phone,
            config.field_ids.email,
        )
    }

    /// Construct against an explicit base URL (tests point this at a mock
    /// server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: &str,
        phone_field_id: Option<i64>,
        email_field_id: Option<i64>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.to_string(),
            phone_field_id,
            email_field_id,
            stages: RwLock::new(HashMap::new()),
        })
    }

    /// Load the account's pipeline stages into the name cache. Returns the
    /// number of stages known afterwards. Also serves as the connectivity
    /// probe for `leadsync check`.
    pub async fn refresh_stages(&self) -> Result<usize> {
        let url = format!("{}/leads/pipelines", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        let resp = check_status(resp, None).await?;
        let parsed: PipelinesResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, format!("invalid pipelines body: {e}")))?;

        let mut stages = self.stages.write().await;
        for pipeline in parsed.embedded.pipelines {
            for stage in pipeline.embedded.statuses {
                stages.insert(stage.id, stage.name);
            }
        }
        Ok(stages.len())
    }

    /// Best-effort stage name lookup: one refresh attempt on a cache miss,
    /// `None` if the stage is still unknown. An unresolved name downgrades
    /// the status column to a per-field skip downstream, it never fails the
    /// deal fetch itself.
    async fn stage_name(&self, status_id: i64) -> Option<String> {
        if let Some(name) = self.stages.read().await.get(&status_id) {
            return Some(name.clone());
        }
        if let Err(e) = self.refresh_stages().await {
            tracing::warn!(status_id, error = %e, "stage cache refresh failed");
            return None;
        }
        self.stages.read().await.get(&status_id).cloned()
    }

    async fn lead_to_deal(&self, lead: RawLead) -> Deal {
        let status_id = lead.status_id.unwrap_or(0);
        let status_name = if status_id > 0 {
            self.stage_name(status_id).await.unwrap_or_default()
        } else {
            String::new()
        };
        Deal {
            id: lead.id,
            name: lead.name.unwrap_or_default(),
            price: lead.price.unwrap_or(0),
            status: StageRef {
                id: status_id,
                name: status_name,
            },
            contact: self.extract_contact(lead.custom_fields_values.as_deref()),
        }
    }

    /// Pull phone/email out of the lead's custom fields, matched against the
    /// account-specific field ids from configuration.
    fn extract_contact(&self, fields: Option<&[RawCustomField]>) -> ContactInfo {
        let mut contact = ContactInfo::default();
        let Some(fields) = fields else {
            return contact;
        };
        for field in fields {
            let value = field
                .values
                .first()
                .and_then(|v| v.value.as_str())
                .map(str::to_string);
            if Some(field.field_id) == self.phone_field_id {
                contact.phone = value;
            } else if Some(field.field_id) == self.email_field_id {
                contact.email = value;
            }
        }
        contact
    }
}

/// Map a non-success response to the error taxonomy. `not_found` carries the
/// deal id to report when the vendor answers 404.
async fn check_status(resp: reqwest::Response, not_found: Option<i64>) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::auth(SERVICE, format!("{status}")));
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = not_found {
            return Err(SyncError::DealNotFound(id));
        }
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::transport(
        SERVICE,
        format!("{status}: {}", body.chars().take(200).collect::<String>()),
    ))
}

#[async_trait]
impl CrmGateway for AmoCrmClient {
    async fn get_deal(&self, id: i64) -> Result<Deal> {
        let url = format!("{}/leads/{id}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        // amoCRM answers an empty 204 for an unknown lead id.
        if resp.status() == StatusCode::NO_CONTENT {
            return Err(SyncError::DealNotFound(id));
        }
        let resp = check_status(resp, Some(id)).await?;
        let lead: RawLead = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, format!("invalid lead body: {e}")))?;
        Ok(self.lead_to_deal(lead).await)
    }

    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal> {
        let url = format!("{}/leads", self.base_url);
        let body = [CreateLead {
            name: &deal.name,
            price: deal.price,
            pipeline_id: deal.pipeline_id,
            status_id: deal.status_id,
        }];
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        let resp = check_status(resp, None).await?;
        let created: CreateResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, format!("invalid create body: {e}")))?;
        let id = created
            .embedded
            .leads
            .first()
            .map(|l| l.id)
            .ok_or_else(|| SyncError::transport(SERVICE, "create response carried no lead"))?;
        Ok(Deal {
            id,
            name: deal.name.clone(),
            price: deal.price,
            status: StageRef {
                id: deal.status_id,
                name: self.stage_name(deal.status_id).await.unwrap_or_default(),
            },
            contact: ContactInfo::default(),
        })
    }

    async fn update_deal(&self, id: i64, patch: &DealPatch) -> Result<Deal> {
        let url = format!("{}/leads/{id}", self.base_url);
        let body = PatchLead {
            name: patch.name.as_deref(),
            price: patch.price,
        };
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        let resp = check_status(resp, Some(id)).await?;
        let lead: RawLead = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, format!("invalid patch body: {e}")))?;
        Ok(self.lead_to_deal(lead).await)
    }

    async fn add_note(&self, id: i64, text: &str) -> Result<()> {
        let url = format!("{}/leads/{id}/notes", self.base_url);
        let body = [NotePayload {
            note_type: "common",
            params: NoteParams { text },
        }];
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        check_status(resp, Some(id)).await?;
        Ok(())
    }
}
