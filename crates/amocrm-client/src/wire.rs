//! Wire-format structs for the amoCRM v4 REST API.
//!
//! Create and note endpoints take an array-wrapped single object; patch takes
//! a bare object. Responses nest collections under `_embedded`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RawLead {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub custom_fields_values: Option<Vec<RawCustomField>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCustomField {
    pub field_id: i64,
    #[serde(default)]
    pub values: Vec<RawFieldValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFieldValue {
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateLead<'a> {
    pub name: &'a str,
    pub price: i64,
    pub pipeline_id: i64,
    pub status_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchLead<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    #[serde(rename = "_embedded")]
    pub embedded: CreatedLeads,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedLeads {
    pub leads: Vec<CreatedLead>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedLead {
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct NotePayload<'a> {
    pub note_type: &'static str,
    pub params: NoteParams<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NoteParams<'a> {
    pub text: &'a str,
}

// ---------------------------------------------------------------------------
// Pipelines (stage display names)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct PipelinesResponse {
    #[serde(rename = "_embedded")]
    pub embedded: PipelinesEmbedded,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PipelinesEmbedded {
    #[serde(default)]
    pub pipelines: Vec<RawPipeline>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPipeline {
    #[serde(rename = "_embedded")]
    pub embedded: PipelineStages,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PipelineStages {
    #[serde(default)]
    pub statuses: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStage {
    pub id: i64,
    pub name: String,
}
