//! Row-to-entity conversions for the `SQLite` repositories.

use binlift_domain::entities::{
    ApiKey, BinaryArtifact, BinaryFormat, Job, JobError, JobStatus, OperationType, PromptMetrics,
    UploadSession, UsageRecord,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::SqlRow;
use binlift_domain::value_objects::{JobId, UploadSessionId, WorkerId};

use super::query_helpers::{required_f64, required_i64, required_string};

pub fn row_to_job(row: &dyn SqlRow) -> Result<Job> {
    let translation = row
        .try_get_string("translation_json")?
        .map(|s| serde_json::from_str(&s))
        .transpose()?;
    let error: Option<JobError> = row
        .try_get_string("error_json")?
        .map(|s| serde_json::from_str(&s))
        .transpose()?;
    let metadata = row
        .try_get_string("metadata_json")?
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    Ok(Job {
        id: JobId::parse(&required_string(row, "id")?)?,
        owner: required_string(row, "owner")?,
        file_sha256: required_string(row, "file_sha256")?,
        status: JobStatus::parse(&required_string(row, "status")?)?,
        progress: required_f64(row, "progress")?,
        priority: required_i64(row, "priority")?,
        translation,
        worker_id: row
            .try_get_string("worker_id")?
            .map(|s| WorkerId::parse(&s))
            .transpose()?,
        claim_expires_at: row.try_get_i64("claim_expires_at")?,
        visible_at: required_i64(row, "visible_at")?,
        attempts: required_i64(row, "attempts")? as u32,
        max_attempts: required_i64(row, "max_attempts")? as u32,
        error,
        idempotency_key: row.try_get_string("idempotency_key")?,
        result_present: required_i64(row, "result_present")? != 0,
        metadata,
        created_at: required_i64(row, "created_at")?,
        started_at: row.try_get_i64("started_at")?,
        completed_at: row.try_get_i64("completed_at")?,
    })
}

pub fn row_to_artifact(row: &dyn SqlRow) -> Result<BinaryArtifact> {
    let format = match required_string(row, "format")?.as_str() {
        "pe" => BinaryFormat::Pe,
        "elf" => BinaryFormat::Elf,
        "mach-o" => BinaryFormat::MachO,
        _ => BinaryFormat::Unknown,
    };
    Ok(BinaryArtifact {
        sha256: required_string(row, "sha256")?,
        size: required_i64(row, "size")? as u64,
        format,
        architecture: required_string(row, "architecture")?,
        platform: required_string(row, "platform")?,
        path_in_store: required_string(row, "path_in_store")?,
        ref_count: required_i64(row, "ref_count")?,
        created_at: required_i64(row, "created_at")?,
        last_unreferenced_at: row.try_get_i64("last_unreferenced_at")?,
    })
}

pub fn row_to_usage(row: &dyn SqlRow) -> Result<UsageRecord> {
    Ok(UsageRecord {
        owner: required_string(row, "owner")?,
        provider_id: required_string(row, "provider_id")?,
        day: required_string(row, "day")?,
        operation_type: parse_operation(&required_string(row, "operation_type")?)?,
        tokens_used: required_i64(row, "tokens_used")? as u64,
        requests: required_i64(row, "requests")? as u64,
        cost: required_f64(row, "cost")?,
    })
}

pub fn row_to_upload_session(row: &dyn SqlRow) -> Result<UploadSession> {
    let accepted: Vec<String> = row
        .try_get_string("accepted_refs_json")?
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    Ok(UploadSession {
        id: UploadSessionId::parse(&required_string(row, "id")?)?,
        owner: required_string(row, "owner")?,
        created_at: required_i64(row, "created_at")?,
        expires_at: required_i64(row, "expires_at")?,
        accepted_file_refs: accepted,
    })
}

pub fn row_to_api_key(row: &dyn SqlRow) -> Result<ApiKey> {
    Ok(ApiKey {
        id: required_string(row, "id")?,
        owner: required_string(row, "owner")?,
        tier: required_string(row, "tier")?,
        key_hash: required_string(row, "key_hash")?,
        active: required_i64(row, "active")? != 0,
        created_at: required_i64(row, "created_at")?,
    })
}

pub fn row_to_prompt_metrics(row: &dyn SqlRow) -> Result<PromptMetrics> {
    let total_uses = required_i64(row, "total_uses")? as u64;
    let quality_sum = required_f64(row, "quality_sum")?;
    let quality_count = required_i64(row, "quality_count")?;
    let latency_sum_ms = required_i64(row, "latency_sum_ms")?;
    Ok(PromptMetrics {
        template_id: required_string(row, "template_id")?,
        provider_id: required_string(row, "provider_id")?,
        total_uses,
        successes: required_i64(row, "successes")? as u64,
        mean_quality: if quality_count > 0 {
            quality_sum / quality_count as f64
        } else {
            0.0
        },
        mean_latency_ms: if total_uses > 0 {
            latency_sum_ms as f64 / total_uses as f64
        } else {
            0.0
        },
    })
}

fn parse_operation(s: &str) -> Result<OperationType> {
    match s {
        "function_translation" => Ok(OperationType::FunctionTranslation),
        "import_explanation" => Ok(OperationType::ImportExplanation),
        "overall_summary" => Ok(OperationType::OverallSummary),
        other => Err(Error::storage_tx(format!("unknown operation type '{other}'"))),
    }
}
