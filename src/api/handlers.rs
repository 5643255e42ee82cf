//! Document-store request handlers

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::catalog::Category;
use crate::persistence::{LocalStore, StorageBackend, UserPreferences};
use crate::records::ClipRecord;

use super::models::{BulkOperation, BulkRequest, ClipIdentityRequest, ClipQuery};

/// Handle health check requests
pub async fn health_check() -> Result<Value> {
    Ok(json!({
        "status": "healthy",
        "service": "clipfeed-store",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Handle preference reads; a missing record is created with defaults.
pub async fn get_preferences(store: &Arc<LocalStore>, user_id: &str) -> Result<Value> {
    let prefs = store.load_preferences(user_id).await?;
    // GET creates the default record if absent
    store.save_preferences(&prefs).await?;
    Ok(serde_json::to_value(prefs)?)
}

/// Handle full preference replacement; the path user id wins over the body.
pub async fn put_preferences(
    store: &Arc<LocalStore>,
    user_id: &str,
    payload: Value,
) -> Result<Value> {
    let mut prefs: UserPreferences = serde_json::from_value(payload)
        .map_err(|e| anyhow!("invalid preference document: {}", e))?;
    prefs.user_id = user_id.to_string();
    store.save_preferences(&prefs).await?;
    Ok(serde_json::to_value(prefs)?)
}

/// Handle partial preference merges: object fields in the payload overwrite
/// the stored document, and the merged result must still validate.
pub async fn patch_preferences(
    store: &Arc<LocalStore>,
    user_id: &str,
    payload: Value,
) -> Result<Value> {
    let patch = payload
        .as_object()
        .ok_or_else(|| anyhow!("patch body must be an object"))?
        .clone();

    let current = store.load_preferences(user_id).await?;
    let mut merged = serde_json::to_value(current)?;
    if let Some(target) = merged.as_object_mut() {
        for (field, value) in patch {
            target.insert(field, value);
        }
    }

    let mut prefs: UserPreferences = serde_json::from_value(merged)
        .map_err(|e| anyhow!("patched document does not validate: {}", e))?;
    prefs.user_id = user_id.to_string();
    store.save_preferences(&prefs).await?;
    Ok(serde_json::to_value(prefs)?)
}

/// Handle preference deletion
pub async fn delete_preferences(store: &Arc<LocalStore>, user_id: &str) -> Result<Value> {
    store.delete_preferences(user_id).await?;
    Ok(json!({ "deleted": user_id }))
}

/// Handle preference reset: recreate the default record
pub async fn reset_preferences(store: &Arc<LocalStore>, user_id: &str) -> Result<Value> {
    let prefs = UserPreferences::default_for(user_id);
    store.save_preferences(&prefs).await?;
    Ok(serde_json::to_value(prefs)?)
}

/// Handle filtered, paginated clip listing, newest-first.
pub async fn list_clips(store: &Arc<LocalStore>, query: &ClipQuery) -> Result<Value> {
    let mut clips = store.load_clips().await?;

    if let Some(watched) = query.watched {
        clips.retain(|c| c.watched == watched);
    }
    if let Some(memorized) = query.memorized {
        clips.retain(|c| c.memorized == memorized);
    }
    if let Some(directory_type) = &query.directory_type {
        let category = Category::parse(directory_type)
            .ok_or_else(|| anyhow!("unknown directoryType '{}'", directory_type))?;
        clips.retain(|c| c.category == category);
    }

    clips.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let skip = query.skip.unwrap_or(0);
    let page: Vec<&ClipRecord> = match query.limit {
        Some(limit) => clips.iter().skip(skip).take(limit).collect(),
        None => clips.iter().skip(skip).collect(),
    };

    Ok(serde_json::to_value(page)?)
}

/// Handle single clip reads
pub async fn get_clip(store: &Arc<LocalStore>, id: &str) -> Result<Value> {
    let clips = store.load_clips().await?;
    let clip = clips
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| anyhow!("clip not found: {}", id))?;
    Ok(serde_json::to_value(clip)?)
}

/// Handle clip creation
pub async fn create_clip(store: &Arc<LocalStore>, payload: Value) -> Result<Value> {
    let record: ClipRecord = serde_json::from_value(payload)
        .map_err(|e| anyhow!("invalid clip document: {}", e))?;
    store.save_clip(&record).await?;
    Ok(serde_json::to_value(record)?)
}

/// Handle clip replacement by id; the path id wins over the body.
pub async fn update_clip(store: &Arc<LocalStore>, id: &str, payload: Value) -> Result<Value> {
    let mut record: ClipRecord = serde_json::from_value(payload)
        .map_err(|e| anyhow!("invalid clip document: {}", e))?;
    record.id = id.to_string();
    store.save_clip(&record).await?;
    Ok(serde_json::to_value(record)?)
}

/// Handle upsert by identity key `{videoPath, startTime, endTime}`: the
/// incoming document replaces any record with the same key (last write wins)
/// or is inserted fresh.
pub async fn find_and_update_clip(store: &Arc<LocalStore>, payload: Value) -> Result<Value> {
    let identity: ClipIdentityRequest = serde_json::from_value(payload.clone())
        .map_err(|e| anyhow!("missing identity key fields: {}", e))?;

    // The wire calls the video name `videoPath`; normalize before parsing
    let mut body = payload;
    if body.get("videoName").is_none() {
        body["videoName"] = json!(identity.video_path);
    }
    let mut record: ClipRecord = serde_json::from_value(body)
        .map_err(|e| anyhow!("invalid clip document: {}", e))?;

    let clips = store.load_clips().await?;
    if let Some(existing) = clips.iter().find(|c| {
        c.video_name == identity.video_path
            && c.start_time == identity.start_time
            && c.end_time == identity.end_time
    }) {
        record.id = existing.id.clone();
    }

    store.save_clip(&record).await?;
    Ok(serde_json::to_value(record)?)
}

/// Handle clip deletion
pub async fn delete_clip(store: &Arc<LocalStore>, id: &str) -> Result<Value> {
    store.delete_clip(id).await?;
    Ok(json!({ "deleted": id }))
}

/// Handle bulk create/update/delete
pub async fn bulk_clips(store: &Arc<LocalStore>, request: BulkRequest) -> Result<Value> {
    let mut applied = 0usize;
    let mut failed = 0usize;

    for clip in request.clips {
        let result = match request.operation {
            BulkOperation::Create | BulkOperation::Update => {
                match serde_json::from_value::<ClipRecord>(clip) {
                    Ok(record) => store.save_clip(&record).await,
                    Err(e) => Err(anyhow!("invalid clip document: {}", e)),
                }
            }
            BulkOperation::Delete => {
                let id = clip
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| clip.as_str().map(str::to_string));
                match id {
                    Some(id) => store.delete_clip(&id).await,
                    None => Err(anyhow!("delete entries need an id")),
                }
            }
        };
        match result {
            Ok(()) => applied += 1,
            Err(e) => {
                tracing::warn!("Bulk {:?} entry failed: {}", request.operation, e);
                failed += 1;
            }
        }
    }

    Ok(json!({
        "operation": request.operation,
        "applied": applied,
        "failed": failed
    }))
}

/// Handle aggregate statistics, overall and grouped by category.
pub async fn stats_summary(store: &Arc<LocalStore>) -> Result<Value> {
    let clips = store.load_clips().await?;

    fn aggregate<'a>(clips: impl Iterator<Item = &'a ClipRecord>) -> Value {
        let mut total = 0usize;
        let mut watched = 0usize;
        let mut memorized = 0usize;
        let mut total_watch_time = 0u64;
        for clip in clips {
            total += 1;
            if clip.watched {
                watched += 1;
            }
            if clip.memorized {
                memorized += 1;
            }
            total_watch_time += u64::from(clip.total_watch_time);
        }
        json!({
            "total": total,
            "watched": watched,
            "memorized": memorized,
            "totalWatchTime": total_watch_time
        })
    }

    Ok(json!({
        "overall": aggregate(clips.iter()),
        "byCategory": {
            "study": aggregate(clips.iter().filter(|c| c.category == Category::Study)),
            "relax": aggregate(clips.iter().filter(|c| c.category == Category::Relax)),
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
