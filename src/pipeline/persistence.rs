// Save and load whole projects against the blob store.
// Saving always writes a brand new document; nothing is updated in place.
//
// The index is a JSON array of documents, newest first. It is kept as raw entries and each
// document is read on its own, so one unreadable entry is skipped instead of hiding the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::loader::{prepare, PreparedSample};
use crate::pipeline::blob_store::{BlobStore, StoreError};
use crate::pipeline::project::{drum_key, sampler_key, ProjectDoc, ProjectSource, RestoredProject};
use crate::shared::{MAX_SAMPLER_SECONDS, NUM_DRUM_ROWS};

pub const INDEX_KEY: &str = "loopdeck:projects";

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Everything a load needs, fetched and decoded up front. Installing it can't fail.
pub struct LoadedProject {
    pub project: RestoredProject,
    pub drums: [Option<PreparedSample>; NUM_DRUM_ROWS],
    pub sampler: Option<PreparedSample>,
}

/// A save captured from the live session. Writing it out touches nothing but the store,
/// so it can happen on another thread.
pub struct SaveRequest {
    pub doc: ProjectDoc,
    pub blobs: Vec<(String, Arc<Vec<u8>>)>,
}

impl SaveRequest {
    pub fn capture(src: &ProjectSource<'_>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let mut blobs: Vec<(String, Arc<Vec<u8>>)> = (0..NUM_DRUM_ROWS)
            .filter_map(|row| src.samples.drum(row).map(|s| (drum_key(&id, row), s.source.clone())))
            .collect();
        if let Some(sample) = src.samples.sampler() {
            blobs.push((sampler_key(&id), sample.source.clone()));
        }
        Self { doc: ProjectDoc::capture(id, src), blobs }
    }
}

fn read_index(store: &BlobStore) -> Result<Vec<Value>, StoreError> {
    match store.get_value(INDEX_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn write_index(store: &BlobStore, entries: &[Value]) -> Result<(), StoreError> {
    store.put_value(INDEX_KEY, &serde_json::to_string(entries)?)
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id")?.as_str()
}

fn parse_entry(entry: &Value) -> Option<ProjectDoc> {
    match ProjectDoc::deserialize(entry) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(id = entry_id(entry).unwrap_or("?"), error = %e, "skipping unreadable project document");
            None
        }
    }
}

fn documents(store: &BlobStore) -> Result<Vec<ProjectDoc>, StoreError> {
    Ok(read_index(store)?.iter().filter_map(parse_entry).collect())
}

pub fn save_project(store: &BlobStore, src: &ProjectSource<'_>) -> Result<ProjectDoc, StoreError> {
    write_project(store, SaveRequest::capture(src))
}

// The index is read before any blob goes in, so a broken index can't leave orphans behind
pub fn write_project(store: &BlobStore, req: SaveRequest) -> Result<ProjectDoc, StoreError> {
    let SaveRequest { doc, blobs } = req;
    let mut index = read_index(store)?;
    let entry = serde_json::to_value(&doc)?;

    for (key, bytes) in &blobs {
        store.put_blob(key, bytes)?;
    }
    index.insert(0, entry); // newest first
    write_index(store, &index)?;

    info!(id = %doc.id, name = %doc.name, blobs = blobs.len(), "project saved");
    Ok(doc)
}

// newest first
pub fn list_projects(store: &BlobStore) -> Result<Vec<ProjectSummary>, StoreError> {
    Ok(documents(store)?
        .into_iter()
        .map(|d| ProjectSummary { id: d.id, name: d.name, created_at: d.created_at })
        .collect())
}

// Works on unreadable entries too; their blobs are found by the usual key pattern
pub fn delete_project(store: &BlobStore, id: &str) -> Result<(), StoreError> {
    let mut index = read_index(store)?;
    let pos = index
        .iter()
        .position(|e| entry_id(e) == Some(id))
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    let entry = index.remove(pos);
    let keys = match ProjectDoc::deserialize(&entry) {
        Ok(doc) => doc.blob_keys(),
        Err(_) => (0..NUM_DRUM_ROWS)
            .map(|row| drum_key(id, row))
            .chain(std::iter::once(sampler_key(id)))
            .collect(),
    };
    for key in keys {
        store.delete_blob(&key)?;
    }
    write_index(store, &index)?;
    info!(id, "project deleted");
    Ok(())
}

// Fetch and decode one stored sample. Anything wrong with it just means no buffer.
fn fetch_sample(store: &BlobStore, key: &str, name: String, target_rate: u32) -> Option<PreparedSample> {
    let bytes = match store.get_blob(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(key, "blob missing, leaving slot empty");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "blob read failed, leaving slot empty");
            return None;
        }
    };
    match prepare(name, bytes, target_rate) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(key, error = %e, "blob undecodable, leaving slot empty");
            None
        }
    }
}

// Read, normalize, fetch and decode. Nothing in the session changes here.
pub fn gather_project(store: &BlobStore, id: &str, target_rate: u32) -> Result<LoadedProject, StoreError> {
    let doc = read_index(store)?
        .iter()
        .find(|e| entry_id(e) == Some(id))
        .and_then(parse_entry)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    let project = doc.restore();

    let drums = std::array::from_fn(|row| {
        let key = project.drum_keys[row].as_deref()?;
        let name = project.drum_names[row].clone().unwrap_or_else(|| format!("drum {}", row + 1));
        fetch_sample(store, key, name, target_rate)
    });

    let sampler = project.sampler_key.as_deref().and_then(|key| {
        let name = project.sampler_name.clone().unwrap_or_else(|| "sampler".to_string());
        fetch_sample(store, key, name, target_rate)
    });
    let sampler = sampler.filter(|p| {
        let ok = p.sample.duration() <= MAX_SAMPLER_SECONDS;
        if !ok {
            warn!(duration = p.sample.duration(), "stored sampler sample too long, leaving it empty");
        }
        ok
    });

    Ok(LoadedProject { project, drums, sampler })
}

pub fn latest_project_id(store: &BlobStore) -> Result<Option<String>, StoreError> {
    Ok(list_projects(store)?.into_iter().next().map(|p| p.id))
}

// The newest readable project, if there is one
pub fn gather_latest(store: &BlobStore, target_rate: u32) -> Result<Option<LoadedProject>, StoreError> {
    match latest_project_id(store)? {
        Some(id) => gather_project(store, &id, target_rate).map(Some),
        None => Ok(None),
    }
}
