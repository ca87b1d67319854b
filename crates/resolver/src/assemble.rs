//! Folding intercepted requests into a response.

use {
    serde::{Deserialize, Serialize},
    snare_browser::{InterceptedRequest, ResourceKind},
    snare_cache::CacheRecord,
};

/// What a caller gets back: `{ "source": ..., "subtitle": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    #[serde(rename = "source")]
    pub manifest_url: String,
    #[serde(rename = "subtitle", default)]
    pub subtitle_urls: Vec<String>,
}

impl ResolutionResult {
    pub fn has_manifest(&self) -> bool {
        !self.manifest_url.is_empty()
    }
}

impl From<CacheRecord> for ResolutionResult {
    fn from(record: CacheRecord) -> Self {
        Self {
            manifest_url: record.manifest_url,
            subtitle_urls: record.subtitle_urls,
        }
    }
}

/// The last manifest observed wins; subtitles keep arrival order,
/// duplicates included.
pub fn assemble(observations: &[InterceptedRequest]) -> ResolutionResult {
    observations
        .iter()
        .fold(ResolutionResult::default(), |mut acc, obs| {
            match obs.kind {
                ResourceKind::ManifestCandidate => acc.manifest_url = obs.url.clone(),
                ResourceKind::SubtitleCandidate => acc.subtitle_urls.push(obs.url.clone()),
                _ => {},
            }
            acc
        })
}
