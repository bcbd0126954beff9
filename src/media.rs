use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MEDIA_SOURCE_SCHEME: &str = "media-source://";

/// Predicate deciding which browse leaves are shown.
pub type ContentFilter = dyn for<'a> Fn(&'a BrowseMedia) -> bool + Send + Sync;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("unknown media item: {0}")]
    NotFound(String),

    #[error("media item '{0}' is not playable")]
    NotPlayable(String),

    #[error("not a media-source reference: {0}")]
    InvalidReference(String),
}

/// A media reference resolved to something the speaker can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub url: String,
    pub mime_type: String,
}

/// One node of a browse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseMedia {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BrowseMedia>,
}

impl BrowseMedia {
    pub fn can_expand(&self) -> bool {
        !self.children.is_empty()
    }

    fn find(&self, id: &str) -> Option<&BrowseMedia> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Copy of this node whose children are limited to expandable nodes and
    /// leaves accepted by `filter`, applied recursively.
    fn filtered(&self, filter: &ContentFilter) -> BrowseMedia {
        BrowseMedia {
            children: self
                .children
                .iter()
                .filter(|c| c.can_expand() || filter(*c))
                .map(|c| c.filtered(filter))
                .collect(),
            ..self.clone()
        }
    }
}

/// Keeps items whose content type is audio.
pub fn audio_only(item: &BrowseMedia) -> bool {
    item.content_type.starts_with("audio/")
}

pub fn is_media_source(media_ref: &str) -> bool {
    media_ref.starts_with(MEDIA_SOURCE_SCHEME)
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, media_ref: &str) -> Result<ResolvedMedia, MediaError>;
}

#[async_trait]
pub trait MediaBrowser: Send + Sync {
    async fn browse(
        &self,
        content_id: Option<&str>,
        filter: &ContentFilter,
    ) -> Result<BrowseMedia, MediaError>;
}

/// Static media tree loaded from a JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCatalog {
    root: BrowseMedia,
}

impl Default for MediaCatalog {
    fn default() -> Self {
        Self::new(BrowseMedia {
            id: String::new(),
            title: "Media".to_string(),
            content_type: String::new(),
            url: None,
            children: Vec::new(),
        })
    }
}

impl MediaCatalog {
    pub fn new(root: BrowseMedia) -> Self {
        Self { root }
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let root: BrowseMedia = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl MediaResolver for MediaCatalog {
    async fn resolve(&self, media_ref: &str) -> Result<ResolvedMedia, MediaError> {
        let id = media_ref
            .strip_prefix(MEDIA_SOURCE_SCHEME)
            .ok_or_else(|| MediaError::InvalidReference(media_ref.to_string()))?;
        let node = self
            .root
            .find(id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;
        let url = node
            .url
            .clone()
            .ok_or_else(|| MediaError::NotPlayable(id.to_string()))?;
        Ok(ResolvedMedia {
            url,
            mime_type: node.content_type.clone(),
        })
    }
}

#[async_trait]
impl MediaBrowser for MediaCatalog {
    async fn browse(
        &self,
        content_id: Option<&str>,
        filter: &ContentFilter,
    ) -> Result<BrowseMedia, MediaError> {
        let node = match content_id.filter(|id| !id.is_empty()) {
            None => &self.root,
            Some(id) => {
                let id = id.strip_prefix(MEDIA_SOURCE_SCHEME).unwrap_or(id);
                self.root
                    .find(id)
                    .ok_or_else(|| MediaError::NotFound(id.to_string()))?
            }
        };
        Ok(node.filtered(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MediaCatalog {
        let json = r#"{
            "id": "",
            "title": "Media",
            "children": [
                {
                    "id": "music",
                    "title": "Music",
                    "children": [
                        {"id": "music/song.mp3", "title": "Song", "content_type": "audio/mpeg", "url": "http://nas.local/song.mp3"},
                        {"id": "music/cover.jpg", "title": "Cover", "content_type": "image/jpeg", "url": "http://nas.local/cover.jpg"}
                    ]
                },
                {"id": "clip.mp4", "title": "Clip", "content_type": "video/mp4", "url": "http://nas.local/clip.mp4"},
                {"id": "broken", "title": "Broken", "content_type": "audio/mpeg"}
            ]
        }"#;
        MediaCatalog::new(serde_json::from_str(json).unwrap())
    }

    #[tokio::test]
    async fn resolves_media_source_reference() {
        let resolved = catalog().resolve("media-source://music/song.mp3").await.unwrap();
        assert_eq!(resolved.url, "http://nas.local/song.mp3");
        assert_eq!(resolved.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn resolve_errors() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve("media-source://nope").await,
            Err(MediaError::NotFound("nope".into()))
        );
        assert_eq!(
            catalog.resolve("media-source://broken").await,
            Err(MediaError::NotPlayable("broken".into()))
        );
        assert!(matches!(
            catalog.resolve("http://example.com/a.mp3").await,
            Err(MediaError::InvalidReference(_))
        ));
    }

    #[tokio::test]
    async fn browse_keeps_only_audio_leaves() {
        let root = catalog().browse(None, &audio_only).await.unwrap();

        let ids: Vec<&str> = root.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["music", "broken"]);

        let music = &root.children[0];
        assert_eq!(music.children.len(), 1);
        assert_eq!(music.children[0].id, "music/song.mp3");
    }

    #[tokio::test]
    async fn browse_subtree_by_reference() {
        let music = catalog()
            .browse(Some("media-source://music"), &audio_only)
            .await
            .unwrap();
        assert_eq!(music.title, "Music");
        assert_eq!(music.children[0].id, "music/song.mp3");
    }

    #[tokio::test]
    async fn browse_through_trait_object_with_closure_filter() {
        let browser: std::sync::Arc<dyn MediaBrowser> = std::sync::Arc::new(catalog());
        let videos = browser
            .browse(None, &|item: &BrowseMedia| item.content_type.starts_with("video/"))
            .await
            .unwrap();

        let ids: Vec<&str> = videos.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["music", "clip.mp4"]);
        assert!(videos.children[0].children.is_empty());
    }

    #[test]
    fn media_source_detection() {
        assert!(is_media_source("media-source://music/song.mp3"));
        assert!(!is_media_source("http://example.com/stream"));
    }
}
