//! Entry drafts (form input) and patches

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use super::{Coordinates, PhotoEntry};

/// An image file staged for a new entry, not yet embedded.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl StagedImage {
    #[must_use]
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, guessing the MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, guess_mime_type(path), bytes))
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.trim().to_ascii_lowercase().starts_with("image/")
    }

    /// Embed as a base64 `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for StagedImage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StagedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .finish()
    }
}

fn guess_mime_type(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// User input for a new entry, before id and timestamps are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub text: String,
    /// Already-embedded photo (data URI or URL)
    pub photo: Option<String>,
    /// Staged file, embedded on creation when `photo` is absent
    pub image: Option<StagedImage>,
    pub coords: Option<Coordinates>,
    pub images: Vec<String>,
    /// Raw user-supplied timestamp, validated before use
    pub timestamp: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub location: Option<String>,
}

impl EntryDraft {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: StagedImage) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub const fn with_coords(mut self, coords: Coordinates) -> Self {
        self.coords = Some(coords);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Partial update for an existing entry. `None` keeps the current value.
///
/// Coordinates and images can be replaced but never cleared by a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub text: Option<String>,
    pub photo: Option<String>,
    pub images: Option<Vec<String>>,
    pub coords: Option<Coordinates>,
    pub timestamp: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
    pub location: Option<String>,
}

impl EntryPatch {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Copy every present field onto `entry`, trimming text the way a new entry
    /// is trimmed. Timestamps and the dirty flag are the caller's business.
    pub fn apply_to(self, entry: &mut PhotoEntry) {
        if let Some(text) = self.text {
            entry.text = text.trim().to_string();
        }
        if let Some(photo) = self.photo {
            entry.photo = photo;
        }
        if let Some(images) = self.images {
            entry.images = images;
        }
        if let Some(coords) = self.coords {
            entry.coords = Some(coords);
        }
        if let Some(timestamp) = self.timestamp {
            entry.timestamp = Some(timestamp);
        }
        if let Some(tags) = self.tags {
            entry.tags = tags;
        }
        if let Some(author) = self.author {
            entry.author = Some(author);
        }
        if let Some(location) = self.location {
            entry.location = Some(location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryId;

    #[test]
    fn staged_image_embeds_as_data_uri() {
        let image = StagedImage::new("riss.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff]);
        assert_eq!(image.to_data_uri(), "data:image/jpeg;base64,/9j/");
        assert!(image.is_image());
        assert_eq!(image.size(), 3);
    }

    #[test]
    fn staged_image_debug_hides_payload() {
        let image = StagedImage::new("riss.jpg", "image/jpeg", vec![1, 2, 3, 4]);
        let rendered = format!("{image:?}");
        assert!(rendered.contains("[4 bytes]"));
        assert!(!rendered.contains("[1, 2"));
    }

    #[test]
    fn from_path_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Decke.PNG");
        std::fs::write(&path, [137, 80, 78, 71]).unwrap();

        let image = StagedImage::from_path(&path).unwrap();
        assert_eq!(image.file_name, "Decke.PNG");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.size(), 4);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let now = Utc::now();
        let mut entry = PhotoEntry {
            id: EntryId::from("a"),
            text: "Estrich".to_string(),
            photo: "p".to_string(),
            images: vec!["i".to_string()],
            coords: Some(Coordinates::new(1.0, 2.0)),
            created_at: now,
            updated_at: now,
            unsynced: false,
            timestamp: None,
            tags: Vec::new(),
            author: None,
            location: None,
        };
        let before = entry.clone();

        let patch = EntryPatch::default();
        assert!(patch.is_empty());
        patch.apply_to(&mut entry);
        assert_eq!(entry, before);

        EntryPatch::text("Estrich trocken").apply_to(&mut entry);
        assert_eq!(entry.text, "Estrich trocken");
        assert_eq!(entry.coords, before.coords);
        assert_eq!(entry.images, before.images);
    }
}
