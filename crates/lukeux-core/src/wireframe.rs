//! Wireframe images rendered by the client and stored for export.
//!
//! The image endpoint is public: Figma fetches it by URL when the export
//! comment is opened, so the id doubles as an unguessable capability.

use crate::attachment::{self, AttachmentKind};
use crate::config::AttachmentLimits;
use crate::error::{LukeError, Result};
use crate::store::{Record, RecordTable, Store, WIREFRAMES};
use crate::validate;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wireframe {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub concept_index: Option<u32>,
    pub title: String,
    pub mime_type: String,
    /// Base64 image bytes.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub data: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

impl Record for Wireframe {
    const TABLE: RecordTable = WIREFRAMES;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Wireframe {
    /// Metadata only, for listings.
    pub fn without_data(&self) -> Wireframe {
        Wireframe {
            data: String::new(),
            ..self.clone()
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| LukeError::Store(format!("wireframe {} is corrupt: {e}", self.id)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWireframe {
    pub title: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub concept_index: Option<u32>,
    /// PNG/JPEG/GIF/WebP as base64 or a `data:` URL.
    pub image: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Validate and store an image. Only the image allow-list and the image size
/// cap apply.
pub fn create(
    store: &Store,
    owner_id: &str,
    new: NewWireframe,
    limits: &AttachmentLimits,
) -> Result<Wireframe> {
    let title = validate::validate_name("title", &new.title)?;
    let declared = new.mime_type.clone().or_else(|| {
        new.image
            .trim()
            .strip_prefix("data:")
            .and_then(|r| r.split_once(";base64,"))
            .map(|(m, _)| m.to_string())
    });
    let upload = attachment::AttachmentUpload {
        name: format!("{}.png", crate::paths::slugify(&title)),
        mime_type: declared,
        data: new.image,
    };
    let processed = attachment::process_attachment(&upload, limits)?;
    if processed.kind != AttachmentKind::Image {
        return Err(LukeError::UnsupportedAttachment {
            name: title,
            mime: processed.mime_type,
        });
    }
    let data = processed.base64_data().unwrap_or_default().to_string();
    let wireframe = Wireframe {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        task_id: new.task_id,
        concept_index: new.concept_index,
        title,
        mime_type: processed.mime_type,
        data,
        size: processed.size,
        created_at: Utc::now(),
    };
    store.put(&wireframe)?;
    tracing::info!(wireframe = %wireframe.id, size = wireframe.size, "wireframe stored");
    Ok(wireframe)
}

pub fn get(store: &Store, id: &str) -> Result<Wireframe> {
    store
        .get(id)?
        .ok_or_else(|| LukeError::WireframeNotFound(id.to_string()))
}

pub fn get_owned(store: &Store, owner_id: &str, id: &str) -> Result<Wireframe> {
    let w = get(store, id)?;
    if w.owner_id != owner_id {
        return Err(LukeError::WireframeNotFound(id.to_string()));
    }
    Ok(w)
}

/// The owner's wireframes without image data, newest first.
pub fn list_for_owner(store: &Store, owner_id: &str) -> Result<Vec<Wireframe>> {
    let mut all: Vec<Wireframe> = store
        .filter::<Wireframe>(|w| w.owner_id == owner_id)?
        .iter()
        .map(Wireframe::without_data)
        .collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0];

    fn new_wireframe(image: String, mime: Option<&str>) -> NewWireframe {
        NewWireframe {
            title: "Checkout flow".into(),
            task_id: None,
            concept_index: Some(1),
            image,
            mime_type: mime.map(str::to_string),
        }
    }

    #[test]
    fn stores_data_url_and_round_trips_bytes() {
        let (_dir, store) = temp_store();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(PNG));
        let w = create(&store, "u1", new_wireframe(url, None), &AttachmentLimits::default())
            .unwrap();
        assert_eq!(w.mime_type, "image/png");
        assert_eq!(w.size, PNG.len());
        assert_eq!(get(&store, &w.id).unwrap().bytes().unwrap(), PNG);
    }

    #[test]
    fn listing_strips_image_data() {
        let (_dir, store) = temp_store();
        create(
            &store,
            "u1",
            new_wireframe(STANDARD.encode(PNG), Some("image/png")),
            &AttachmentLimits::default(),
        )
        .unwrap();
        let listed = list_for_owner(&store, "u1").unwrap();
        assert!(listed[0].data.is_empty());
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn rejects_non_images() {
        let (_dir, store) = temp_store();
        let err = create(
            &store,
            "u1",
            new_wireframe(STANDARD.encode(b"hello"), Some("text/plain")),
            &AttachmentLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LukeError::UnsupportedAttachment { .. }));
    }

    #[test]
    fn respects_image_cap() {
        let (_dir, store) = temp_store();
        let limits = AttachmentLimits {
            max_image_bytes: 4,
            ..AttachmentLimits::default()
        };
        let err = create(
            &store,
            "u1",
            new_wireframe(STANDARD.encode(PNG), Some("image/png")),
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, LukeError::AttachmentTooLarge { .. }));
    }

    #[test]
    fn foreign_owner_not_found() {
        let (_dir, store) = temp_store();
        let w = create(
            &store,
            "u1",
            new_wireframe(STANDARD.encode(PNG), Some("image/png")),
            &AttachmentLimits::default(),
        )
        .unwrap();
        assert!(get_owned(&store, "u2", &w.id).is_err());
    }
}
