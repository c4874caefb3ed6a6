//! Inline image attachments

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::RelayError;
use crate::types::ContentPart;

/// Read an uploaded image and encode it as an inline part
///
/// The reference must stay inside `upload_dir`; the MIME type comes from
/// the file extension and must be an image type.
pub async fn load_image(upload_dir: &Path, image_ref: &str) -> Result<ContentPart, RelayError> {
    let path = resolve(upload_dir, image_ref)?;

    let mime = mime_guess::from_path(&path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .ok_or_else(|| RelayError::InvalidRequest(format!("'{image_ref}' is not a supported image type")))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RelayError::InvalidRequest(format!("image '{image_ref}' not found")),
        _ => RelayError::Io(e),
    })?;

    Ok(ContentPart::Image {
        media_type: mime.essence_str().to_owned(),
        data: BASE64.encode(bytes),
    })
}

fn resolve(upload_dir: &Path, image_ref: &str) -> Result<PathBuf, RelayError> {
    let relative = Path::new(image_ref);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if image_ref.is_empty() || escapes {
        return Err(RelayError::InvalidRequest(format!(
            "image reference '{image_ref}' must be a path inside the upload directory"
        )));
    }

    Ok(upload_dir.join(relative))
}
