use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Apenas imagens são permitidas.")]
    NotAnImage,
    #[error("Arquivo muito grande. Máximo 5MB.")]
    TooLarge { size: usize },
    #[error("invalid avatar data URL: {0}")]
    InvalidEncoding(String),
    #[error("failed to read avatar file: {0}")]
    Io(#[from] std::io::Error),
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "ico" => Some("image/x-icon"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// Checks that `data_url` is a base64 image data URL within the size cap.
pub fn validate_avatar(data_url: &str) -> Result<(), AvatarError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AvatarError::InvalidEncoding("missing data: scheme".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AvatarError::InvalidEncoding("expected ;base64, payload".to_string()))?;

    if !mime.starts_with("image/") {
        return Err(AvatarError::NotAnImage);
    }

    let decoded = STANDARD.decode(payload).map_err(|e| AvatarError::InvalidEncoding(e.to_string()))?;
    if decoded.len() > MAX_AVATAR_BYTES {
        return Err(AvatarError::TooLarge { size: decoded.len() });
    }
    Ok(())
}

/// Reads an image file and encodes it as a data URL.
pub fn encode_avatar_file(path: &Path) -> Result<String, AvatarError> {
    let mime = mime_for_extension(path).ok_or(AvatarError::NotAnImage)?;

    let size = fs::metadata(path)?.len() as usize;
    if size > MAX_AVATAR_BYTES {
        return Err(AvatarError::TooLarge { size });
    }

    let bytes = fs::read(path)?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
