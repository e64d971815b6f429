use std::path::{Path, PathBuf};

use crate::client::UploadFile;

static SUPPORTED_IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

/// Returns `true` if the path has an extension the service accepts.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

pub fn supported_extensions() -> &'static [&'static str] {
    SUPPORTED_IMAGE_EXTS
}

pub fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Reads a picked file for upload. Emptiness is checked by the upload
/// controller, not here.
pub fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?;
    Ok(UploadFile { name, bytes })
}

pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn expand_home_prefix(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// First free `name`, `name-2`, `name-3`, ... inside `output_dir`.
pub fn build_output_path(output_dir: &Path, file_name: &str) -> PathBuf {
    let base = output_dir.join(file_name);
    if !base.exists() {
        return base;
    }
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    for n in 2..10000 {
        let candidate = output_dir.join(format!("{}-{}{}", stem, n, suffix));
        if !candidate.exists() {
            return candidate;
        }
    }
    output_dir.join(format!("{}-final{}", stem, suffix))
}

/// Writes a downloaded result without overwriting earlier downloads.
pub fn save_download(output_dir: &Path, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let output_path = build_output_path(output_dir, file_name);
    std::fs::write(&output_path, bytes)?;
    Ok(output_path)
}
