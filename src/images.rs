//! Data-URI images shared by the layout pass and both PDF writers.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!(
            "image src must be a base64 data URI (e.g. `data:image/png;base64,...`), got {preview:?}"
        ));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` after the header".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Decode a data-URI image and return its pixel dimensions.
pub fn pixel_size(src: &str) -> Result<(u32, u32), String> {
    let bytes = parse_data_uri(src)?;
    let img = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    Ok((img.width(), img.height()))
}
