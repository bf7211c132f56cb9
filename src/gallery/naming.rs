/// Lowercase `title` and replace every character outside `[a-z0-9]` with `-`.
pub fn sanitize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Extension of the original file, or one registered for its media type.
fn extension(file_name: &str, media_type: &str) -> String {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match from_name {
        Some(ext) => ext.to_string(),
        None => mime_guess::get_mime_extensions_str(media_type)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| "bin".to_string()),
    }
}

/// Stored object name: `{timestamp}-{sanitizedTitle}.{extension}`.
pub fn derive_object_name(
    timestamp_millis: i64,
    title: &str,
    file_name: &str,
    media_type: &str,
) -> String {
    format!(
        "{timestamp_millis}-{}.{}",
        sanitize_title(title.trim()),
        extension(file_name, media_type)
    )
}

/// Millisecond timestamp encoded at the front of a derived object name.
pub fn timestamp_of(object_path: &str) -> Option<i64> {
    let name = object_path.rsplit('/').next().unwrap_or(object_path);
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !name[digits.len()..].starts_with('-') {
        return None;
    }
    digits.parse().ok()
}
