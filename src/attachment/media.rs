/// Upload media type allow-list
///
/// Only document and archive formats are accepted; the extension of the
/// stored blob comes from this table, never from the uploaded file name.

/// Allowed media types and the extension their blobs are stored with
pub const ALLOWED_MEDIA_TYPES: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("application/msword", ".doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("application/x-zip-compressed", ".zip"),
    ("application/zip", ".zip"),
];

/// Storage extension for a declared media type, if it is allowed
///
/// Parameters such as `; charset=binary` and letter case are ignored.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_MEDIA_TYPES
        .iter()
        .find(|(allowed, _)| allowed.eq_ignore_ascii_case(essence))
        .map(|(_, extension)| *extension)
}
