//! MIME body extraction.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use super::api_types::MessagePart;

/// Gmail emits base64url with or without padding depending on the part.
const URL_SAFE_ANY_PADDING: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[allow(clippy::expect_used)]
static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .expect("static script/style pattern is valid")
});

#[allow(clippy::expect_used)]
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>|</tr\s*>|</li\s*>")
        .expect("static block break pattern is valid")
});

#[allow(clippy::expect_used)]
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern is valid"));

#[allow(clippy::expect_used)]
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("static entity pattern is valid")
});

/// Decode base64url data to text, replacing invalid UTF-8.
pub fn decode_base64url(data: &str) -> Result<String, base64::DecodeError> {
    let trimmed: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = URL_SAFE_ANY_PADDING.decode(trimmed)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reduce HTML to its visible text.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, " ");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = raw
            .strip_prefix('x')
            .map_or_else(|| raw.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok());
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text of a message: the first `text/plain` part anywhere in the tree,
/// otherwise the first `text/html` part with tags stripped.
#[must_use]
pub fn extract_body(payload: &MessagePart) -> Option<String> {
    if let Some(plain) = find_part(payload, "text/plain") {
        return Some(plain);
    }
    find_part(payload, "text/html").map(|html| strip_html(&html))
}

fn find_part(part: &MessagePart, mime_type: &str) -> Option<String> {
    if part.mime_type.eq_ignore_ascii_case(mime_type)
        && let Some(data) = part.data()
    {
        match decode_base64url(data) {
            Ok(text) => return Some(text),
            Err(e) => tracing::warn!(mime_type, error = %e, "Undecodable message part"),
        }
    }
    part.parts.iter().find_map(|child| find_part(child, mime_type))
}
