//! Internal module for locating and decoding message bodies.

use crate::error::{Error, Result};
use crate::gmail::{Message, MessagePart};
use crate::matcher::Matcher;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::debug;

/// Gmail sends base64url; some relays re-encode with the standard alphabet.
/// URL-safe characters are folded into the standard alphabet before decoding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Result of attempting to extract a match from a message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExtractResult {
    /// A match was found
    Match(String),
    /// The body was decoded but the matcher found nothing
    NoMatch,
    /// Neither the top-level body nor any `text/plain` part carries data
    NoBody,
}

/// Decodes the body of `message` and runs `pattern_matcher` over it.
///
/// # Errors
///
/// Returns [`Error::DecodeBody`] if the body data is not valid base64.
pub(crate) fn extract_match_from_message(
    message: &Message,
    pattern_matcher: &dyn Matcher,
) -> Result<ExtractResult> {
    let Some(data) = message.payload.as_ref().and_then(locate_body_data) else {
        debug!(message_id = %message.id, "Message has no plain-text body");
        return Ok(ExtractResult::NoBody);
    };

    let text = decode_body(data).map_err(|source| Error::DecodeBody {
        message_id: message.id.clone(),
        source,
    })?;

    if let Some(result) = pattern_matcher.find_match(&text) {
        debug!(
            message_id = %message.id,
            matcher = %pattern_matcher.description(),
            matched_len = result.len(),
            "Found match in message body"
        );
        Ok(ExtractResult::Match(result.into_owned()))
    } else {
        debug!(
            message_id = %message.id,
            matcher = %pattern_matcher.description(),
            "No match found in message body"
        );
        Ok(ExtractResult::NoMatch)
    }
}

/// Returns the top-level inline body data, or else the data of the first
/// `text/plain` part in depth-first order.
pub(crate) fn locate_body_data(payload: &MessagePart) -> Option<&str> {
    payload.data().or_else(|| first_plain_text(&payload.parts))
}

fn first_plain_text(parts: &[MessagePart]) -> Option<&str> {
    parts.iter().find_map(|part| {
        let own = if part.mime_type.eq_ignore_ascii_case("text/plain") {
            part.data()
        } else {
            None
        };
        own.or_else(|| first_plain_text(&part.parts))
    })
}

/// Decodes base64 body data (either alphabet, padding optional) to text.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub(crate) fn decode_body(data: &str) -> std::result::Result<String, base64::DecodeError> {
    let standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT.decode(standard)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
