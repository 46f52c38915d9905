//! Decoding of pushed page messages.
//!
//! Every event delivered by a page stream carries a JSON document that is
//! either a page fragment (`{"idx": 0, "total": 12, "pic_path": "..."}`) or
//! the empty-object sentinel (`{}`) marking the end of the stream. Anything
//! else is reported as a [`MalformedMessage`] so callers can tell protocol
//! breakage apart from transport failure.

use std::num::NonZeroUsize;

use derive_more::{Display, From};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Opaque locator of a single page image, as announced by the server.
///
/// # Examples
///
/// ```
/// use pagestream::message::PageRef;
///
/// let page = PageRef::new("manga/12/003.jpg");
/// assert_eq!(
///     page.resolve_against("http://media.local/").as_str(),
///     "http://media.local/manga/12/003.jpg"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display, From)]
#[display("{_0}")]
pub struct PageRef(String);

impl PageRef {
    /// Wrap a locator string.
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self { Self(locator.into()) }

    /// Borrow the locator.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Prefix the locator with a media base URL.
    ///
    /// Locators that already carry an `http://` or `https://` scheme are
    /// returned unchanged. Otherwise exactly one `/` separates the base and
    /// the locator.
    #[must_use]
    pub fn resolve_against(&self, base: &str) -> Self {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            return self.clone();
        }
        let base = base.trim_end_matches('/');
        let path = self.0.trim_start_matches('/');
        Self(format!("{base}/{path}"))
    }

    /// Consume the reference, returning the owned locator.
    #[must_use]
    pub fn into_inner(self) -> String { self.0 }
}

impl From<&str> for PageRef {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// One pushed page of a chapter.
///
/// `index` is kept signed exactly as declared on the wire; range checks are
/// the assembler's responsibility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Zero-based position of the page.
    pub index: i64,
    /// Number of pages the server expects to send for this chapter.
    pub total: NonZeroUsize,
    /// Locator of the page image.
    pub payload: PageRef,
}

impl Fragment {
    /// Build a fragment from its parts.
    #[must_use]
    pub fn new(index: i64, total: NonZeroUsize, payload: impl Into<PageRef>) -> Self {
        Self {
            index,
            total,
            payload: payload.into(),
        }
    }

    /// Replace the payload using `f`, keeping position and total.
    #[must_use]
    pub fn map_payload(self, f: impl FnOnce(PageRef) -> PageRef) -> Self {
        Self {
            payload: f(self.payload),
            ..self
        }
    }
}

/// A decoded stream message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    /// A page fragment.
    Fragment(Fragment),
    /// End of stream; the server closes the connection after sending it.
    Sentinel,
}

/// Reasons a pushed payload could not be decoded.
#[derive(Debug, Error)]
pub enum MalformedMessage {
    /// The payload was not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// The payload was JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,
    /// The object did not have the fragment shape.
    #[error("payload is neither a fragment nor the sentinel: {0}")]
    UnexpectedShape(#[source] serde_json::Error),
    /// The declared total was zero, negative, or unrepresentable.
    #[error("invalid page total {0}")]
    InvalidTotal(i64),
}

#[derive(Deserialize)]
struct WireFragment {
    idx: i64,
    total: i64,
    pic_path: String,
}

/// Decode one raw event payload.
///
/// # Errors
///
/// Returns [`MalformedMessage`] when `raw` is neither a fragment object nor
/// the empty-object sentinel.
///
/// # Examples
///
/// ```
/// use pagestream::message::{StreamMessage, decode_message};
///
/// assert_eq!(decode_message("{}").unwrap(), StreamMessage::Sentinel);
/// let StreamMessage::Fragment(page) =
///     decode_message(r#"{"idx": 2, "total": 3, "pic_path": "p2"}"#).unwrap()
/// else {
///     panic!("expected a fragment");
/// };
/// assert_eq!(page.index, 2);
/// ```
pub fn decode_message(raw: &str) -> Result<StreamMessage, MalformedMessage> {
    let value: Value = serde_json::from_str(raw).map_err(MalformedMessage::InvalidJson)?;
    let Value::Object(fields) = &value else {
        return Err(MalformedMessage::NotAnObject);
    };
    if fields.is_empty() {
        return Ok(StreamMessage::Sentinel);
    }

    let wire: WireFragment =
        serde_json::from_value(value).map_err(MalformedMessage::UnexpectedShape)?;
    let total = usize::try_from(wire.total)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or(MalformedMessage::InvalidTotal(wire.total))?;

    Ok(StreamMessage::Fragment(Fragment {
        index: wire.idx,
        total,
        payload: PageRef::new(wire.pic_path),
    }))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn decodes_fragment() {
        let msg = decode_message(r#"{"pic_path": "a/b.jpg", "idx": 4, "total": 9}"#)
            .expect("fragment should decode");
        let expected = Fragment::new(4, NonZeroUsize::new(9).expect("non-zero"), "a/b.jpg");
        assert_eq!(msg, StreamMessage::Fragment(expected));
    }

    #[test]
    fn ignores_unknown_fields() {
        let msg = decode_message(r#"{"idx": 0, "total": 1, "pic_path": "x", "chapter_id": 7}"#)
            .expect("extra fields are tolerated");
        assert!(matches!(msg, StreamMessage::Fragment(_)));
    }

    #[rstest]
    #[case::compact("{}")]
    #[case::spaced("  { }  ")]
    fn recognises_sentinel(#[case] raw: &str) {
        assert_eq!(decode_message(raw).expect("sentinel"), StreamMessage::Sentinel);
    }

    #[test]
    fn keeps_negative_index_for_assembler() {
        let msg = decode_message(r#"{"idx": -1, "total": 3, "pic_path": "p"}"#)
            .expect("negative index is decoded");
        let StreamMessage::Fragment(fragment) = msg else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.index, -1);
    }

    #[rstest]
    #[case::not_json("data please")]
    #[case::truncated(r#"{"idx": 1"#)]
    fn rejects_invalid_json(#[case] raw: &str) {
        assert!(matches!(
            decode_message(raw),
            Err(MalformedMessage::InvalidJson(_))
        ));
    }

    #[rstest]
    #[case::array("[]")]
    #[case::string(r#""{}""#)]
    #[case::number("3")]
    fn rejects_non_objects(#[case] raw: &str) {
        assert!(matches!(
            decode_message(raw),
            Err(MalformedMessage::NotAnObject)
        ));
    }

    #[rstest]
    #[case::missing_path(r#"{"idx": 1, "total": 2}"#)]
    #[case::string_index(r#"{"idx": "1", "total": 2, "pic_path": "p"}"#)]
    #[case::unrelated(r#"{"error": "boom"}"#)]
    fn rejects_wrong_shape(#[case] raw: &str) {
        assert!(matches!(
            decode_message(raw),
            Err(MalformedMessage::UnexpectedShape(_))
        ));
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-4)]
    fn rejects_non_positive_total(#[case] total: i64) {
        let raw = format!(r#"{{"idx": 0, "total": {total}, "pic_path": "p"}}"#);
        assert!(matches!(
            decode_message(&raw),
            Err(MalformedMessage::InvalidTotal(t)) if t == total
        ));
    }

    #[rstest]
    #[case::plain("http://media", "a.jpg", "http://media/a.jpg")]
    #[case::both_slashes("http://media/", "/a.jpg", "http://media/a.jpg")]
    #[case::absolute("http://media", "https://cdn/a.jpg", "https://cdn/a.jpg")]
    fn resolves_against_media_base(#[case] base: &str, #[case] path: &str, #[case] want: &str) {
        assert_eq!(PageRef::new(path).resolve_against(base).as_str(), want);
    }
}
