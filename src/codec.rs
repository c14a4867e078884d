//! Body codecs and the registry that selects them.
//!
//! A codec turns a typed value into wire bytes and back. The client and the
//! server never name a codec directly: they ask the [`CodecRegistry`] for one
//! that supports a (value type, media type) pair. Registries are consulted in
//! registration order, first match wins, and a miss is a
//! [`CodecError::NoCodec`] rather than a silent fallback.
//!
//! ```rust
//! use stella::codec::{CodecRegistry, MediaType};
//!
//! let codecs = CodecRegistry::default();
//! let body = codecs.encode(&"hi".to_owned(), &MediaType::TEXT_PLAIN).unwrap();
//! let back: String = codecs.decode(body.bytes, &MediaType::TEXT_PLAIN).unwrap();
//! assert_eq!(back, "hi");
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;

use crate::error::{BoxError, CodecError};

// ── MediaType ─────────────────────────────────────────────────────────────────

/// A media type as carried in `Content-Type`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MediaType {
    essence: &'static str,
    charset: Option<&'static str>,
}

impl MediaType {
    /// `text/plain; charset=utf-8`, the only content type of the contract.
    pub const TEXT_PLAIN: Self = Self { essence: "text/plain", charset: Some("utf-8") };

    pub const fn new(essence: &'static str) -> Self {
        Self { essence, charset: None }
    }

    /// The `type/subtype` part, without parameters.
    pub fn essence(&self) -> &'static str {
        self.essence
    }

    /// True when `other` has the same `type/subtype`.
    ///
    /// Parameters are ignored and the comparison is ASCII case-insensitive,
    /// so `Text/Plain; charset=UTF-8` matches [`MediaType::TEXT_PLAIN`].
    pub fn matches(&self, other: &str) -> bool {
        let essence = other.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case(self.essence)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.charset {
            Some(charset) => write!(f, "{}; charset={charset}", self.essence),
            None => f.write_str(self.essence),
        }
    }
}

// ── ValueType ─────────────────────────────────────────────────────────────────

/// The declared Rust type of a value a codec is asked to handle.
#[derive(Clone, Copy, Debug)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    pub fn of<T: Any>() -> Self {
        Self { id: TypeId::of::<T>(), name: type_name::<T>() }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

// ── EncodedBody ───────────────────────────────────────────────────────────────

/// Wire bytes plus the media type they were encoded as.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub media_type: MediaType,
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// A bidirectional transform between values of some type and wire bytes.
///
/// Object safe so a registry can hold codecs for unrelated types side by side.
/// Values cross the trait as `dyn Any`; use the typed helpers on
/// [`CodecRegistry`] instead of calling these directly.
pub trait Codec: Send + Sync + 'static {
    /// Media type this codec reads and writes.
    fn media_type(&self) -> MediaType;

    /// Whether values of `ty` can be encoded and decoded.
    ///
    /// Returning `false` is not an error: the registry moves on to the next
    /// codec.
    fn supports(&self, ty: ValueType) -> bool;

    fn encode(&self, value: &dyn Any) -> Result<EncodedBody, CodecError>;

    fn decode(&self, bytes: Bytes) -> Result<Box<dyn Any + Send>, CodecError>;
}

// ── TextCodec ─────────────────────────────────────────────────────────────────

/// Plain-text codec: `String` ⇄ UTF-8 `text/plain` bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextCodec;

impl TextCodec {
    /// Encodes `value` as UTF-8. Never fails, whatever the content.
    pub fn encode_request_body(&self, value: &str) -> EncodedBody {
        EncodedBody {
            bytes: Bytes::copy_from_slice(value.as_bytes()),
            media_type: MediaType::TEXT_PLAIN,
        }
    }

    /// Decodes a fully received body as UTF-8.
    pub fn decode_response_body(&self, bytes: Bytes) -> Result<String, CodecError> {
        match std::str::from_utf8(&bytes) {
            Ok(text) => Ok(text.to_owned()),
            Err(source) => Err(CodecError::InvalidUtf8 { bytes, source }),
        }
    }

    /// Reads `body` to the end, then decodes it.
    ///
    /// A stream that fails mid-way (connection reset, truncated chunk) is a
    /// [`CodecError::Read`].
    pub async fn decode_stream<B>(&self, body: B) -> Result<String, CodecError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let bytes = read_to_end(body).await?;
        self.decode_response_body(bytes)
    }
}

impl Codec for TextCodec {
    fn media_type(&self) -> MediaType {
        MediaType::TEXT_PLAIN
    }

    fn supports(&self, ty: ValueType) -> bool {
        ty.is::<String>()
    }

    fn encode(&self, value: &dyn Any) -> Result<EncodedBody, CodecError> {
        value
            .downcast_ref::<String>()
            .map(|s| self.encode_request_body(s))
            .ok_or(CodecError::UnsupportedValue {
                codec: "text",
                type_name: "non-String value",
            })
    }

    fn decode(&self, bytes: Bytes) -> Result<Box<dyn Any + Send>, CodecError> {
        Ok(Box::new(self.decode_response_body(bytes)?))
    }
}

/// Collects an HTTP body into one contiguous buffer.
pub(crate) async fn read_to_end<B>(body: B) -> Result<Bytes, CodecError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| CodecError::Read(e.into()))
}

// ── CodecRegistry ─────────────────────────────────────────────────────────────

/// Ordered set of codecs, consulted first to last.
///
/// Built once at startup and shared behind an `Arc` by the client and the
/// router. Codecs are stateless, so concurrent use needs no locking.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// A registry with no codecs. Every lookup fails until one is added.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Appends `codec`. Earlier registrations win on overlap.
    pub fn with(mut self, codec: impl Codec) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    /// The first codec that supports `ty` and speaks `media_type`.
    pub fn find(&self, ty: ValueType, media_type: &MediaType) -> Result<&dyn Codec, CodecError> {
        self.codecs
            .iter()
            .find(|c| c.media_type().essence() == media_type.essence() && c.supports(ty))
            .map(|c| c.as_ref())
            .ok_or(CodecError::NoCodec {
                type_name: ty.name(),
                media_type: *media_type,
            })
    }

    pub fn encode<T: Any>(
        &self,
        value: &T,
        media_type: &MediaType,
    ) -> Result<EncodedBody, CodecError> {
        self.find(ValueType::of::<T>(), media_type)?.encode(value)
    }

    pub fn decode<T: Any>(&self, bytes: Bytes, media_type: &MediaType) -> Result<T, CodecError> {
        let ty = ValueType::of::<T>();
        let decoded = self.find(ty, media_type)?.decode(bytes)?;
        decoded
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| CodecError::UnsupportedValue {
                codec: media_type.essence(),
                type_name: ty.name(),
            })
    }
}

impl Default for CodecRegistry {
    /// A registry holding only [`TextCodec`].
    fn default() -> Self {
        Self::empty().with(TextCodec)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|c| c.media_type()))
            .finish()
    }
}
