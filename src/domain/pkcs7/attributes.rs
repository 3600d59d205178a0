//! Signed attribute set of a CMS signer info.

use std::fmt;
use std::time::SystemTime;

use der::asn1::ObjectIdentifier;

/// Signed attributes as covered by the signature.
///
/// `der` is the exact SET OF Attribute encoding (tag 0x31) that the signer
/// signed; the decoded fields are the attributes this crate interprets.
#[derive(Clone)]
pub struct SignedAttributes {
    der: Vec<u8>,
    message_digest: Option<Vec<u8>>,
    signing_time: Option<SystemTime>,
    content_type: Option<ObjectIdentifier>,
    count: usize,
}

impl SignedAttributes {
    #[must_use]
    pub fn new(
        der: Vec<u8>,
        message_digest: Option<Vec<u8>>,
        signing_time: Option<SystemTime>,
        content_type: Option<ObjectIdentifier>,
        count: usize,
    ) -> Self {
        Self {
            der,
            message_digest,
            signing_time,
            content_type,
            count,
        }
    }

    /// DER of the SET OF Attribute; the input to signature verification.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
    #[must_use]
    pub fn message_digest(&self) -> Option<&[u8]> {
        self.message_digest.as_deref()
    }
    #[must_use]
    pub fn signing_time(&self) -> Option<SystemTime> {
        self.signing_time
    }
    #[must_use]
    pub fn content_type(&self) -> Option<&ObjectIdentifier> {
        self.content_type.as_ref()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Debug for SignedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedAttributes(count={}, total_len={}, message_digest={})",
            self.count,
            self.der.len(),
            self.message_digest.is_some()
        )
    }
}
