//! Strong type definitions for the stanza gate.
//!
//! Principals are newtypes so a destination can never be confused with an
//! arbitrary string at an API boundary.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// A per-principal sequence number. Senders start at 0.
pub type SeqNo = u64;

/// The identity under which an independent ordering stream is kept.
///
/// Typically the destination address of a stanza. Cloning is cheap (shared
/// string); two principals are the same stream iff their strings are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Principal(Arc<str>);

impl Principal {
    /// Create a principal without validation.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Create a principal from untrusted input, rejecting blank identities.
    pub fn parse(id: &str) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(CoreError::InvalidPrincipal(format!("{id:?} is blank")));
        }
        Ok(Self::new(id))
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.0)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Principal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.0.to_string()
    }
}

/// Anything that can be placed in a reassembly inbox.
pub trait Sequenced {
    /// The sequence number that orders this item within its principal.
    fn seq(&self) -> SeqNo;
}

/// A unit of inbound work: a sequence number, the principal it is ordered
/// under, and a payload the gate never looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza<P = Bytes> {
    principal: Principal,
    seq: SeqNo,
    payload: P,
}

impl<P> Stanza<P> {
    /// Create a stanza.
    pub fn new(principal: Principal, seq: SeqNo, payload: P) -> Self {
        Self {
            principal,
            seq,
            payload,
        }
    }

    /// The sequence number assigned by the sender.
    pub fn seq(&self) -> SeqNo {
        self.seq
    }

    /// The principal this stanza is ordered under.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Borrow the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Take the payload, dropping the envelope.
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Split into principal, sequence number and payload.
    pub fn into_parts(self) -> (Principal, SeqNo, P) {
        (self.principal, self.seq, self.payload)
    }
}

impl<P> Sequenced for Stanza<P> {
    fn seq(&self) -> SeqNo {
        self.seq
    }
}
