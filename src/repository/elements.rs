//! Generic ASN.1 sequences.
//!
//! The content of RPKI signed objects is a SEQUENCE whose elements have a
//! fixed order and type. This module provides [`ElementSeq`], the decoded
//! list of elements of such a sequence, with accessors that check the type
//! of an element at a given position and return its typed value.
//!
//! Decoding is flat: every element is kept in its complete encoded form and
//! only decoded into its value when the caller asks for it. This includes
//! nested sequences which are decoded via [`ElementSeq::sequence`].

use std::fmt;
use std::convert::Infallible;
use bcder::{BitString, Ia5String, Integer, Mode, OctetString, Oid, Tag};
use bcder::decode::{self, BytesSource, DecodeError};
use bytes::Bytes;
use super::error::StructuralError;


//------------ ElementKind ---------------------------------------------------

/// The type of an element as far as we care about it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ElementKind {
    Integer,
    BitString,
    OctetString,
    Oid,
    Ia5String,
    UtcTime,
    GeneralizedTime,
    Sequence,
    Set,

    /// A constructed value with the context specific tag 0.
    ///
    /// This is used for explicitly tagged version fields.
    Explicit0,
}

impl ElementKind {
    /// Returns the tag of values of this kind.
    pub fn tag(self) -> Tag {
        match self {
            ElementKind::Integer => Tag::INTEGER,
            ElementKind::BitString => Tag::BIT_STRING,
            ElementKind::OctetString => Tag::OCTET_STRING,
            ElementKind::Oid => Tag::OID,
            ElementKind::Ia5String => Tag::IA5_STRING,
            ElementKind::UtcTime => Tag::UTC_TIME,
            ElementKind::GeneralizedTime => Tag::GENERALIZED_TIME,
            ElementKind::Sequence => Tag::SEQUENCE,
            ElementKind::Set => Tag::SET,
            ElementKind::Explicit0 => Tag::CTX_0,
        }
    }

    /// Returns whether values of this kind are constructed in DER.
    fn is_constructed(self) -> bool {
        matches!(
            self,
            ElementKind::Sequence | ElementKind::Set | ElementKind::Explicit0
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ElementKind::Integer => "integer",
            ElementKind::BitString => "bit string",
            ElementKind::OctetString => "octet string",
            ElementKind::Oid => "object identifier",
            ElementKind::Ia5String => "IA5 string",
            ElementKind::UtcTime => "UTC time",
            ElementKind::GeneralizedTime => "generalised time",
            ElementKind::Sequence => "sequence",
            ElementKind::Set => "set",
            ElementKind::Explicit0 => "[0] explicit tag",
        })
    }
}


//------------ Element -------------------------------------------------------

/// A single element of a sequence.
#[derive(Clone, Debug)]
pub struct Element {
    /// The tag of the element.
    tag: Tag,

    /// Whether the element used the constructed encoding.
    constructed: bool,

    /// The complete encoding of the element, header included.
    encoded: Bytes,
}

impl Element {
    /// Returns the tag of the element.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Returns the complete DER encoding of the element.
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }
}


//------------ ElementSeq ----------------------------------------------------

/// The elements of a sequence in their order of appearance.
#[derive(Clone, Debug, Default)]
pub struct ElementSeq {
    elements: Vec<Element>,
}

/// # Decoding
///
impl ElementSeq {
    /// Decodes a complete DER encoded SEQUENCE.
    ///
    /// The data must contain exactly one value and nothing else.
    pub fn decode(data: Bytes) -> Result<Self, StructuralError> {
        let value = Mode::Der.decode(data.clone(), |cons| {
            cons.capture_one()
        }).map_err(StructuralError::decoding)?;
        if value.len() != data.len() {
            return Err(StructuralError::trailing_data(
                data.len() - value.len()
            ))
        }
        Mode::Der.decode(value.into_bytes(), |cons| {
            cons.take_sequence(Self::take_elements)
        }).map(|elements| ElementSeq { elements })
        .map_err(StructuralError::decoding)
    }

    /// Takes all remaining values of a constructed value as elements.
    ///
    /// The loop only ends if `cons` has a definite end, so this must never
    /// be called for the top level of a decode.
    fn take_elements<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Vec<Element>, DecodeError<S::Error>> {
        let mut res = Vec::new();
        loop {
            let mut header = None;
            let encoded = cons.capture(|cons| {
                header = cons.take_opt_value(|tag, content| {
                    let constructed = content.is_constructed();
                    match *content {
                        decode::Content::Primitive(ref mut prim) => {
                            prim.skip_all()?
                        }
                        decode::Content::Constructed(ref mut inner) => {
                            inner.skip_all()?
                        }
                    }
                    Ok((tag, constructed))
                })?;
                Ok(())
            })?;
            match header {
                Some((tag, constructed)) => {
                    res.push(Element {
                        tag, constructed, encoded: encoded.into_bytes()
                    })
                }
                None => return Ok(res)
            }
        }
    }
}

/// # Access to Elements
///
impl ElementSeq {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.iter()
    }

    /// Checks that the number of elements is one of `allowed`.
    ///
    /// Returns the number of elements on success.
    pub fn check_len(
        &self, allowed: &'static [usize]
    ) -> Result<usize, StructuralError> {
        if allowed.contains(&self.len()) {
            Ok(self.len())
        }
        else {
            Err(StructuralError::element_count(allowed, self.len()))
        }
    }

    /// Returns the element at `pos` if it is of the given kind.
    pub fn element(
        &self, pos: usize, kind: ElementKind
    ) -> Result<&Element, StructuralError> {
        let element = self.elements.get(pos).ok_or_else(|| {
            StructuralError::missing_element(pos)
        })?;
        if element.tag != kind.tag()
            || element.constructed != kind.is_constructed()
        {
            return Err(StructuralError::unexpected_element(
                pos, kind, element.tag, element.constructed
            ))
        }
        Ok(element)
    }

    /// Decodes the element at `pos` of the given kind with `op`.
    fn decode_element<F, T>(
        &self, pos: usize, kind: ElementKind, op: F
    ) -> Result<T, StructuralError>
    where
        F: FnOnce(
            &mut decode::Constructed<BytesSource>
        ) -> Result<T, DecodeError<Infallible>>
    {
        let element = self.element(pos, kind)?;
        Mode::Der.decode(element.encoded.clone(), op).map_err(|err| {
            StructuralError::bad_encoding(pos, kind, err)
        })
    }

    /// Returns the INTEGER at `pos`.
    pub fn integer(&self, pos: usize) -> Result<Integer, StructuralError> {
        self.decode_element(pos, ElementKind::Integer, Integer::take_from)
    }

    /// Returns the BIT STRING at `pos`.
    ///
    /// Unused bits in the last octet must be zero.
    pub fn bit_string(
        &self, pos: usize
    ) -> Result<BitString, StructuralError> {
        self.decode_element(pos, ElementKind::BitString, BitString::take_from)
    }

    /// Returns the content of the OCTET STRING at `pos`.
    pub fn octet_string(&self, pos: usize) -> Result<Bytes, StructuralError> {
        self.decode_element(pos, ElementKind::OctetString, |cons| {
            cons.take_primitive_if(Tag::OCTET_STRING, |prim| prim.take_all())
        })
    }

    pub fn oid(&self, pos: usize) -> Result<Oid<Bytes>, StructuralError> {
        self.decode_element(pos, ElementKind::Oid, Oid::take_from)
    }

    /// Returns the content of the IA5String at `pos` as a string.
    ///
    /// Returns `Ok(None)` if the string contains octets outside the IA5
    /// character set, i.e., is not ASCII.
    pub fn ia5_string(
        &self, pos: usize
    ) -> Result<Option<String>, StructuralError> {
        let octets = self.decode_element(pos, ElementKind::Ia5String, |cons| {
            cons.take_value_if(Tag::IA5_STRING, OctetString::from_content)
        })?;
        Ok(Ia5String::new(octets).ok().map(|s| s.to_string()))
    }

    /// Returns the raw content of the GeneralizedTime at `pos`.
    ///
    /// Interpreting the time is left to the caller so that a malformed
    /// time can be reported separately from a structural error.
    pub fn generalized_time(
        &self, pos: usize
    ) -> Result<Bytes, StructuralError> {
        self.decode_element(pos, ElementKind::GeneralizedTime, |cons| {
            cons.take_primitive_if(Tag::GENERALIZED_TIME, |prim| {
                prim.take_all()
            })
        })
    }

    /// Decodes and returns the elements of the SEQUENCE at `pos`.
    pub fn sequence(&self, pos: usize) -> Result<Self, StructuralError> {
        self.decode_element(pos, ElementKind::Sequence, |cons| {
            cons.take_sequence(Self::take_elements)
        }).map(|elements| ElementSeq { elements })
    }

    /// Decodes the elements of the explicitly tagged value at `pos`.
    pub fn explicit0(&self, pos: usize) -> Result<Self, StructuralError> {
        self.decode_element(pos, ElementKind::Explicit0, |cons| {
            cons.take_constructed_if(Tag::CTX_0, Self::take_elements)
        }).map(|elements| ElementSeq { elements })
    }
}


//============ Tests =========================================================
