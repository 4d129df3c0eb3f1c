//! Route Origin Authorizations.
//!
//! For details, see RFC 6482.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use bytes::Bytes;
use log::{debug, warn};
use crate::oid;
use super::elements::ElementSeq;
use super::error::{ParseError, SemanticError, TransportError};
use super::sigobj::{check_version, CmsUnwrap, EeCert, KeyIds};
use super::wire::{Composer, Parser};
use super::x509::Time;


//------------ Roa -----------------------------------------------------------

/// A parsed route origin authorization.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RoaFields")
)]
pub struct Roa {
    /// The path the ROA was read from.
    source_path: String,

    /// The AS number that is authorized to originate the prefixes.
    as_id: u32,

    /// The prefixes in the order they appear in the ROA.
    addresses: Vec<RoaIpAddress>,

    /// The subject key identifier of the EE certificate.
    ski: String,

    /// The authority key identifier of the EE certificate.
    aki: String,

    /// The CA issuers URI of the EE certificate.
    aia: Option<String>,

    /// The notAfter time of the EE certificate.
    expires: Time,
}

impl Roa {
    /// Parses and validates a ROA.
    pub fn parse<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C,
    ) -> Result<Self, ParseError> {
        Self::parse_with_cert(data, source_path, cms).map(|res| res.1)
    }

    /// Parses a ROA and also returns its EE certificate.
    pub fn parse_with_cert<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C,
    ) -> Result<(C::Cert, Self), ParseError> {
        match Self::parse_inner(data, source_path, cms) {
            Ok(res) => {
                debug!(
                    "{}: ROA for AS{} with {} prefixes",
                    source_path, res.1.as_id, res.1.addresses.len()
                );
                Ok(res)
            }
            Err(err) => {
                warn!("{}: {}", source_path, err);
                Err(err)
            }
        }
    }

    fn parse_inner<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C,
    ) -> Result<(C::Cert, Self), ParseError> {
        let (cert, content) = cms.unwrap_content(
            data, &oid::ROUTE_ORIGIN_AUTHZ
        ).map_err(|err| ParseError::Cms(err.to_string()))?.into_parts();
        let ids = KeyIds::from_cert(&cert).map_err(
            ParseError::MissingExtension
        )?;
        let content = RoaContent::decode(content)?;
        let expires = cert.not_after();
        Ok((cert, Roa {
            source_path: source_path.into(),
            as_id: content.as_id,
            addresses: content.addresses,
            ski: ids.ski,
            aki: ids.aki,
            aia: ids.aia,
            expires,
        }))
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn as_id(&self) -> u32 {
        self.as_id
    }

    pub fn addresses(&self) -> &[RoaIpAddress] {
        &self.addresses
    }

    pub fn subject_key_id(&self) -> &str {
        &self.ski
    }

    pub fn authority_key_id(&self) -> &str {
        &self.aki
    }

    pub fn authority_info_access(&self) -> Option<&str> {
        self.aia.as_deref()
    }

    /// Returns when the ROA’s EE certificate expires.
    pub fn expires(&self) -> Time {
        self.expires
    }
}

/// # Transfer Encoding
///
/// ```txt
/// source_path             string
/// as_id                   u32
/// expires                 i64, seconds since the epoch
/// ip_count                u64
/// addresses               ip_count times:
///     afi                 u16
///     prefix_len          u8
///     max_length          u8
///     addr                16 octets, IPv4 in the first four
/// authority_info_access   string, empty if absent
/// authority_key_id        string
/// subject_key_id          string
/// ```
impl Roa {
    /// The encoded length of a single address.
    const WIRE_ADDR_LEN: usize = 2 + 1 + 1 + 16;

    pub fn encode_wire(&self) -> Bytes {
        let mut target = Composer::new();
        target.put_str(&self.source_path);
        target.put_u32(self.as_id);
        target.put_time(self.expires);
        target.put_len(self.addresses.len());
        for addr in &self.addresses {
            target.put_u16(addr.family.afi());
            target.put_u8(addr.prefix_len);
            target.put_u8(addr.max_length);
            target.put_fixed(&addr.octets());
        }
        target.put_opt_str(self.aia.as_deref());
        target.put_str(&self.aki);
        target.put_str(&self.ski);
        target.finish()
    }

    /// Decodes a ROA from its transfer encoding.
    ///
    /// Every address is checked again the same way as when parsing.
    pub fn decode_wire(data: Bytes) -> Result<Self, TransportError> {
        let mut parser = Parser::new(data);
        let source_path = parser.get_string()?;
        let as_id = parser.get_u32()?;
        let expires = parser.get_time()?;
        let count = parser.get_count(Self::WIRE_ADDR_LEN)?;
        let mut addresses = Vec::with_capacity(count);
        for _ in 0..count {
            let family = AddressFamily::from_afi(parser.get_u16()?).ok_or(
                TransportError::bad_value("invalid address family")
            )?;
            let prefix_len = parser.get_u8()?;
            let max_length = parser.get_u8()?;
            let octets: [u8; 16] = parser.get_array()?;
            let addr = RoaIpAddress::from_octets(
                family, octets, prefix_len, Some(max_length)
            ).map_err(|_| TransportError::bad_value("invalid ROA prefix"))?;
            addresses.push(addr);
        }
        let aia = parser.get_opt_string()?;
        let aki = parser.get_string()?;
        let ski = parser.get_string()?;
        parser.finish()?;
        let res = Roa {
            source_path, as_id, addresses, ski, aki, aia, expires
        };
        res.check()?;
        Ok(res)
    }

    /// Checks the invariants of a ROA not created by parsing.
    fn check(&self) -> Result<(), TransportError> {
        for addr in &self.addresses {
            let checked = RoaIpAddress::new(
                addr.addr, addr.prefix_len, Some(addr.max_length)
            ).map_err(|_| TransportError::bad_value("invalid ROA prefix"))?;
            if checked != *addr {
                return Err(TransportError::bad_value("invalid ROA prefix"))
            }
        }
        if self.aki.is_empty() || self.ski.is_empty() {
            return Err(TransportError::bad_value("missing key identifier"))
        }
        if self.aia.as_deref() == Some("") {
            return Err(TransportError::bad_value("empty CA issuers URI"))
        }
        Ok(())
    }
}


//------------ RoaFields -----------------------------------------------------

/// The unchecked fields of a deserialized ROA.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RoaFields {
    source_path: String,
    as_id: u32,
    addresses: Vec<RoaIpAddress>,
    ski: String,
    aki: String,
    aia: Option<String>,
    expires: Time,
}

#[cfg(feature = "serde")]
impl TryFrom<RoaFields> for Roa {
    type Error = TransportError;

    fn try_from(fields: RoaFields) -> Result<Self, Self::Error> {
        let res = Roa {
            source_path: fields.source_path,
            as_id: fields.as_id,
            addresses: fields.addresses,
            ski: fields.ski,
            aki: fields.aki,
            aia: fields.aia,
            expires: fields.expires,
        };
        res.check()?;
        Ok(res)
    }
}


//------------ RoaContent ----------------------------------------------------

/// The decoded content of a ROA.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoaContent {
    as_id: u32,
    addresses: Vec<RoaIpAddress>,
}

impl RoaContent {
    /// Decodes the ROA content.
    ///
    /// ```txt
    /// RouteOriginAttestation ::= SEQUENCE {
    ///     version [0] INTEGER DEFAULT 0,
    ///     asID  ASID,
    ///     ipAddrBlocks SEQUENCE (SIZE(1..MAX)) OF ROAIPAddressFamily }
    ///
    /// ROAIPAddressFamily ::= SEQUENCE {
    ///     addressFamily OCTET STRING (SIZE (2..3)),
    ///     addresses SEQUENCE (SIZE (1..MAX)) OF ROAIPAddress }
    /// ```
    ///
    /// Only the two octet form of the address family is allowed and each
    /// family may appear only once.
    pub fn decode(content: Bytes) -> Result<Self, ParseError> {
        let seq = ElementSeq::decode(content).map_err(|err| {
            err.context("RouteOriginAttestation")
        })?;
        let mut pos = 0;
        let len = seq.check_len(&[2, 3]).map_err(|err| {
            err.context("RouteOriginAttestation")
        })?;
        if len == 3 {
            check_version(&seq, pos)?;
            pos += 1;
        }

        let as_id = u32::try_from(seq.integer(pos).map_err(|err| {
            err.context("asID")
        })?).map_err(|_| SemanticError::AsIdOutOfRange)?;

        let blocks = seq.sequence(pos + 1).map_err(|err| {
            err.context("ipAddrBlocks")
        })?;
        if blocks.is_empty() {
            return Err(SemanticError::EmptyAddressBlocks.into())
        }
        let mut addresses = Vec::new();
        let mut seen = Vec::with_capacity(2);
        for idx in 0..blocks.len() {
            let family = blocks.sequence(idx).map_err(|err| {
                err.context("ipAddrBlocks")
            })?;
            family.check_len(&[2]).map_err(|err| {
                err.context("ROAIPAddressFamily")
            })?;
            let afi = family.octet_string(0).map_err(|err| {
                err.context("addressFamily")
            })?;
            let afi = AddressFamily::from_octets(&afi).ok_or(
                SemanticError::BadAddressFamily
            )?;
            if seen.contains(&afi) {
                return Err(SemanticError::DuplicateAddressFamily.into())
            }
            seen.push(afi);

            let list = family.sequence(1).map_err(|err| {
                err.context("addresses")
            })?;
            if list.is_empty() {
                return Err(SemanticError::EmptyAddressBlocks.into())
            }
            for idx in 0..list.len() {
                addresses.push(RoaIpAddress::parse(
                    &list.sequence(idx).map_err(|err| {
                        err.context("addresses")
                    })?,
                    afi
                )?);
            }
        }
        Ok(RoaContent { as_id, addresses })
    }

    pub fn as_id(&self) -> u32 {
        self.as_id
    }

    pub fn addresses(&self) -> &[RoaIpAddress] {
        &self.addresses
    }
}


//------------ AddressFamily -------------------------------------------------

/// The address family of a ROA prefix.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Returns the family for an address family identifier.
    pub fn from_afi(afi: u16) -> Option<Self> {
        match afi {
            1 => Some(AddressFamily::Ipv4),
            2 => Some(AddressFamily::Ipv6),
            _ => None
        }
    }

    /// Returns the family for the content of an addressFamily field.
    fn from_octets(octets: &[u8]) -> Option<Self> {
        match *octets {
            [high, low] => Self::from_afi(u16::from_be_bytes([high, low])),
            _ => None
        }
    }

    /// Returns the address family identifier.
    pub fn afi(self) -> u16 {
        match self {
            AddressFamily::Ipv4 => 1,
            AddressFamily::Ipv6 => 2,
        }
    }

    /// Returns the maximum prefix length for the family.
    pub fn max_addr_len(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}


//------------ RoaIpAddress --------------------------------------------------

/// A single prefix of a ROA.
///
/// The max length is always present. If the ROA doesn’t give one, it is
/// the prefix length.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoaIpAddress {
    family: AddressFamily,
    addr: IpAddr,
    prefix_len: u8,
    max_length: u8,
}

impl RoaIpAddress {
    /// Creates a prefix from an address and its lengths.
    ///
    /// Bits of the address beyond the prefix length must be zero.
    pub fn new(
        addr: IpAddr, prefix_len: u8, max_length: Option<u8>
    ) -> Result<Self, SemanticError> {
        match addr {
            IpAddr::V4(addr) => {
                let mut octets = [0u8; 16];
                octets[..4].copy_from_slice(&addr.octets());
                Self::from_octets(
                    AddressFamily::Ipv4, octets, prefix_len, max_length
                )
            }
            IpAddr::V6(addr) => {
                Self::from_octets(
                    AddressFamily::Ipv6, addr.octets(), prefix_len,
                    max_length
                )
            }
        }
    }

    fn from_octets(
        family: AddressFamily,
        octets: [u8; 16],
        prefix_len: u8,
        max_length: Option<u8>,
    ) -> Result<Self, SemanticError> {
        if prefix_len > family.max_addr_len() {
            return Err(SemanticError::BadPrefixLength(prefix_len.into()))
        }
        let max_length = max_length.unwrap_or(prefix_len);
        if max_length < prefix_len || max_length > family.max_addr_len() {
            return Err(SemanticError::BadMaxLength {
                prefix_len, max_length: Some(max_length.into())
            })
        }
        if !host_bits_clear(&octets, prefix_len) {
            return Err(SemanticError::BadPrefixLength(prefix_len.into()))
        }
        let addr = match family {
            AddressFamily::Ipv4 => {
                let mut v4 = [0u8; 4];
                v4.copy_from_slice(&octets[..4]);
                IpAddr::V4(Ipv4Addr::from(v4))
            }
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::from(octets)),
        };
        Ok(RoaIpAddress { family, addr, prefix_len, max_length })
    }

    /// Parses a ROAIPAddress.
    ///
    /// ```txt
    /// ROAIPAddress ::= SEQUENCE {
    ///    address       IPAddress,
    ///    maxLength     INTEGER OPTIONAL }
    ///
    /// IPAddress    ::= BIT STRING
    /// ```
    ///
    /// The address is the same as in section 2.1.1 of RFC 3779, that is, it
    /// is a bit string with all the bits of the prefix.
    fn parse(
        seq: &ElementSeq, family: AddressFamily
    ) -> Result<Self, ParseError> {
        seq.check_len(&[1, 2]).map_err(|err| err.context("ROAIPAddress"))?;
        let bits = seq.bit_string(0).map_err(|err| err.context("address"))?;
        if bits.bit_len() > usize::from(family.max_addr_len()) {
            return Err(SemanticError::BadPrefixLength(bits.bit_len()).into())
        }
        // The bound above limits the length to 128 bits, i.e., 16 octets.
        let prefix_len = bits.bit_len() as u8;
        let bytes = bits.octet_bytes();
        let mut octets = [0u8; 16];
        octets[..bytes.len()].copy_from_slice(&bytes);

        let max_length = if seq.len() == 2 {
            let max = seq.integer(1).map_err(|err| {
                err.context("maxLength")
            })?;
            let max = u32::try_from(&max).ok();
            match max.and_then(|max| u8::try_from(max).ok()) {
                Some(max) => Some(max),
                None => {
                    return Err(SemanticError::BadMaxLength {
                        prefix_len, max_length: max
                    }.into())
                }
            }
        }
        else {
            None
        };
        Ok(Self::from_octets(family, octets, prefix_len, max_length)?)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn address(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn max_length(&self) -> u8 {
        self.max_length
    }

    /// Returns the address in 16 octets, IPv4 left aligned.
    fn octets(&self) -> [u8; 16] {
        match self.addr {
            IpAddr::V4(addr) => {
                let mut res = [0u8; 16];
                res[..4].copy_from_slice(&addr.octets());
                res
            }
            IpAddr::V6(addr) => addr.octets()
        }
    }
}

impl fmt::Display for RoaIpAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// Returns whether all bits after the first `prefix_len` are zero.
fn host_bits_clear(octets: &[u8; 16], prefix_len: u8) -> bool {
    let prefix_len = usize::from(prefix_len);
    octets.iter().enumerate().all(|(idx, &octet)| {
        let start = idx * 8;
        if start + 8 <= prefix_len {
            true
        }
        else if start >= prefix_len {
            octet == 0
        }
        else {
            octet & (0xFFu8 >> (prefix_len - start)) == 0
        }
    })
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::convert::Infallible;
    use bcder::{encode, BitString, Captured, Mode, OctetString, Tag};
    use bcder::encode::{PrimitiveContent, Values};
    use crate::repository::sigobj::SignedContent;
    use super::*;

    struct TestCert;

    impl EeCert for TestCert {
        fn subject_key_id(&self) -> Option<String> {
            Some("0102".into())
        }

        fn authority_key_id(&self) -> Option<String> {
            Some("0304".into())
        }

        fn authority_info_access(&self) -> Option<String> {
            None
        }

        fn not_after(&self) -> Time {
            Time::utc(2030, 1, 1, 0, 0, 0).unwrap()
        }
    }

    struct PassThrough;

    impl CmsUnwrap for PassThrough {
        type Cert = TestCert;
        type Error = Infallible;

        fn unwrap_content(
            &self, data: &[u8], _content_type: &bcder::ConstOid,
        ) -> Result<SignedContent<TestCert>, Infallible> {
            Ok(SignedContent::new(TestCert, Bytes::copy_from_slice(data)))
        }
    }

    fn der(values: impl encode::Values) -> Bytes {
        values.to_captured(Mode::Der).into_bytes()
    }

    fn addr(bits: &'static [u8], unused: u8, max: Option<u8>) -> Captured {
        encode::sequence((
            BitString::encode_slice(bits, unused),
            max.map(|max| max.encode()),
        )).to_captured(Mode::Der)
    }

    fn family(afi: &'static [u8], addrs: Vec<Captured>) -> Captured {
        encode::sequence((
            OctetString::encode_slice(afi),
            encode::sequence(addrs),
        )).to_captured(Mode::Der)
    }

    fn roa(as_id: u32, families: Vec<Captured>) -> Bytes {
        der(encode::sequence((
            as_id.encode(),
            encode::sequence(families),
        )))
    }

    fn sample() -> Bytes {
        roa(64496, vec![
            family(b"\x00\x01", vec![
                addr(b"\xc0\x00\x02", 0, None),
                addr(b"\xc6\x33\x64\x80", 7, Some(28)),
            ]),
            family(b"\x00\x02", vec![
                addr(b"\x20\x01\x0d\xb8", 0, Some(48)),
            ]),
        ])
    }

    #[test]
    fn parse_roa() {
        let roa = Roa::parse(&sample(), "ca/test.roa", &PassThrough).unwrap();
        assert_eq!(roa.as_id(), 64496);
        assert_eq!(roa.addresses().len(), 3);
        assert_eq!(roa.addresses()[0].to_string(), "192.0.2.0/24");
        assert_eq!(roa.addresses()[0].max_length(), 24);
        assert_eq!(roa.addresses()[1].to_string(), "198.51.100.128/25");
        assert_eq!(roa.addresses()[1].max_length(), 28);
        assert_eq!(roa.addresses()[2].to_string(), "2001:db8::/32");
        assert_eq!(roa.addresses()[2].family(), AddressFamily::Ipv6);
        assert_eq!(roa.subject_key_id(), "0102");
        assert_eq!(roa.authority_info_access(), None);
        assert_eq!(roa.expires(), Time::utc(2030, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn reject_bad_families() {
        let v4 = || vec![addr(b"\xc0\x00\x02", 0, None)];
        assert!(matches!(
            RoaContent::decode(roa(1, vec![
                family(b"\x00\x01", v4()), family(b"\x00\x01", v4()),
            ])),
            Err(ParseError::Semantic(SemanticError::DuplicateAddressFamily))
        ));
        assert!(matches!(
            RoaContent::decode(roa(1, vec![family(b"\x00\x03", v4())])),
            Err(ParseError::Semantic(SemanticError::BadAddressFamily))
        ));
        assert!(matches!(
            RoaContent::decode(roa(1, vec![family(b"\x00\x01\x01", v4())])),
            Err(ParseError::Semantic(SemanticError::BadAddressFamily))
        ));
        assert!(matches!(
            RoaContent::decode(roa(1, vec![family(b"\x00\x01", vec![])])),
            Err(ParseError::Semantic(SemanticError::EmptyAddressBlocks))
        ));
        assert!(matches!(
            RoaContent::decode(roa(1, vec![])),
            Err(ParseError::Semantic(SemanticError::EmptyAddressBlocks))
        ));
    }

    #[test]
    fn reject_bad_prefixes() {
        let decode = |item| RoaContent::decode(
            roa(1, vec![family(b"\x00\x01", vec![item])])
        );
        assert!(matches!(
            decode(addr(b"\xc0\x00\x02\x00\x00", 0, None)),
            Err(ParseError::Semantic(SemanticError::BadPrefixLength(40)))
        ));
        assert!(matches!(
            decode(addr(b"\xc0\x00\x02", 0, Some(23))),
            Err(ParseError::Semantic(SemanticError::BadMaxLength { .. }))
        ));
        assert!(matches!(
            decode(addr(b"\xc0\x00\x02", 0, Some(33))),
            Err(ParseError::Semantic(SemanticError::BadMaxLength { .. }))
        ));
        assert!(matches!(
            decode(addr(b"\xc0\x00\x03", 1, None)),
            Err(ParseError::Structural(_))
        ));
        assert!(decode(addr(b"", 0, None)).is_ok());
    }

    #[test]
    fn reject_trailing_data() {
        let mut data = sample().to_vec();
        data.push(0);
        assert!(matches!(
            RoaContent::decode(data.into()),
            Err(ParseError::Structural(_))
        ));
    }

    #[test]
    fn as_id_range() {
        let data = der(encode::sequence((
            OctetString::encode_slice_as(b"\x01\0\0\0\0", Tag::INTEGER),
            encode::sequence(Captured::empty(Mode::Der)),
        )));
        assert!(matches!(
            RoaContent::decode(data),
            Err(ParseError::Semantic(SemanticError::AsIdOutOfRange))
        ));
    }

    #[test]
    fn explicit_version_rejected() {
        let data = der(encode::sequence((
            encode::sequence_as(Tag::CTX_0, 0u8.encode()),
            1u32.encode(),
            encode::sequence(Captured::empty(Mode::Der)),
        )));
        assert!(matches!(
            RoaContent::decode(data),
            Err(ParseError::Semantic(SemanticError::UnsupportedVersion(0)))
        ));
    }

    #[test]
    fn wire_round_trip() {
        let roa = Roa::parse(&sample(), "ca/test.roa", &PassThrough).unwrap();
        let data = roa.encode_wire();
        assert_eq!(Roa::decode_wire(data.clone()).unwrap(), roa);
        for len in 0..data.len() {
            assert!(Roa::decode_wire(data.slice(..len)).is_err());
        }
    }

    #[test]
    fn host_bits() {
        let octets = |head: &[u8]| {
            let mut res = [0u8; 16];
            res[..head.len()].copy_from_slice(head);
            res
        };
        assert!(host_bits_clear(&octets(b"\xc0\0\x02\0"), 24));
        assert!(!host_bits_clear(&octets(b"\xc0\0\x02\x01"), 24));
        assert!(!host_bits_clear(&octets(b"\xc1"), 7));
        assert!(host_bits_clear(&[0; 16], 0));
        assert!(host_bits_clear(&[0xff; 16], 128));
    }
}
