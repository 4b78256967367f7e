/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Typed access to single DER encoded values.
//!
//! Every value carries the OID it was found under, so that errors raised while decoding
//! attacker supplied extensions name the offending entry.

use std::fmt;

use pkix::types::ObjectIdentifier;
use yasna::tags::*;
use yasna::{ASN1Error, Tag, TagClass};

use crate::oid::to_dotted;
use crate::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Asn1Type {
    Boolean,
    Integer,
    BitString,
    OctetString,
    Oid,
    Enumerated,
    Utf8String,
    Sequence,
    Set,
    NumericString,
    PrintableString,
    Ia5String,
    UtcTime,
    GeneralizedTime,
    Other(Tag),
}

impl From<Tag> for Asn1Type {
    fn from(tag: Tag) -> Asn1Type {
        match tag {
            TAG_BOOLEAN => Asn1Type::Boolean,
            TAG_INTEGER => Asn1Type::Integer,
            TAG_BITSTRING => Asn1Type::BitString,
            TAG_OCTETSTRING => Asn1Type::OctetString,
            TAG_OID => Asn1Type::Oid,
            TAG_ENUM => Asn1Type::Enumerated,
            TAG_UTF8STRING => Asn1Type::Utf8String,
            TAG_SEQUENCE => Asn1Type::Sequence,
            TAG_SET => Asn1Type::Set,
            TAG_NUMERICSTRING => Asn1Type::NumericString,
            TAG_PRINTABLESTRING => Asn1Type::PrintableString,
            TAG_IA5STRING => Asn1Type::Ia5String,
            TAG_UTCTIME => Asn1Type::UtcTime,
            TAG_GENERALIZEDTIME => Asn1Type::GeneralizedTime,
            other => Asn1Type::Other(other),
        }
    }
}

impl fmt::Display for Asn1Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Asn1Type::Boolean => "BOOLEAN",
            Asn1Type::Integer => "INTEGER",
            Asn1Type::BitString => "BIT STRING",
            Asn1Type::OctetString => "OCTET STRING",
            Asn1Type::Oid => "OBJECT",
            Asn1Type::Enumerated => "ENUMERATED",
            Asn1Type::Utf8String => "UTF8STRING",
            Asn1Type::Sequence => "SEQUENCE",
            Asn1Type::Set => "SET",
            Asn1Type::NumericString => "NUMERICSTRING",
            Asn1Type::PrintableString => "PRINTABLESTRING",
            Asn1Type::Ia5String => "IA5STRING",
            Asn1Type::UtcTime => "UTCTIME",
            Asn1Type::GeneralizedTime => "GENERALIZEDTIME",
            Asn1Type::Other(tag) => {
                let class = match tag.tag_class {
                    TagClass::Universal => "UNIVERSAL",
                    TagClass::Application => "APPLICATION",
                    TagClass::ContextSpecific => "CONTEXT",
                    TagClass::Private => "PRIVATE",
                };
                return write!(f, "{} {}", class, tag.tag_number);
            }
        };
        f.write_str(name)
    }
}

/// A single DER value found under `oid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asn1Value {
    oid: String,
    ty: Asn1Type,
    der: Vec<u8>,
    content_len: usize,
}

impl Asn1Value {
    /// Wraps the complete DER encoding (tag, length and content) of one value.
    pub fn from_der<S: Into<String>>(oid: S, der: Vec<u8>) -> Result<Asn1Value, Error> {
        let oid = oid.into();
        let tagged = yasna::parse_der(&der, |r| r.read_tagged_der())
            .map_err(|e| Error::format(format!("OID [{}] could not be decoded as ASN.1: {}", oid, e)))?;
        let ty = Asn1Type::from(tagged.tag());
        let content_len = tagged.value().len();
        Ok(Asn1Value { oid, ty, der, content_len })
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn asn1_type(&self) -> Asn1Type {
        self.ty
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn expect_type(&self, expected: Asn1Type) -> Result<(), Error> {
        if self.ty != expected {
            return Err(Error::format(format!(
                "OID [{}] expected ASN.1 type [{}] given [{}]", self.oid, expected, self.ty
            )));
        }
        Ok(())
    }

    /// Like [`Asn1Value::expect_type`], additionally checking the length of the content octets.
    pub fn expect_type_and_length(&self, expected: Asn1Type, length: usize) -> Result<(), Error> {
        self.expect_type(expected)?;
        if self.content_len != length {
            return Err(Error::format(format!(
                "OID [{}] expected length [{}] given [{}]", self.oid, length, self.content_len
            )));
        }
        Ok(())
    }

    fn decode<T, F>(&self, expected: Asn1Type, f: F) -> Result<T, Error>
        where F: for<'a, 'b> FnOnce(yasna::BERReader<'a, 'b>) -> Result<T, ASN1Error>
    {
        self.expect_type(expected)?;
        yasna::parse_der(&self.der, f)
            .map_err(|e| Error::format(format!("OID [{}] could not be decoded as [{}]: {}", self.oid, expected, e)))
    }

    /// Content of an OCTET STRING.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.decode(Asn1Type::OctetString, |r| r.read_bytes())
    }

    /// OCTET STRING of exactly `N` bytes.
    pub fn to_fixed_bytes<const N: usize>(&self) -> Result<[u8; N], Error> {
        self.expect_type_and_length(Asn1Type::OctetString, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.to_bytes()?);
        Ok(out)
    }

    pub fn to_u8(&self) -> Result<u8, Error> {
        self.decode(Asn1Type::Integer, |r| r.read_u8())
    }

    pub fn to_u16(&self) -> Result<u16, Error> {
        self.decode(Asn1Type::Integer, |r| r.read_u16())
    }

    pub fn to_u32(&self) -> Result<u32, Error> {
        self.decode(Asn1Type::Integer, |r| r.read_u32())
    }

    pub fn to_enum(&self) -> Result<i64, Error> {
        self.decode(Asn1Type::Enumerated, |r| r.read_enum())
    }

    pub fn to_bool(&self) -> Result<bool, Error> {
        self.decode(Asn1Type::Boolean, |r| r.read_bool())
    }

    /// Elements of a SEQUENCE, each attributed to the OID of the sequence itself.
    pub fn to_sequence(&self) -> Result<Vec<Asn1Value>, Error> {
        let elements = self.decode(Asn1Type::Sequence, |r| {
            r.read_sequence(|r| {
                let mut elements = Vec::new();
                loop {
                    match r.read_optional(|r| r.read_der())? {
                        Some(der) => elements.push(der),
                        None => break,
                    }
                }
                Ok(elements)
            })
        })?;
        elements.into_iter()
            .map(|der| Asn1Value::from_der(self.oid.clone(), der))
            .collect()
    }

    /// Decodes a `SEQUENCE { OBJECT IDENTIFIER, value }` pair, returning the OID and the value
    /// attributed to that OID.
    pub fn to_oid_tuple(&self) -> Result<(ObjectIdentifier, Asn1Value), Error> {
        let mut elements = self.to_sequence()?;
        if elements.len() != 2 {
            return Err(Error::invalid_extension(format!(
                "OID tuple [{}] expected number of elements is [2] given [{}]", self.oid, elements.len()
            )));
        }
        let value = elements.pop().ok_or_else(|| Error::format("Empty OID tuple"))?;
        let oid = elements.pop().ok_or_else(|| Error::format("Empty OID tuple"))?
            .decode(Asn1Type::Oid, |r| r.read_oid())?;
        let dotted = to_dotted(&oid);
        Ok((oid, Asn1Value { oid: dotted, ..value }))
    }
}
