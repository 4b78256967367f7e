/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::str;

use chrono::{DateTime, TimeZone, Utc};
use pkix::pem::{pem_to_der, PEM_CERTIFICATE};
use pkix::types::ObjectIdentifier;
use yasna::models::TaggedDerValue;
use yasna::tags::*;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, Tag};

use crate::oid::{self, to_dotted};
use crate::{missing_items_message, Error};

/// A decoded X.501 name.
///
/// `raw` holds the RFC2253 rendering (most significant RDN last in the encoding, first in the
/// string). The named components hold the first occurrence of each attribute, or an empty
/// string when the attribute is absent.
#[derive(Debug, Clone, Default)]
pub struct DistinguishedName {
    raw: String,
    common_name: String,
    country_name: String,
    organization_name: String,
    location_name: String,
    state_name: String,
}

/// Ignores `raw`: the order of the RDNs in the encoding is not significant.
impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.common_name == other.common_name
            && self.country_name == other.country_name
            && self.organization_name == other.organization_name
            && self.location_name == other.location_name
            && self.state_name == other.state_name
    }
}

impl Eq for DistinguishedName {}

impl DistinguishedName {
    pub fn new(raw: &str, common_name: &str, country_name: &str, organization_name: &str, location_name: &str, state_name: &str) -> Self {
        DistinguishedName {
            raw: raw.to_owned(),
            common_name: common_name.to_owned(),
            country_name: country_name.to_owned(),
            organization_name: organization_name.to_owned(),
            location_name: location_name.to_owned(),
            state_name: state_name.to_owned(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    pub fn location_name(&self) -> &str {
        &self.location_name
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    fn field_mut(&mut self, attribute: &ObjectIdentifier) -> Option<&mut String> {
        if *attribute == *oid::commonName {
            Some(&mut self.common_name)
        } else if *attribute == *oid::countryName {
            Some(&mut self.country_name)
        } else if *attribute == *oid::organizationName {
            Some(&mut self.organization_name)
        } else if *attribute == *oid::localityName {
            Some(&mut self.location_name)
        } else if *attribute == *oid::stateOrProvinceName {
            Some(&mut self.state_name)
        } else {
            None
        }
    }

    fn decode(reader: BERReader) -> ASN1Result<Self> {
        let rdns = reader.read_sequence(|seq_reader| {
            let mut rdns = Vec::<Vec<(ObjectIdentifier, Vec<u8>)>>::new();

            loop {
                let mut rdn = Vec::new();
                let res = seq_reader.read_optional(|r| {
                    r.read_set_of(|r| {
                        let val = r.read_sequence(|r| {
                            let oid = r.next().read_oid()?;
                            let value = r.next().read_der()?;
                            Ok((oid, value))
                        })?;
                        rdn.push(val);
                        Ok(())
                    })
                });
                match res {
                    Ok(Some(())) => rdns.push(rdn),
                    Ok(None) => break,
                    Err(e) => return Err(e),
                }
            }

            Ok(rdns)
        })?;

        let mut name = DistinguishedName::default();
        let mut raw = Vec::with_capacity(rdns.len());
        for rdn in &rdns {
            let mut entries = Vec::with_capacity(rdn.len());
            for (attribute, der) in rdn {
                let value = yasna::parse_der(der, |r| r.read_tagged_der())?;
                let text = attribute_string(&value);
                if let (Some(text), Some(field)) = (&text, name.field_mut(attribute)) {
                    if field.is_empty() {
                        *field = text.clone();
                    }
                }
                let rendered = match text {
                    Some(text) => rfc2253_escape(&text),
                    None => format!("#{}", base16::encode_upper(der)),
                };
                entries.push(format!("{}={}", attribute_short_name(attribute), rendered));
            }
            raw.push(entries.join("+"));
        }
        raw.reverse();
        name.raw = raw.join(",");
        Ok(name)
    }
}

fn attribute_string(value: &TaggedDerValue) -> Option<String> {
    match value.tag() {
        TAG_UTF8STRING | TAG_PRINTABLESTRING | TAG_IA5STRING | TAG_NUMERICSTRING => {
            str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        _ => None,
    }
}

fn attribute_short_name(attribute: &ObjectIdentifier) -> String {
    let known: [(&ObjectIdentifier, &str); 9] = [
        (&*oid::commonName, "CN"),
        (&*oid::countryName, "C"),
        (&*oid::localityName, "L"),
        (&*oid::stateOrProvinceName, "ST"),
        (&*oid::streetAddress, "street"),
        (&*oid::organizationName, "O"),
        (&*oid::organizationalUnitName, "OU"),
        (&*oid::domainComponent, "DC"),
        (&*oid::userId, "UID"),
    ];
    known.iter()
        .find(|(known, _)| *known == attribute)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| to_dotted(attribute))
}

fn rfc2253_escape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    for (i, &b) in bytes.iter().enumerate() {
        let first = i == 0;
        let last = i + 1 == bytes.len();
        match b {
            b',' | b'+' | b'"' | b'\\' | b'<' | b'>' | b';' => {
                out.push('\\');
                out.push(b as char);
            }
            b'#' if first => out.push_str("\\#"),
            b' ' if first || last => out.push_str("\\ "),
            0x00..=0x1f | 0x7f..=0xff => out.push_str(&format!("\\{:02X}", b)),
            _ => out.push(b as char),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl Validity {
    /// `not_before < not_after` is not enforced.
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(&self) -> &DateTime<Utc> {
        &self.not_before
    }

    pub fn not_after(&self) -> &DateTime<Utc> {
        &self.not_after
    }

    fn decode(reader: BERReader) -> ASN1Result<Self> {
        reader.read_sequence(|r| {
            let not_before = decode_time(r.next())?;
            let not_after = decode_time(r.next())?;
            Ok(Validity { not_before, not_after })
        })
    }
}

/// UTCTime and GeneralizedTime, seconds included and in the "Z" time zone as RFC5280 demands.
fn decode_time(reader: BERReader) -> ASN1Result<DateTime<Utc>> {
    let invalid = || ASN1Error::new(ASN1ErrorKind::Invalid);
    let tv = reader.read_tagged_der()?;
    let value = tv.value();
    let (year, rest) = match tv.tag() {
        TAG_UTCTIME if value.len() == 13 => {
            let year = decimal(&value[..2]).ok_or_else(invalid)? as i32;
            (if year < 50 { 2000 + year } else { 1900 + year }, &value[2..])
        }
        TAG_GENERALIZEDTIME if value.len() == 15 => {
            (decimal(&value[..4]).ok_or_else(invalid)? as i32, &value[4..])
        }
        _ => return Err(invalid()),
    };
    if rest[10..] != *b"Z" {
        return Err(invalid());
    }
    let mut fields = rest[..10].chunks(2).map(decimal);
    let mut next = || fields.next().and_then(|v| v).ok_or_else(invalid);
    let (month, day, hour, minute, second) = (next()?, next()?, next()?, next()?, next()?);
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(invalid)
}

fn decimal(digits: &[u8]) -> Option<u32> {
    if digits.iter().all(u8::is_ascii_digit) {
        str::from_utf8(digits).ok()?.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    oid: ObjectIdentifier,
    nid: i32,
    name: String,
    value: Vec<u8>,
    critical: bool,
}

impl Extension {
    pub fn new(oid: ObjectIdentifier, value: Vec<u8>, critical: bool) -> Self {
        let nid = oid::extension_nid(&oid);
        let name = match oid::nid_name(nid) {
            Some(name) => name.to_owned(),
            None => to_dotted(&oid),
        };
        Extension { oid, nid, name, value, critical }
    }

    pub fn oid(&self) -> &ObjectIdentifier {
        &self.oid
    }

    /// Numeric id of well known extensions, [`oid::NID_UNDEF`] for vendor specific ones.
    pub fn nid(&self) -> i32 {
        self.nid
    }

    /// Long name of well known extensions, the dotted OID otherwise.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// DER encoded extension value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    fn decode(reader: BERReader) -> ASN1Result<Self> {
        reader.read_sequence(|r| {
            let oid = r.next().read_oid()?;
            let critical = r.read_optional(|r| r.read_bool())?.unwrap_or(false);
            let value = r.next().read_bytes()?;
            Ok(Extension::new(oid, value, critical))
        })
    }
}

/// ECDSA signature as found in the certificate, plus its integer components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    raw_der: Vec<u8>,
    r: Vec<u8>,
    s: Vec<u8>,
}

impl Signature {
    pub fn from_der(raw_der: Vec<u8>) -> Result<Self, Error> {
        let (r, s) = yasna::parse_der(&raw_der, |reader| {
            reader.read_sequence(|seq| {
                let r = seq.next().read_biguint()?;
                let s = seq.next().read_biguint()?;
                Ok((r.to_bytes_be(), s.to_bytes_be()))
            })
        }).map_err(|e| Error::format(format!("Could not parse ECDSA signature: {}", e)))?;
        Ok(Signature { raw_der, r, s })
    }

    pub fn raw_der(&self) -> &[u8] {
        &self.raw_der
    }

    /// Big endian, without leading zeros.
    pub fn r(&self) -> &[u8] {
        &self.r
    }

    /// Big endian, without leading zeros.
    pub fn s(&self) -> &[u8] {
        &self.s
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    version: u32,
    serial_number: Vec<u8>,
    subject: DistinguishedName,
    issuer: DistinguishedName,
    validity: Validity,
    extensions: Vec<Extension>,
    signature: Signature,
    info: Vec<u8>,
    pub_key: Vec<u8>,
    pem: String,
}

struct TbsCertificate {
    version: u32,
    serial_number: Vec<u8>,
    issuer: DistinguishedName,
    validity: Validity,
    subject: DistinguishedName,
    pub_key: Vec<u8>,
    extensions: Vec<Extension>,
}

impl TbsCertificate {
    fn decode(reader: BERReader) -> ASN1Result<Self> {
        reader.read_sequence(|r| {
            let version = r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_u32()))?.unwrap_or(0);
            let serial_number = r.next().read_biguint()?.to_bytes_be();
            let _signature_algorithm = r.next().read_der()?;
            let issuer = DistinguishedName::decode(r.next())?;
            let validity = Validity::decode(r.next())?;
            let subject = DistinguishedName::decode(r.next())?;
            let pub_key = r.next().read_sequence(|r| {
                let _algorithm = r.next().read_der()?;
                Ok(r.next().read_bitvec()?.to_bytes())
            })?;

            // issuerUniqueID [1], subjectUniqueID [2], extensions [3]
            let mut extensions = Vec::new();
            loop {
                let tv = match r.read_optional(|r| r.read_tagged_der())? {
                    Some(tv) => tv,
                    None => break,
                };
                if tv.tag() == Tag::context(3) {
                    extensions = yasna::parse_der(tv.value(), |r| {
                        r.read_sequence(|r| {
                            let mut extensions = Vec::<Extension>::new();
                            loop {
                                match r.read_optional(|r| Extension::decode(r))? {
                                    Some(ext) => extensions.push(ext),
                                    None => break,
                                }
                            }
                            Ok(extensions)
                        })
                    })?;
                }
            }

            Ok(TbsCertificate {
                version: version.checked_add(1).ok_or_else(|| ASN1Error::new(ASN1ErrorKind::IntegerOverflow))?,
                serial_number,
                issuer,
                validity,
                subject,
                pub_key,
                extensions,
            })
        })
    }
}

impl Certificate {
    /// Parses a PEM encoded certificate and checks it carries the extensions every
    /// certificate of the PCK chain has.
    pub fn parse(pem: &str) -> Result<Certificate, Error> {
        let der = pem_to_der(pem.trim(), Some(PEM_CERTIFICATE))
            .ok_or_else(|| Error::format("Could not parse PEM encoded certificate"))?;
        Certificate::from_der(&der, pem.to_owned())
    }

    pub(crate) fn from_der(der: &[u8], pem: String) -> Result<Certificate, Error> {
        let (info, signature) = yasna::parse_der(der, |r| {
            r.read_sequence(|r| {
                let info = r.next().read_der()?;
                let _signature_algorithm = r.next().read_der()?;
                let signature = r.next().read_bitvec()?.to_bytes();
                Ok((info, signature))
            })
        }).map_err(|e| Error::format(format!("Could not parse X.509 certificate: {}", e)))?;

        let tbs = yasna::parse_der(&info, TbsCertificate::decode)
            .map_err(|e| Error::format(format!("Could not parse X.509 certificate body: {}", e)))?;
        let signature = Signature::from_der(signature)?;

        let cert = Certificate {
            version: tbs.version,
            serial_number: tbs.serial_number,
            subject: tbs.subject,
            issuer: tbs.issuer,
            validity: tbs.validity,
            extensions: tbs.extensions,
            signature,
            info,
            pub_key: tbs.pub_key,
            pem,
        };
        cert.check_required_extensions()?;
        debug!("Parsed certificate [{}] issued by [{}]", cert.subject.raw(), cert.issuer.raw());
        Ok(cert)
    }

    fn check_required_extensions(&self) -> Result<(), Error> {
        let missing = oid::REQUIRED_EXTENSION_NIDS.iter()
            .filter(|nid| !self.extensions.iter().any(|ext| ext.nid == **nid))
            .map(|&nid| oid::nid_name(nid).unwrap_or("UNDEF"))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            let msg = missing_items_message("Required extensions not found.", &missing);
            warn!("Rejecting certificate [{}]: {}", self.subject.raw(), msg);
            return Err(Error::invalid_extension(msg));
        }
        Ok(())
    }

    /// Version as shown to humans, i.e. 3 for X.509v3.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Big endian, without leading zeros.
    pub fn serial_number(&self) -> &[u8] {
        &self.serial_number
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Returns the extension with `oid`, if it is present exactly once.
    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&Extension> {
        let mut iter = self.extensions.iter().filter(|e| e.oid == *oid);

        match (iter.next(), iter.next()) {
            (Some(ext), None) => Some(ext),
            _ => None,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// DER encoding of the TBSCertificate, the bytes covered by the signature.
    pub fn info(&self) -> &[u8] {
        &self.info
    }

    /// Uncompressed EC point: `0x04 || X || Y`.
    pub fn pub_key(&self) -> &[u8] {
        &self.pub_key
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_CA: &str = "-----BEGIN CERTIFICATE-----
MIICjzCCAjSgAwIBAgIUImUM1lqdNInzg7SVUr9QGzknBqwwCgYIKoZIzj0EAwIw
aDEaMBgGA1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENv
cnBvcmF0aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJ
BgNVBAYTAlVTMB4XDTE4MDUyMTEwNDUxMFoXDTQ5MTIzMTIzNTk1OVowaDEaMBgG
A1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENvcnBvcmF0
aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJBgNVBAYT
AlVTMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEC6nEwMDIYZOj/iPWsCzaEKi7
1OiOSLRFhWGjbnBVJfVnkY4u3IjkDYYL0MxO4mqsyYjlBalTVYxFP2sJBK5zlKOB
uzCBuDAfBgNVHSMEGDAWgBQiZQzWWp00ifODtJVSv1AbOScGrDBSBgNVHR8ESzBJ
MEegRaBDhkFodHRwczovL2NlcnRpZmljYXRlcy50cnVzdGVkc2VydmljZXMuaW50
ZWwuY29tL0ludGVsU0dYUm9vdENBLmRlcjAdBgNVHQ4EFgQUImUM1lqdNInzg7SV
Ur9QGzknBqwwDgYDVR0PAQH/BAQDAgEGMBIGA1UdEwEB/wQIMAYBAf8CAQEwCgYI
KoZIzj0EAwIDSQAwRgIhAOW/5QkR+S9CiSDcNoowLuPRLsWGf/Yi7GSX94BgwTwg
AiEA4J0lrHoMs+Xo5o/sX6O9QWxHRAvZUGOdRQ7cvqRXaqI=
-----END CERTIFICATE-----
";

    #[test]
    fn root_ca() {
        let _ = env_logger::try_init();
        let cert = Certificate::parse(ROOT_CA).unwrap();

        assert_eq!(cert.version(), 3);
        assert_eq!(cert.serial_number(), &hex("22650CD65A9D3489F383B49552BF501B392706AC")[..]);
        assert_eq!(cert.subject().raw(), "C=US,ST=CA,L=Santa Clara,O=Intel Corporation,CN=Intel SGX Root CA");
        assert_eq!(cert.subject().common_name(), "Intel SGX Root CA");
        assert_eq!(cert.subject().country_name(), "US");
        assert_eq!(cert.subject().organization_name(), "Intel Corporation");
        assert_eq!(cert.subject().location_name(), "Santa Clara");
        assert_eq!(cert.subject().state_name(), "CA");
        assert_eq!(cert.subject(), cert.issuer());
        assert_eq!(cert.validity().not_before(), &Utc.with_ymd_and_hms(2018, 5, 21, 10, 45, 10).unwrap());
        assert_eq!(cert.validity().not_after(), &Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap());

        let names = cert.extensions().iter().map(Extension::name).collect::<Vec<_>>();
        assert_eq!(names, vec![
            "X509v3 Authority Key Identifier",
            "X509v3 CRL Distribution Points",
            "X509v3 Subject Key Identifier",
            "X509v3 Key Usage",
            "X509v3 Basic Constraints",
        ]);
        assert!(cert.extension(&oid::keyUsage).unwrap().is_critical());
        assert!(!cert.extension(&oid::authorityKeyIdentifier).unwrap().is_critical());
        assert!(cert.extension(&oid::SGX_EXTENSION).is_none());

        assert_eq!(cert.pub_key().len(), 65);
        assert_eq!(cert.pub_key()[0], 0x04);
        assert_eq!(cert.signature().r(), &hex("E5BFE50911F92F428920DC368A302EE3D12EC5867FF622EC6497F78060C13C20")[..]);
        assert_eq!(cert.signature().s(), &hex("E09D25AC7A0CB3E5E8E68FEC5FA3BD416C47440BD950639D450EDCBEA4576AA2")[..]);
        assert_eq!(cert.pem(), ROOT_CA);
        assert_eq!(cert.info()[0], 0x30);

        assert_eq!(Certificate::parse(cert.pem()).unwrap(), cert);
    }

    #[test]
    fn garbage() {
        assert!(Certificate::parse("").unwrap_err().is_format());
        assert!(Certificate::parse("not a certificate").unwrap_err().is_format());
        assert!(Certificate::parse("-----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----").unwrap_err().is_format());
    }

    #[test]
    fn missing_required_extensions() {
        let err = Certificate::parse(include_str!("../tests/data/key_usage_only.pem")).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(
            err.to_string(),
            "Required extensions not found. Missing [X509v3 Authority Key Identifier, X509v3 CRL Distribution Points, \
             X509v3 Subject Key Identifier, X509v3 Basic Constraints]"
        );
    }

    #[test]
    fn distinguished_name_equality_ignores_raw() {
        let a = DistinguishedName::new("CN=a,O=b", "a", "", "b", "", "");
        let b = DistinguishedName::new("O=b,CN=a", "a", "", "b", "", "");
        assert_eq!(a, b);
        assert_ne!(a, DistinguishedName::new("CN=a,O=b", "a", "", "c", "", ""));
    }

    #[test]
    fn rfc2253() {
        assert_eq!(rfc2253_escape("Intel, Inc."), "Intel\\, Inc.");
        assert_eq!(rfc2253_escape("#1 "), "\\#1\\ ");
        assert_eq!(rfc2253_escape("a=b"), "a=b");
        assert_eq!(rfc2253_escape("\u{e9}"), "\\C3\\A9");
    }

    #[test]
    fn times() {
        let utc = |s: &str| yasna::construct_der(|w| w.write_tagged_implicit(TAG_UTCTIME, |w| w.write_bytes(s.as_bytes())));
        let generalized = |s: &str| yasna::construct_der(|w| w.write_tagged_implicit(TAG_GENERALIZEDTIME, |w| w.write_bytes(s.as_bytes())));
        let parse = |der: Vec<u8>| yasna::parse_der(&der, decode_time);

        assert_eq!(parse(utc("180521104510Z")).unwrap(), Utc.with_ymd_and_hms(2018, 5, 21, 10, 45, 10).unwrap());
        assert_eq!(parse(utc("991231235959Z")).unwrap(), Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap());
        assert_eq!(parse(generalized("20491231235959Z")).unwrap(), Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap());
        assert!(parse(utc("1805211045Z")).is_err());
        assert!(parse(utc("180521104510+")).is_err());
        assert!(parse(utc("181321104510Z")).is_err());
        assert!(parse(generalized("2049123123595Z")).is_err());
    }

    fn hex(s: &str) -> Vec<u8> {
        use hex::FromHex;
        Vec::<u8>::from_hex(s).unwrap()
    }
}
