/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Object identifiers understood by the certificate parsers.
//!
//! Ref: <https://api.trustedservices.intel.com/documents/Intel_SGX_PCK_Certificate_CRL_Spec-1.5.pdf>

#![allow(non_upper_case_globals)]

use std::fmt;

use pkix::types::ObjectIdentifier;

lazy_static! {
    // Intel SGX OID namespace
    pub static ref SGX_EXTENSION:                  ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1].into();
    pub static ref SGX_EXTENSION_PPID:             ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 1].into();
    pub static ref SGX_EXTENSION_TCB:              ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 2].into();
    pub static ref SGX_EXTENSION_PCESVN:           ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 2, 17].into();
    pub static ref SGX_EXTENSION_CPUSVN:           ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 2, 18].into();
    pub static ref SGX_EXTENSION_PCEID:            ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 3].into();
    pub static ref SGX_EXTENSION_FMSPC:            ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 4].into();
    pub static ref SGX_EXTENSION_SGX_TYPE:         ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 5].into();
    pub static ref SGX_EXTENSION_PLATFORM_INSTANCE_ID: ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 6].into();
    pub static ref SGX_EXTENSION_CONFIGURATION:    ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 7].into();
    pub static ref SGX_EXTENSION_DYNAMIC_PLATFORM: ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 7, 1].into();
    pub static ref SGX_EXTENSION_CACHED_KEYS:      ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 7, 2].into();
    pub static ref SGX_EXTENSION_SMT_ENABLED:      ObjectIdentifier = vec![1, 2, 840, 113741, 1, 13, 1, 7, 3].into();

    // Certificate extensions: RFC5280, 4.2
    pub static ref subjectKeyIdentifier: ObjectIdentifier = vec![2, 5, 29, 14].into();
    pub static ref keyUsage: ObjectIdentifier = vec![2, 5, 29, 15].into();
    pub static ref subjectAltName: ObjectIdentifier = vec![2, 5, 29, 17].into();
    pub static ref issuerAltName: ObjectIdentifier = vec![2, 5, 29, 18].into();
    pub static ref basicConstraints: ObjectIdentifier = vec![2, 5, 29, 19].into();
    pub static ref cRLDistributionPoints: ObjectIdentifier = vec![2, 5, 29, 31].into();
    pub static ref certificatePolicies: ObjectIdentifier = vec![2, 5, 29, 32].into();
    pub static ref authorityKeyIdentifier: ObjectIdentifier = vec![2, 5, 29, 35].into();
    pub static ref extKeyUsage: ObjectIdentifier = vec![2, 5, 29, 37].into();
    pub static ref authorityInfoAccess: ObjectIdentifier = vec![1, 3, 6, 1, 5, 5, 7, 1, 1].into();

    // Attribute types: RFC4519
    pub static ref commonName: ObjectIdentifier = vec![2, 5, 4, 3].into();
    pub static ref countryName: ObjectIdentifier = vec![2, 5, 4, 6].into();
    pub static ref localityName: ObjectIdentifier = vec![2, 5, 4, 7].into();
    pub static ref stateOrProvinceName: ObjectIdentifier = vec![2, 5, 4, 8].into();
    pub static ref streetAddress: ObjectIdentifier = vec![2, 5, 4, 9].into();
    pub static ref organizationName: ObjectIdentifier = vec![2, 5, 4, 10].into();
    pub static ref organizationalUnitName: ObjectIdentifier = vec![2, 5, 4, 11].into();
    pub static ref domainComponent: ObjectIdentifier = vec![0, 9, 2342, 19200300, 100, 1, 25].into();
    pub static ref userId: ObjectIdentifier = vec![0, 9, 2342, 19200300, 100, 1, 1].into();
}

pub const NID_UNDEF: i32 = 0;
pub const NID_SUBJECT_KEY_IDENTIFIER: i32 = 82;
pub const NID_KEY_USAGE: i32 = 83;
pub const NID_SUBJECT_ALT_NAME: i32 = 85;
pub const NID_ISSUER_ALT_NAME: i32 = 86;
pub const NID_BASIC_CONSTRAINTS: i32 = 87;
pub const NID_CERTIFICATE_POLICIES: i32 = 89;
pub const NID_AUTHORITY_KEY_IDENTIFIER: i32 = 90;
pub const NID_CRL_DISTRIBUTION_POINTS: i32 = 103;
pub const NID_EXT_KEY_USAGE: i32 = 126;
pub const NID_INFO_ACCESS: i32 = 177;

/// Extensions every certificate in the PCK chain has to carry.
pub const REQUIRED_EXTENSION_NIDS: [i32; 5] = [
    NID_AUTHORITY_KEY_IDENTIFIER,
    NID_CRL_DISTRIBUTION_POINTS,
    NID_SUBJECT_KEY_IDENTIFIER,
    NID_KEY_USAGE,
    NID_BASIC_CONSTRAINTS,
];

/// OID components, numeric id and long name of the well known certificate extensions.
const EXTENSION_NIDS: [(&[u64], i32, &str); 10] = [
    (&[2, 5, 29, 14], NID_SUBJECT_KEY_IDENTIFIER, "X509v3 Subject Key Identifier"),
    (&[2, 5, 29, 15], NID_KEY_USAGE, "X509v3 Key Usage"),
    (&[2, 5, 29, 17], NID_SUBJECT_ALT_NAME, "X509v3 Subject Alternative Name"),
    (&[2, 5, 29, 18], NID_ISSUER_ALT_NAME, "X509v3 Issuer Alternative Name"),
    (&[2, 5, 29, 19], NID_BASIC_CONSTRAINTS, "X509v3 Basic Constraints"),
    (&[2, 5, 29, 32], NID_CERTIFICATE_POLICIES, "X509v3 Certificate Policies"),
    (&[2, 5, 29, 35], NID_AUTHORITY_KEY_IDENTIFIER, "X509v3 Authority Key Identifier"),
    (&[2, 5, 29, 31], NID_CRL_DISTRIBUTION_POINTS, "X509v3 CRL Distribution Points"),
    (&[2, 5, 29, 37], NID_EXT_KEY_USAGE, "X509v3 Extended Key Usage"),
    (&[1, 3, 6, 1, 5, 5, 7, 1, 1], NID_INFO_ACCESS, "Authority Information Access"),
];

/// Returns the numeric id of a well known certificate extension, or [`NID_UNDEF`].
pub fn extension_nid(oid: &ObjectIdentifier) -> i32 {
    EXTENSION_NIDS.iter()
        .find(|(known, _, _)| oid.components()[..] == **known)
        .map(|&(_, nid, _)| nid)
        .unwrap_or(NID_UNDEF)
}

/// Human readable name of an extension numeric id.
pub fn nid_name(nid: i32) -> Option<&'static str> {
    EXTENSION_NIDS.iter()
        .find(|&&(_, known, _)| known == nid)
        .map(|&(_, _, name)| name)
}

/// Description of the SGX extension an OID refers to.
pub fn description(oid: &ObjectIdentifier) -> Option<&'static str> {
    if *oid == *SGX_EXTENSION {
        return Some("SGX Extension");
    }
    SgxExtensionType::from_oid(oid).map(|ty| ty.description())
}

/// Formats an OID in dotted decimal notation, e.g. `1.2.840.113741.1.13.1`.
pub fn to_dotted(oid: &ObjectIdentifier) -> String {
    oid.components().iter().map(|c| c.to_string()).collect::<Vec<_>>().join(".")
}

/// The entries that may appear in the SGX extension of a PCK certificate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SgxExtensionType {
    Ppid,
    Tcb,
    /// TCB component SVN, numbered from 1 to 16.
    SgxTcbCompSvn(u8),
    PceSvn,
    CpuSvn,
    PceId,
    Fmspc,
    SgxType,
    PlatformInstanceId,
    Configuration,
    DynamicPlatform,
    CachedKeys,
    SmtEnabled,
}

impl SgxExtensionType {
    pub fn all() -> Vec<SgxExtensionType> {
        let mut all = vec![SgxExtensionType::Ppid, SgxExtensionType::Tcb];
        all.extend((1..=16).map(SgxExtensionType::SgxTcbCompSvn));
        all.extend_from_slice(&[
            SgxExtensionType::PceSvn,
            SgxExtensionType::CpuSvn,
            SgxExtensionType::PceId,
            SgxExtensionType::Fmspc,
            SgxExtensionType::SgxType,
            SgxExtensionType::PlatformInstanceId,
            SgxExtensionType::Configuration,
            SgxExtensionType::DynamicPlatform,
            SgxExtensionType::CachedKeys,
            SgxExtensionType::SmtEnabled,
        ]);
        all
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<SgxExtensionType> {
        let components = oid.components();
        let root = SGX_EXTENSION.components();
        if components.len() <= root.len() || components[..root.len()] != root[..] {
            return None;
        }
        let ty = match &components[root.len()..] {
            [1] => SgxExtensionType::Ppid,
            [2] => SgxExtensionType::Tcb,
            [2, n @ 1..=16] => SgxExtensionType::SgxTcbCompSvn(*n as u8),
            [2, 17] => SgxExtensionType::PceSvn,
            [2, 18] => SgxExtensionType::CpuSvn,
            [3] => SgxExtensionType::PceId,
            [4] => SgxExtensionType::Fmspc,
            [5] => SgxExtensionType::SgxType,
            [6] => SgxExtensionType::PlatformInstanceId,
            [7] => SgxExtensionType::Configuration,
            [7, 1] => SgxExtensionType::DynamicPlatform,
            [7, 2] => SgxExtensionType::CachedKeys,
            [7, 3] => SgxExtensionType::SmtEnabled,
            _ => return None,
        };
        Some(ty)
    }

    pub fn oid(&self) -> ObjectIdentifier {
        let mut components = SGX_EXTENSION.components().clone();
        match *self {
            SgxExtensionType::Ppid => components.push(1),
            SgxExtensionType::Tcb => components.push(2),
            SgxExtensionType::SgxTcbCompSvn(n) => components.extend_from_slice(&[2, n as u64]),
            SgxExtensionType::PceSvn => components.extend_from_slice(&[2, 17]),
            SgxExtensionType::CpuSvn => components.extend_from_slice(&[2, 18]),
            SgxExtensionType::PceId => components.push(3),
            SgxExtensionType::Fmspc => components.push(4),
            SgxExtensionType::SgxType => components.push(5),
            SgxExtensionType::PlatformInstanceId => components.push(6),
            SgxExtensionType::Configuration => components.push(7),
            SgxExtensionType::DynamicPlatform => components.extend_from_slice(&[7, 1]),
            SgxExtensionType::CachedKeys => components.extend_from_slice(&[7, 2]),
            SgxExtensionType::SmtEnabled => components.extend_from_slice(&[7, 3]),
        }
        components.into()
    }

    fn description(&self) -> &'static str {
        const COMPONENTS: [&str; 16] = [
            "TCB Component 01 SVN", "TCB Component 02 SVN", "TCB Component 03 SVN", "TCB Component 04 SVN",
            "TCB Component 05 SVN", "TCB Component 06 SVN", "TCB Component 07 SVN", "TCB Component 08 SVN",
            "TCB Component 09 SVN", "TCB Component 10 SVN", "TCB Component 11 SVN", "TCB Component 12 SVN",
            "TCB Component 13 SVN", "TCB Component 14 SVN", "TCB Component 15 SVN", "TCB Component 16 SVN",
        ];
        match *self {
            SgxExtensionType::Ppid => "Platform Provisioning ID",
            SgxExtensionType::Tcb => "TCB",
            SgxExtensionType::SgxTcbCompSvn(n) => COMPONENTS.get((n as usize).wrapping_sub(1)).cloned().unwrap_or("TCB Component SVN"),
            SgxExtensionType::PceSvn => "PCE SVN",
            SgxExtensionType::CpuSvn => "CPU SVN",
            SgxExtensionType::PceId => "PCE ID",
            SgxExtensionType::Fmspc => "FMSPC",
            SgxExtensionType::SgxType => "SGX Type",
            SgxExtensionType::PlatformInstanceId => "Platform Instance ID",
            SgxExtensionType::Configuration => "Configuration",
            SgxExtensionType::DynamicPlatform => "Dynamic Platform",
            SgxExtensionType::CachedKeys => "Cached Keys",
            SgxExtensionType::SmtEnabled => "SMT Enabled",
        }
    }
}

impl fmt::Display for SgxExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SgxExtensionType::Ppid => f.write_str("PPID"),
            SgxExtensionType::Tcb => f.write_str("TCB"),
            SgxExtensionType::SgxTcbCompSvn(n) => write!(f, "SGX_TCB_COMP{:02}_SVN", n),
            SgxExtensionType::PceSvn => f.write_str("PCESVN"),
            SgxExtensionType::CpuSvn => f.write_str("CPUSVN"),
            SgxExtensionType::PceId => f.write_str("PCEID"),
            SgxExtensionType::Fmspc => f.write_str("FMSPC"),
            SgxExtensionType::SgxType => f.write_str("SGX_TYPE"),
            SgxExtensionType::PlatformInstanceId => f.write_str("PLATFORM_INSTANCE_ID"),
            SgxExtensionType::Configuration => f.write_str("CONFIGURATION"),
            SgxExtensionType::DynamicPlatform => f.write_str("DYNAMIC_PLATFORM"),
            SgxExtensionType::CachedKeys => f.write_str("CACHED_KEYS"),
            SgxExtensionType::SmtEnabled => f.write_str("SMT_ENABLED"),
        }
    }
}
