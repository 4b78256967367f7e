/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asn1::{Asn1Type, Asn1Value};
use crate::oid::{self, to_dotted, SgxExtensionType};
use crate::tcb_info::Fmspc;
use crate::x509::Certificate;
use crate::{missing_items_message, CpuSvn, Error, PceId, PceIsvsvn, PlatformInstanceId, Ppid, TCB_COMPONENT_COUNT};

/// [`SgxType`] is a rust enum representing the Intel® SGX Type.
///
/// Ref: <https://api.trustedservices.intel.com/documents/Intel_SGX_PCK_Certificate_CRL_Spec-1.5.pdf>
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SgxType {
    Standard,
    /// Type for machines only provide confidentiality protection for EPC memory, such as Azure DC v3 instance.
    Scalable,
    /// Type for machines provide integrity and confidentiality protection for EPC memory.
    ScalableWithIntegrity,
}

impl Default for SgxType {
    fn default() -> SgxType {
        SgxType::Standard
    }
}

impl TryFrom<i64> for SgxType {
    type Error = ();

    fn try_from(v: i64) -> Result<Self, ()> {
        match v {
            0 => Ok(SgxType::Standard),
            1 => Ok(SgxType::Scalable),
            2 => Ok(SgxType::ScalableWithIntegrity),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SgxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SgxType::Standard => write!(f, "Standard"),
            SgxType::Scalable => write!(f, "Scalable"),
            SgxType::ScalableWithIntegrity => write!(f, "ScalableWithIntegrity"),
        }
    }
}

/// Platform TCB as recorded in a PCK certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tcb {
    cpu_svn: CpuSvn,
    sgx_tcb_components: [u8; TCB_COMPONENT_COUNT],
    pce_svn: PceIsvsvn,
}

impl Tcb {
    pub fn new(cpu_svn: CpuSvn, sgx_tcb_components: [u8; TCB_COMPONENT_COUNT], pce_svn: PceIsvsvn) -> Self {
        Tcb { cpu_svn, sgx_tcb_components, pce_svn }
    }

    /// Builds a TCB whose component SVNs are the bytes of the raw CPUSVN, as used by platforms
    /// that report only the CPUSVN.
    pub fn from_raw(cpu_svn: CpuSvn, pce_svn: PceIsvsvn) -> Self {
        Tcb::new(cpu_svn, cpu_svn, pce_svn)
    }

    pub fn cpu_svn(&self) -> &CpuSvn {
        &self.cpu_svn
    }

    pub fn sgx_tcb_components(&self) -> &[u8; TCB_COMPONENT_COUNT] {
        &self.sgx_tcb_components
    }

    /// SVN of the component at `index`, counting from 0.
    pub fn sgx_tcb_component_svn(&self, index: usize) -> Result<u8, Error> {
        self.sgx_tcb_components.get(index).cloned().ok_or_else(|| component_index_error(index))
    }

    pub fn pce_svn(&self) -> PceIsvsvn {
        self.pce_svn
    }

    /// Decodes the 18 `SEQUENCE { OID, value }` entries of the TCB extension.
    pub(crate) fn from_asn1(value: &Asn1Value) -> Result<Tcb, Error> {
        const TCB_SEQUENCE_LEN: usize = 18;

        let entries = value.to_sequence()?;
        if entries.len() != TCB_SEQUENCE_LEN {
            return Err(Error::invalid_extension(format!(
                "TCB length expected [{}] given [{}]", TCB_SEQUENCE_LEN, entries.len()
            )));
        }

        let mut expected = (1..=TCB_COMPONENT_COUNT as u8).map(SgxExtensionType::SgxTcbCompSvn).collect::<Vec<_>>();
        expected.push(SgxExtensionType::PceSvn);
        expected.push(SgxExtensionType::CpuSvn);

        let mut tcb = Tcb::default();
        for entry in &entries {
            let (entry_oid, entry_value) = entry.to_oid_tuple()?;
            let ty = match SgxExtensionType::from_oid(&entry_oid) {
                Some(ty) => ty,
                None => {
                    trace!("Ignoring unknown TCB entry [{}]", to_dotted(&entry_oid));
                    continue;
                }
            };
            match ty {
                SgxExtensionType::SgxTcbCompSvn(n) => {
                    tcb.sgx_tcb_components[(n - 1) as usize] = entry_value.to_u8()?;
                }
                SgxExtensionType::PceSvn => tcb.pce_svn = entry_value.to_u16()?,
                SgxExtensionType::CpuSvn => tcb.cpu_svn = entry_value.to_fixed_bytes()?,
                _ => continue,
            }
            expected.retain(|item| *item != ty);
        }

        if !expected.is_empty() {
            return Err(Error::invalid_extension(missing_items_message("Required TCB SGX extensions not found.", &expected)));
        }
        Ok(tcb)
    }
}

pub(crate) fn component_index_error(index: usize) -> Error {
    Error::format(format!("Invalid component SVN number [{}]. Should be less than {}", index, TCB_COMPONENT_COUNT))
}

/// Configuration flags of a multi-package platform. Flags missing from the certificate are
/// reported as set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Configuration {
    dynamic_platform: bool,
    cached_keys: bool,
    smt_enabled: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration { dynamic_platform: true, cached_keys: true, smt_enabled: true }
    }
}

impl Configuration {
    pub fn new(dynamic_platform: bool, cached_keys: bool, smt_enabled: bool) -> Self {
        Configuration { dynamic_platform, cached_keys, smt_enabled }
    }

    pub fn is_dynamic_platform(&self) -> bool {
        self.dynamic_platform
    }

    pub fn is_cached_keys(&self) -> bool {
        self.cached_keys
    }

    pub fn is_smt_enabled(&self) -> bool {
        self.smt_enabled
    }

    fn from_asn1(value: &Asn1Value) -> Result<Configuration, Error> {
        let mut configuration = Configuration::default();
        for entry in value.to_sequence()? {
            let (entry_oid, entry_value) = entry.to_oid_tuple()?;
            match SgxExtensionType::from_oid(&entry_oid) {
                Some(SgxExtensionType::DynamicPlatform) => configuration.dynamic_platform = entry_value.to_bool()?,
                Some(SgxExtensionType::CachedKeys) => configuration.cached_keys = entry_value.to_bool()?,
                Some(SgxExtensionType::SmtEnabled) => configuration.smt_enabled = entry_value.to_bool()?,
                _ => trace!("Ignoring unknown configuration entry [{}]", to_dotted(&entry_oid)),
            }
        }
        Ok(configuration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PckFields {
    ppid: Ppid,
    pce_id: PceId,
    fmspc: Fmspc,
    sgx_type: SgxType,
    tcb: Tcb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlatformFields {
    platform_instance_id: PlatformInstanceId,
    configuration: Configuration,
}

/// Which certificate role the SGX extension is validated for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Role {
    /// Issued by either the processor or the platform CA.
    Any,
    Processor,
    Platform,
}

impl Role {
    fn accepts(&self, count: usize) -> bool {
        match self {
            Role::Any => count == 5 || count == 7,
            Role::Processor => count == 5,
            Role::Platform => count == 7,
        }
    }

    fn expected_counts(&self) -> &'static str {
        match self {
            Role::Any => "5 | 7",
            Role::Processor => "5",
            Role::Platform => "7",
        }
    }

    fn required(&self) -> Vec<SgxExtensionType> {
        let mut required = vec![
            SgxExtensionType::Ppid,
            SgxExtensionType::Tcb,
            SgxExtensionType::PceId,
            SgxExtensionType::Fmspc,
            SgxExtensionType::SgxType,
        ];
        if *self == Role::Platform {
            required.push(SgxExtensionType::PlatformInstanceId);
            required.push(SgxExtensionType::Configuration);
        }
        required
    }
}

/// Decodes the value of the SGX extension (a `SEQUENCE OF SEQUENCE { OID, value }`).
fn decode_sgx_extension(extension: &[u8], role: Role) -> Result<(PckFields, Option<PlatformFields>), Error> {
    let value = Asn1Value::from_der(to_dotted(&oid::SGX_EXTENSION), extension.to_vec())?;
    value.expect_type(Asn1Type::Sequence)?;
    let entries = value.to_sequence()?;
    if !role.accepts(entries.len()) {
        return Err(Error::invalid_extension(format!(
            "SGX extension expected number of elements is [{}] given [{}]", role.expected_counts(), entries.len()
        )));
    }

    let mut ppid = None;
    let mut pce_id = None;
    let mut fmspc = None;
    let mut sgx_type = None;
    let mut tcb = None;
    let mut platform_instance_id = None;
    let mut configuration = None;
    let mut required = role.required();

    for entry in &entries {
        let (entry_oid, entry_value) = entry.to_oid_tuple()?;
        let ty = match SgxExtensionType::from_oid(&entry_oid) {
            Some(ty) => ty,
            None => {
                trace!("Ignoring unknown SGX extension entry [{}]", to_dotted(&entry_oid));
                continue;
            }
        };
        trace!("Decoding SGX extension entry {}", ty);
        match ty {
            SgxExtensionType::Ppid => ppid = Some(entry_value.to_fixed_bytes()?),
            SgxExtensionType::PceId => pce_id = Some(entry_value.to_fixed_bytes()?),
            SgxExtensionType::Fmspc => fmspc = Some(Fmspc::new(entry_value.to_fixed_bytes()?)),
            SgxExtensionType::SgxType => {
                let raw = entry_value.to_enum()?;
                let parsed = SgxType::try_from(raw)
                    .map_err(|_| Error::invalid_extension(format!("Unsupported SGX type value [{}]", raw)))?;
                sgx_type = Some(parsed);
            }
            SgxExtensionType::Tcb => tcb = Some(Tcb::from_asn1(&entry_value)?),
            SgxExtensionType::PlatformInstanceId => platform_instance_id = Some(entry_value.to_fixed_bytes()?),
            SgxExtensionType::Configuration => configuration = Some(Configuration::from_asn1(&entry_value)?),
            _ => continue,
        }
        required.retain(|item| *item != ty);
    }

    if !required.is_empty() {
        return Err(Error::invalid_extension(missing_items_message("Required SGX extensions not found.", &required)));
    }

    let missing = |ty: SgxExtensionType| move || Error::invalid_extension(missing_items_message("Required SGX extensions not found.", &[ty]));
    let pck = PckFields {
        ppid: ppid.ok_or_else(missing(SgxExtensionType::Ppid))?,
        pce_id: pce_id.ok_or_else(missing(SgxExtensionType::PceId))?,
        fmspc: fmspc.ok_or_else(missing(SgxExtensionType::Fmspc))?,
        sgx_type: sgx_type.ok_or_else(missing(SgxExtensionType::SgxType))?,
        tcb: tcb.ok_or_else(missing(SgxExtensionType::Tcb))?,
    };
    // platform certificates carry both entries, anything else has no platform fields
    let platform = match (platform_instance_id, configuration) {
        (Some(platform_instance_id), Some(configuration)) => Some(PlatformFields { platform_instance_id, configuration }),
        _ => None,
    };
    Ok((pck, platform))
}

fn sgx_extension_of(certificate: &Certificate, role: Role) -> Result<(PckFields, Option<PlatformFields>), Error> {
    let extension = certificate.extension(&oid::SGX_EXTENSION).ok_or_else(|| {
        Error::invalid_extension(format!("SGX extension [{}] not found", to_dotted(&oid::SGX_EXTENSION)))
    })?;
    decode_sgx_extension(extension.value(), role)
}

fn rejected<T>(what: &str, result: Result<T, Error>) -> Result<T, Error> {
    if let Err(e) = &result {
        warn!("Rejecting {}: {}", what, e);
    }
    result
}

/// An X.509 certificate carrying the Intel SGX extension, issued by either the processor or the
/// platform CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PckCertificate {
    certificate: Certificate,
    pck: PckFields,
    platform: Option<PlatformFields>,
}

impl PckCertificate {
    pub fn parse(pem: &str) -> Result<PckCertificate, Error> {
        PckCertificate::from_certificate(Certificate::parse(pem)?)
    }

    pub fn from_certificate(certificate: Certificate) -> Result<PckCertificate, Error> {
        let (pck, platform) = rejected("PCK certificate", sgx_extension_of(&certificate, Role::Any))?;
        debug!("Parsed PCK certificate with FMSPC [{}] and SGX type [{}]", pck.fmspc, pck.sgx_type);
        Ok(PckCertificate { certificate, pck, platform })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn into_certificate(self) -> Certificate {
        self.certificate
    }

    pub fn ppid(&self) -> &Ppid {
        &self.pck.ppid
    }

    pub fn pce_id(&self) -> &PceId {
        &self.pck.pce_id
    }

    pub fn fmspc(&self) -> &Fmspc {
        &self.pck.fmspc
    }

    pub fn sgx_type(&self) -> SgxType {
        self.pck.sgx_type
    }

    pub fn tcb(&self) -> &Tcb {
        &self.pck.tcb
    }

    /// Present for certificates issued by the platform CA.
    pub fn platform_instance_id(&self) -> Option<&PlatformInstanceId> {
        self.platform.as_ref().map(|p| &p.platform_instance_id)
    }

    /// Present for certificates issued by the platform CA.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.platform.as_ref().map(|p| &p.configuration)
    }
}

/// PCK certificate issued by the Intel SGX PCK Processor CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorPckCertificate {
    pck: PckCertificate,
}

impl ProcessorPckCertificate {
    pub fn parse(pem: &str) -> Result<ProcessorPckCertificate, Error> {
        ProcessorPckCertificate::try_from(PckCertificate::parse(pem)?)
    }

    pub fn pck(&self) -> &PckCertificate {
        &self.pck
    }

    pub fn certificate(&self) -> &Certificate {
        self.pck.certificate()
    }
}

impl TryFrom<PckCertificate> for ProcessorPckCertificate {
    type Error = Error;

    fn try_from(pck: PckCertificate) -> Result<Self, Error> {
        rejected("processor PCK certificate", sgx_extension_of(&pck.certificate, Role::Processor))?;
        Ok(ProcessorPckCertificate { pck })
    }
}

/// PCK certificate issued by the Intel SGX PCK Platform CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPckCertificate {
    pck: PckCertificate,
    platform: PlatformFields,
}

impl PlatformPckCertificate {
    pub fn parse(pem: &str) -> Result<PlatformPckCertificate, Error> {
        PlatformPckCertificate::try_from(PckCertificate::parse(pem)?)
    }

    pub fn pck(&self) -> &PckCertificate {
        &self.pck
    }

    pub fn certificate(&self) -> &Certificate {
        self.pck.certificate()
    }

    pub fn platform_instance_id(&self) -> &PlatformInstanceId {
        &self.platform.platform_instance_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.platform.configuration
    }
}

impl TryFrom<PckCertificate> for PlatformPckCertificate {
    type Error = Error;

    fn try_from(pck: PckCertificate) -> Result<Self, Error> {
        let (_, platform) = rejected("platform PCK certificate", sgx_extension_of(&pck.certificate, Role::Platform))?;
        let platform = platform.ok_or_else(|| {
            Error::invalid_extension(missing_items_message("Required SGX extensions not found.", &[SgxExtensionType::PlatformInstanceId]))
        })?;
        Ok(PlatformPckCertificate { pck, platform })
    }
}

#[cfg(test)]
mod tests {
    use hex::FromHex;

    use super::*;

    const PROCESSOR_EXTENSION: &str = "308201c1301e060a2a864886f84d010d01010410a9f239a805b7d938f5b0ea873b69dba7308201\
        64060a2a864886f84d010d0102308201543010060b2a864886f84d010d01020102010d3010060b2a864886f84d010d01020202010d30\
        10060b2a864886f84d010d0102030201023010060b2a864886f84d010d0102040201043010060b2a864886f84d010d01020502010130\
        11060b2a864886f84d010d010206020200803010060b2a864886f84d010d0102070201033010060b2a864886f84d010d010208020100\
        3010060b2a864886f84d010d0102090201003010060b2a864886f84d010d01020a0201003010060b2a864886f84d010d01020b020100\
        3010060b2a864886f84d010d01020c0201003010060b2a864886f84d010d01020d0201003010060b2a864886f84d010d01020e020100\
        3010060b2a864886f84d010d01020f0201003010060b2a864886f84d010d0102100201003010060b2a864886f84d010d010211020109\
        301f060b2a864886f84d010d01021204100d0d02040180030000000000000000003010060a2a864886f84d010d010304020000301406\
        0a2a864886f84d010d0104040600906ea10000300f060a2a864886f84d010d01050a0100";

    const PLATFORM_EXTENSION: &str = "30820230301e060a2a864886f84d010d0101041037039795fe0b06ab48e38f898ab92cef308201\
        6d060a2a864886f84d010d01023082015d3010060b2a864886f84d010d0102010201003010060b2a864886f84d010d01020202014330\
        11060b2a864886f84d010d010203020200c73010060b2a864886f84d010d01020402015c3011060b2a864886f84d010d010205020200\
        d73011060b2a864886f84d010d010206020200b43010060b2a864886f84d010d01020702013b3011060b2a864886f84d010d01020802\
        0200ad3010060b2a864886f84d010d01020902014e3011060b2a864886f84d010d01020a020200bf3011060b2a864886f84d010d0102\
        0b020200be3010060b2a864886f84d010d01020c0201433011060b2a864886f84d010d01020d020200d53010060b2a864886f84d010d\
        01020e02015f3010060b2a864886f84d010d01020f0201343011060b2a864886f84d010d010210020200a53012060b2a864886f84d01\
        0d010211020300d864301f060b2a864886f84d010d01021204100043c75cd7b43bad4ebfbe43d55f34a53010060a2a864886f84d010d\
        0103040200003014060a2a864886f84d010d0104040610475c0d0000300f060a2a864886f84d010d01050a0101301e060a2a864886f8\
        4d010d01060410f344cef7125aa97818a45513f617fdd23044060a2a864886f84d010d010730363010060b2a864886f84d010d010701\
        0101ff3010060b2a864886f84d010d0107020101ff3010060b2a864886f84d010d010703010100";

    /// `SEQUENCE { platform instance id OID, OCTET STRING }`
    const PLATFORM_INSTANCE_ID_ENTRY: &str = "301e060a2a864886f84d010d01060410f344cef7125aa97818a45513f617fdd2";

    /// Hex offset of the entries in [`PROCESSOR_EXTENSION`], past the 4 byte SEQUENCE header.
    const ENTRIES: usize = 8;
    /// Hex length of the PPID entry, the first one in [`PROCESSOR_EXTENSION`].
    const PPID_ENTRY_LEN: usize = 64;
    /// Hex offset of the inner TCB SEQUENCE in [`PROCESSOR_EXTENSION`].
    const TCB_SEQUENCE: usize = ENTRIES + PPID_ENTRY_LEN + 32;
    /// Hex length of the TCB SEQUENCE including its header.
    const TCB_SEQUENCE_LEN: usize = 2 * (4 + 0x154);
    /// Hex length of the CPUSVN entry, the last one of the TCB SEQUENCE.
    const CPUSVN_ENTRY_LEN: usize = 2 * 33;

    fn der(s: &str) -> Vec<u8> {
        Vec::<u8>::from_hex(s.replace(' ', "")).unwrap()
    }

    fn tcb_sequence() -> &'static str {
        &PROCESSOR_EXTENSION[TCB_SEQUENCE..TCB_SEQUENCE + TCB_SEQUENCE_LEN]
    }

    #[test]
    fn sgx_extension() {
        let _ = env_logger::try_init();
        let (pck, platform) = decode_sgx_extension(&der(PROCESSOR_EXTENSION), Role::Processor).unwrap();
        assert_eq!(pck.ppid, [169, 242, 57, 168, 5, 183, 217, 56, 245, 176, 234, 135, 59, 105, 219, 167]);
        assert_eq!(pck.tcb.sgx_tcb_components(), &[13, 13, 2, 4, 1, 128, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(pck.tcb.cpu_svn(), &[13, 13, 2, 4, 1, 128, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(pck.tcb.pce_svn(), 9);
        assert_eq!(pck.pce_id, [0, 0]);
        assert_eq!(pck.fmspc, Fmspc::new([0, 144, 110, 161, 0, 0]));
        assert_eq!(pck.sgx_type, SgxType::Standard);
        assert!(platform.is_none());

        assert!(decode_sgx_extension(&der(PROCESSOR_EXTENSION), Role::Any).is_ok());
    }

    #[test]
    fn sgx_extension_platform_cert() {
        let (pck, platform) = decode_sgx_extension(&der(PLATFORM_EXTENSION), Role::Platform).unwrap();
        assert_eq!(pck.ppid, [0x37, 0x03, 0x97, 0x95, 0xFE, 0x0B, 0x06, 0xAB, 0x48, 0xE3, 0x8F, 0x89, 0x8A, 0xB9, 0x2C, 0xEF]);
        assert_eq!(pck.tcb.sgx_tcb_components(), &[0, 67, 199, 92, 215, 180, 59, 173, 78, 191, 190, 67, 213, 95, 52, 165]);
        assert_eq!(pck.tcb.sgx_tcb_components(), pck.tcb.cpu_svn());
        assert_eq!(pck.tcb.pce_svn(), 55396);
        assert_eq!(pck.pce_id, [0, 0]);
        assert_eq!(pck.fmspc, Fmspc::new([0x10, 0x47, 0x5C, 0x0D, 0x00, 0x00]));
        assert_eq!(pck.sgx_type, SgxType::Scalable);

        let platform = platform.unwrap();
        assert_eq!(
            platform.platform_instance_id,
            [0xF3, 0x44, 0xCE, 0xF7, 0x12, 0x5A, 0xA9, 0x78, 0x18, 0xA4, 0x55, 0x13, 0xF6, 0x17, 0xFD, 0xD2]
        );
        assert_eq!(platform.configuration, Configuration::new(true, true, false));

        assert_eq!(decode_sgx_extension(&der(PLATFORM_EXTENSION), Role::Any).unwrap().1, Some(platform));
    }

    #[test]
    fn sgx_extension_role_mismatch() {
        let err = decode_sgx_extension(&der(PLATFORM_EXTENSION), Role::Processor).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "SGX extension expected number of elements is [5] given [7]");

        let err = decode_sgx_extension(&der(PROCESSOR_EXTENSION), Role::Platform).unwrap_err();
        assert_eq!(err.to_string(), "SGX extension expected number of elements is [7] given [5]");
    }

    #[test]
    fn sgx_extension_with_six_entries() {
        let six = format!("308201e1{}{}", &PROCESSOR_EXTENSION[ENTRIES..], PLATFORM_INSTANCE_ID_ENTRY);
        let err = decode_sgx_extension(&der(&six), Role::Any).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "SGX extension expected number of elements is [5 | 7] given [6]");
    }

    #[test]
    fn sgx_extension_without_configuration() {
        // processor entries, a platform instance id and an unknown entry
        let unknown = "300f060a2a864886f84d010d0109040100";
        let seven = format!("308201f2{}{}{}", &PROCESSOR_EXTENSION[ENTRIES..], PLATFORM_INSTANCE_ID_ENTRY, unknown);

        let (pck, platform) = decode_sgx_extension(&der(&seven), Role::Any).unwrap();
        assert_eq!(pck.tcb.pce_svn(), 9);
        assert_eq!(platform, None);

        let err = decode_sgx_extension(&der(&seven), Role::Platform).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "Required SGX extensions not found. Missing [CONFIGURATION]");
    }

    #[test]
    fn sgx_extension_missing_ppid() {
        let without_ppid = format!("308201c1{}{}", PLATFORM_INSTANCE_ID_ENTRY, &PROCESSOR_EXTENSION[ENTRIES + PPID_ENTRY_LEN..]);
        let err = decode_sgx_extension(&der(&without_ppid), Role::Processor).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "Required SGX extensions not found. Missing [PPID]");
    }

    #[test]
    fn sgx_extension_not_a_sequence() {
        let err = decode_sgx_extension(&der("0402cc13"), Role::Any).unwrap_err();
        assert!(err.is_format());
        assert_eq!(err.to_string(), "OID [1.2.840.113741.1.13.1] expected ASN.1 type [SEQUENCE] given [OCTET STRING]");
    }

    #[test]
    fn tcb() {
        let value = Asn1Value::from_der("1.2.840.113741.1.13.1.2", der(tcb_sequence())).unwrap();
        let tcb = Tcb::from_asn1(&value).unwrap();
        assert_eq!(tcb.sgx_tcb_components(), &[13, 13, 2, 4, 1, 128, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(tcb.sgx_tcb_component_svn(5).unwrap(), 128);
        assert_eq!(tcb.sgx_tcb_component_svn(16).unwrap_err().to_string(), "Invalid component SVN number [16]. Should be less than 16");
        assert_eq!(tcb, Tcb::from_raw([13, 13, 2, 4, 1, 128, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0], 9));
    }

    #[test]
    fn tcb_wrong_length() {
        let entries = &tcb_sequence()[8..TCB_SEQUENCE_LEN - CPUSVN_ENTRY_LEN];
        let value = Asn1Value::from_der("1.2.840.113741.1.13.1.2", der(&format!("30820133{}", entries))).unwrap();
        let err = Tcb::from_asn1(&value).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "TCB length expected [18] given [17]");
    }

    #[test]
    fn tcb_missing_cpusvn() {
        // the CPUSVN entry is replaced by a second SGX_TCB_COMP01_SVN entry
        let entries = &tcb_sequence()[8..TCB_SEQUENCE_LEN - CPUSVN_ENTRY_LEN];
        let comp01 = &entries[..36];
        let value = Asn1Value::from_der("1.2.840.113741.1.13.1.2", der(&format!("30820145{}{}", entries, comp01))).unwrap();
        let err = Tcb::from_asn1(&value).unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "Required TCB SGX extensions not found. Missing [CPUSVN]");
    }

    #[test]
    fn configuration_defaults_to_set() {
        // SEQUENCE { SEQUENCE { SMT_ENABLED, FALSE } }
        let value = Asn1Value::from_der("1.2.840.113741.1.13.1.7", der("30123010060b2a864886f84d010d0107030101 00")).unwrap();
        assert_eq!(Configuration::from_asn1(&value).unwrap(), Configuration::new(true, true, false));

        let value = Asn1Value::from_der("1.2.840.113741.1.13.1.7", der("3000")).unwrap();
        assert_eq!(Configuration::from_asn1(&value).unwrap(), Configuration::default());
    }

    #[test]
    fn sgx_type() {
        assert_eq!(SgxType::try_from(2), Ok(SgxType::ScalableWithIntegrity));
        assert_eq!(SgxType::try_from(3), Err(()));
        assert_eq!(serde_json::to_string(&SgxType::ScalableWithIntegrity).unwrap(), "\"scalable-with-integrity\"");
    }
}
