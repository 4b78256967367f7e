/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::json::{self, FieldError, Object};
use crate::pckcrt::Tcb;
use crate::tcb_level::TcbLevel;
use crate::{
    Error, PceId, ECDSA_P256_SIGNATURE_BYTE_LEN, FMSPC_BYTE_LEN, PCEID_BYTE_LEN, TDX_ATTRIBUTES_BYTE_LEN,
    TDX_MRSIGNER_BYTE_LEN,
};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Fmspc([u8; FMSPC_BYTE_LEN]);

#[derive(Debug)]
pub enum FmspcDecodeError {
    InvalidHex,
    InvalidFmspcLength,
}

impl From<base16::DecodeError> for FmspcDecodeError {
    fn from(_value: base16::DecodeError) -> FmspcDecodeError {
        FmspcDecodeError::InvalidHex
    }
}

impl Fmspc {
    pub const fn new(value: [u8; FMSPC_BYTE_LEN]) -> Self {
        Fmspc(value)
    }

    pub fn as_bytes(&self) -> &[u8; FMSPC_BYTE_LEN] {
        &self.0
    }
}

impl From<[u8; FMSPC_BYTE_LEN]> for Fmspc {
    fn from(value: [u8; FMSPC_BYTE_LEN]) -> Fmspc {
        Fmspc::new(value)
    }
}

impl TryFrom<&[u8]> for Fmspc {
    type Error = FmspcDecodeError;

    fn try_from(value: &[u8]) -> Result<Fmspc, FmspcDecodeError> {
        let value = <[u8; FMSPC_BYTE_LEN]>::try_from(value).map_err(|_| FmspcDecodeError::InvalidFmspcLength)?;
        Ok(Fmspc::new(value))
    }
}

impl TryFrom<&str> for Fmspc {
    type Error = FmspcDecodeError;

    fn try_from(value: &str) -> Result<Fmspc, FmspcDecodeError> {
        let value = base16::decode(value)?;
        Fmspc::try_from(value.as_slice())
    }
}

impl fmt::Display for Fmspc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base16::encode_upper(&self.0))
    }
}

impl Serialize for Fmspc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Fmspc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fmspc = <&str>::deserialize(deserializer)?;
        Fmspc::try_from(fmspc).map_err(|_| de::Error::custom("Bad fmspc format"))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TcbInfoVersion {
    V2 = 2,
    V3 = 3,
}

impl TryFrom<u32> for TcbInfoVersion {
    type Error = Error;

    fn try_from(version: u32) -> Result<Self, Error> {
        match version {
            2 => Ok(TcbInfoVersion::V2),
            3 => Ok(TcbInfoVersion::V3),
            v => Err(Error::invalid_extension(format!(
                "Unsupported version[{}] value for field of TCB info JSON. Supported versions are [{} | {}]",
                v, TcbInfoVersion::V2, TcbInfoVersion::V3
            ))),
        }
    }
}

impl fmt::Display for TcbInfoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

/// Technology a V3 TCB Info document describes. V2 documents are always SGX.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcbInfoId {
    Sgx,
    Tdx,
}

impl TcbInfoId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TcbInfoId::Sgx => "SGX",
            TcbInfoId::Tdx => "TDX",
        }
    }
}

impl TryFrom<&str> for TcbInfoId {
    type Error = Error;

    fn try_from(id: &str) -> Result<Self, Error> {
        match id {
            "SGX" => Ok(TcbInfoId::Sgx),
            "TDX" => Ok(TcbInfoId::Tdx),
            id => Err(Error::invalid_extension(format!(
                "Unsupported id[{}] value for field of TCB info JSON. Supported identifiers are [{} | {}]",
                id, TcbInfoId::Sgx, TcbInfoId::Tdx
            ))),
        }
    }
}

impl fmt::Display for TcbInfoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the TDX SEAM module, part of TDX TCB Info documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TdxModule {
    mrsigner: [u8; TDX_MRSIGNER_BYTE_LEN],
    attributes: [u8; TDX_ATTRIBUTES_BYTE_LEN],
    attributes_mask: [u8; TDX_ATTRIBUTES_BYTE_LEN],
}

impl TdxModule {
    pub fn new(
        mrsigner: [u8; TDX_MRSIGNER_BYTE_LEN],
        attributes: [u8; TDX_ATTRIBUTES_BYTE_LEN],
        attributes_mask: [u8; TDX_ATTRIBUTES_BYTE_LEN],
    ) -> Self {
        TdxModule { mrsigner, attributes, attributes_mask }
    }

    pub fn mrsigner(&self) -> &[u8; TDX_MRSIGNER_BYTE_LEN] {
        &self.mrsigner
    }

    pub fn attributes(&self) -> &[u8; TDX_ATTRIBUTES_BYTE_LEN] {
        &self.attributes
    }

    pub fn attributes_mask(&self) -> &[u8; TDX_ATTRIBUTES_BYTE_LEN] {
        &self.attributes_mask
    }

    fn from_json(module: &Object) -> Result<TdxModule, Error> {
        fn fixed<const N: usize>(module: &Object, name: &str) -> Result<[u8; N], Error> {
            json::bytes_field(module, name, N * 2)
                .ok()
                .and_then(|bytes| <[u8; N]>::try_from(bytes.as_slice()).ok())
                .ok_or_else(|| {
                    Error::format(format!("TDX Module JSON should have [{}] field and it should be {} bytes encoded as hexstring", name, N))
                })
        }

        Ok(TdxModule {
            mrsigner: fixed(module, "mrsigner")?,
            attributes: fixed(module, "attributes")?,
            attributes_mask: fixed(module, "attributesMask")?,
        })
    }
}

/// A TCB Info document: the known TCB levels of one platform family, signed by Intel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcbInfo {
    version: TcbInfoVersion,
    id: TcbInfoId,
    issue_date: DateTime<Utc>,
    next_update: DateTime<Utc>,
    fmspc: Fmspc,
    pce_id: PceId,
    tcb_type: i32,
    tcb_evaluation_data_number: u32,
    /// Ordered from the highest to the lowest level, without duplicates.
    tcb_levels: Vec<TcbLevel>,
    tdx_module: Option<TdxModule>,
    /// Raw `r || s` of the ECDSA P-256 signature.
    signature: Vec<u8>,
    /// The `tcbInfo` object as signed, re-serialized without whitespace in its original key order.
    info_body: Vec<u8>,
}

/// Maps a missing field to a format error and a malformed one to an invalid extension error,
/// the split used by most TCB Info fields.
fn required<T>(field: json::Field<T>, missing: &str, invalid: &str) -> Result<T, Error> {
    field.map_err(|e| match e {
        FieldError::Missing => Error::format(missing),
        FieldError::Invalid => Error::invalid_extension(invalid),
    })
}

fn missing(name: &str) -> String {
    format!("TCB Info JSON should has [{}] field", name)
}

impl TcbInfo {
    pub fn parse(json: &str) -> Result<TcbInfo, Error> {
        TcbInfo::parse_document(json).map_err(|e| {
            warn!("Rejecting TCB Info: {}", e);
            e
        })
    }

    fn parse_document(json: &str) -> Result<TcbInfo, Error> {
        let document: Value = serde_json::from_str(json).map_err(|_| Error::format("Could not parse TCB info JSON"))?;

        let tcb_info = document
            .get("tcbInfo")
            .ok_or_else(|| Error::format("Missing [tcbInfo] field of TCB info JSON"))?
            .as_object()
            .ok_or_else(|| Error::format("[tcbInfo] field of TCB info JSON should be an object"))?;
        let signature = document
            .get("signature")
            .ok_or_else(|| Error::invalid_extension("Missing [signature] field of TCB info JSON"))?;

        let version = required(
            json::uint_field(tcb_info, "version"),
            &missing("version"),
            "Could not parse [version] field of TCB info JSON to integer",
        )?;
        let version = TcbInfoVersion::try_from(version)?;

        let id = match version {
            TcbInfoVersion::V2 => TcbInfoId::Sgx,
            TcbInfoVersion::V3 => {
                let id = required(
                    json::string_field(tcb_info, "id"),
                    &missing("id"),
                    "Could not parse [id] field of TCB info JSON to string",
                )?;
                TcbInfoId::try_from(id)?
            }
        };

        let date = |name: &str| {
            required(
                json::date_field(tcb_info, name),
                &missing(name),
                &format!("Could not parse [{0}] field of TCB info JSON to date. [{0}] should be ISO formatted date", name),
            )
        };
        let issue_date = date("issueDate")?;
        let next_update = date("nextUpdate")?;

        let bytes = |name: &str, len: usize| {
            required(
                json::bytes_field(tcb_info, name, len * 2),
                &missing(name),
                &format!("Could not parse [{}] field of TCB info JSON to bytes", name),
            )
        };
        let fmspc = bytes("fmspc", FMSPC_BYTE_LEN)?;
        let fmspc = Fmspc::try_from(fmspc.as_slice())
            .map_err(|_| Error::invalid_extension("Could not parse [fmspc] field of TCB info JSON to bytes"))?;
        let pce_id = bytes("pceId", PCEID_BYTE_LEN)?;
        let pce_id = <PceId>::try_from(pce_id.as_slice())
            .map_err(|_| Error::invalid_extension("Could not parse [pceId] field of TCB info JSON to bytes"))?;

        let signature = signature
            .as_str()
            .filter(|s| s.len() == ECDSA_P256_SIGNATURE_BYTE_LEN * 2)
            .and_then(|s| base16::decode(s).ok())
            .ok_or_else(|| Error::invalid_extension("Could not parse [signature] field of TCB info JSON to bytes"))?;

        if !tcb_info.contains_key("tcbLevels") {
            return Err(Error::invalid_extension("Missing [tcbLevels] field of TCB info JSON"));
        }

        let tcb_type = required(
            json::int_field(tcb_info, "tcbType"),
            &missing("tcbType"),
            "Could not parse [tcbType] field of TCB Info JSON to number",
        )?;
        let tcb_evaluation_data_number = required(
            json::uint_field(tcb_info, "tcbEvaluationDataNumber"),
            &missing("tcbEvaluationDataNumber"),
            "Could not parse [tcbEvaluationDataNumber] field of TCB Info JSON to number",
        )?;

        let tdx_module = match (version, id, tcb_info.get("tdxModule")) {
            (TcbInfoVersion::V3, TcbInfoId::Sgx, Some(_)) => {
                return Err(Error::invalid_extension("TCB Info JSON for SGX should not have [tdxModule] field"))
            }
            (TcbInfoVersion::V3, TcbInfoId::Tdx, None) => {
                return Err(Error::invalid_extension("TCB Info JSON for TDX should have [tdxModule] field"))
            }
            (TcbInfoVersion::V3, TcbInfoId::Tdx, Some(module)) => {
                let module = module.as_object().ok_or_else(|| Error::format("[tdxModule] field should be an object"))?;
                Some(TdxModule::from_json(module)?)
            }
            _ => None,
        };

        let levels = tcb_info["tcbLevels"]
            .as_array()
            .ok_or_else(|| Error::invalid_extension("[tcbLevels] field of TCB info JSON should be a nonempty array"))?;
        let mut tcb_levels = Vec::<TcbLevel>::with_capacity(levels.len());
        for level in levels {
            let level = TcbLevel::from_json(level, version, id)?;
            match tcb_levels.binary_search_by(|existing| level.tcb_cmp(existing)) {
                Ok(_) => return Err(Error::invalid_extension("Detected duplicated TCB levels")),
                Err(idx) => tcb_levels.insert(idx, level),
            }
        }
        if tcb_levels.is_empty() {
            return Err(Error::invalid_extension("Number of parsed [tcbLevels] should not be 0"));
        }

        let info_body = serde_json::to_vec(tcb_info).map_err(|_| Error::format("Could not parse TCB info JSON"))?;

        debug!(
            "Parsed {} TCB Info V{} for FMSPC [{}] with {} TCB levels",
            id, version, fmspc, tcb_levels.len()
        );
        Ok(TcbInfo {
            version,
            id,
            issue_date,
            next_update,
            fmspc,
            pce_id,
            tcb_type,
            tcb_evaluation_data_number,
            tcb_levels,
            tdx_module,
            signature,
            info_body,
        })
    }

    pub fn version(&self) -> TcbInfoVersion {
        self.version
    }

    /// Only V3 documents carry an identifier.
    pub fn id(&self) -> Result<TcbInfoId, Error> {
        match self.version {
            TcbInfoVersion::V2 => Err(Error::format("TCB identifier is not a valid field in TCB Info V2 structure")),
            TcbInfoVersion::V3 => Ok(self.id),
        }
    }

    pub fn issue_date(&self) -> &DateTime<Utc> {
        &self.issue_date
    }

    pub fn next_update(&self) -> &DateTime<Utc> {
        &self.next_update
    }

    pub fn fmspc(&self) -> &Fmspc {
        &self.fmspc
    }

    pub fn pce_id(&self) -> &PceId {
        &self.pce_id
    }

    pub fn tcb_type(&self) -> i32 {
        self.tcb_type
    }

    pub fn tcb_evaluation_data_number(&self) -> u32 {
        self.tcb_evaluation_data_number
    }

    /// TCB levels from the highest to the lowest.
    pub fn tcb_levels(&self) -> &[TcbLevel] {
        &self.tcb_levels
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The signed bytes of the document.
    pub fn info_body(&self) -> &[u8] {
        &self.info_body
    }

    pub fn tdx_module(&self) -> Result<&TdxModule, Error> {
        if self.version < TcbInfoVersion::V3 {
            return Err(Error::format("TdxModule is not a valid field in TCB Info V1 and V2 structure"));
        }
        self.tdx_module.as_ref().ok_or_else(|| Error::format("TdxModule is only valid for TDX TCB Info"))
    }

    /// Highest TCB level the platform `tcb` meets, comparing the SGX component SVNs and the
    /// PCESVN. `None` when the platform is below every known level.
    pub fn find_tcb_level(&self, tcb: &Tcb) -> Option<&TcbLevel> {
        self.tcb_levels.iter().find(|level| level.is_met_by(tcb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmspc() {
        let fmspc = Fmspc::try_from("00906ea10000").unwrap();
        assert_eq!(fmspc.as_bytes(), &[0x00, 0x90, 0x6e, 0xa1, 0x00, 0x00]);
        assert_eq!(fmspc.to_string(), "00906EA10000");
        assert!(matches!(Fmspc::try_from("00906ea100"), Err(FmspcDecodeError::InvalidFmspcLength)));
        assert!(matches!(Fmspc::try_from("00906ea1000z"), Err(FmspcDecodeError::InvalidHex)));
        assert_eq!(serde_json::to_string(&fmspc).unwrap(), "\"00906EA10000\"");
        assert_eq!(serde_json::from_str::<Fmspc>("\"00906EA10000\"").unwrap(), fmspc);
    }

    #[test]
    fn versions_and_ids() {
        assert_eq!(TcbInfoVersion::try_from(3).unwrap(), TcbInfoVersion::V3);
        assert_eq!(
            TcbInfoVersion::try_from(1).unwrap_err().to_string(),
            "Unsupported version[1] value for field of TCB info JSON. Supported versions are [2 | 3]"
        );
        assert!(TcbInfoVersion::V2 < TcbInfoVersion::V3);
        assert_eq!(TcbInfoId::try_from("TDX").unwrap(), TcbInfoId::Tdx);
        let err = TcbInfoId::try_from("sgx").unwrap_err();
        assert!(err.is_invalid_extension());
        assert_eq!(err.to_string(), "Unsupported id[sgx] value for field of TCB info JSON. Supported identifiers are [SGX | TDX]");
    }

    #[test]
    fn tdx_module() {
        let module = serde_json::json!({
            "mrsigner": "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F202122232425262728292A2B2C2D2E2F",
            "attributes": "0000000000000000",
            "attributesMask": "FFFFFFFFFFFFFFFF"
        });
        let module = TdxModule::from_json(module.as_object().unwrap()).unwrap();
        assert_eq!(module.mrsigner()[47], 0x2f);
        assert_eq!(module.attributes(), &[0; 8]);
        assert_eq!(module.attributes_mask(), &[0xff; 8]);

        let short = serde_json::json!({
            "mrsigner": "0001",
            "attributes": "0000000000000000",
            "attributesMask": "FFFFFFFFFFFFFFFF"
        });
        let err = TdxModule::from_json(short.as_object().unwrap()).unwrap_err();
        assert!(err.is_format());
        assert_eq!(err.to_string(), "TDX Module JSON should have [mrsigner] field and it should be 48 bytes encoded as hexstring");
    }
}
