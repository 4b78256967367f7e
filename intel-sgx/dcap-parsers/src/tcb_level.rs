/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::cmp::Ordering;
use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::json::{self, FieldError, Object};
use crate::pckcrt::{component_index_error, Tcb};
use crate::tcb_info::{TcbInfoId, TcbInfoVersion};
use crate::{CpuSvn, Error, PceIsvsvn, TcbStatus, TCB_COMPONENT_COUNT};

/// One SVN of a TCB Info V3 component vector. Components compare by their SVN only.
#[derive(Debug, Clone, Default)]
pub struct TcbComponent {
    svn: u8,
    category: Option<String>,
    type_: Option<String>,
}

impl TcbComponent {
    pub fn new(svn: u8, category: Option<String>, type_: Option<String>) -> Self {
        TcbComponent { svn, category, type_ }
    }

    pub fn svn(&self) -> u8 {
        self.svn
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn type_(&self) -> Option<&str> {
        self.type_.as_deref()
    }

    fn from_json(value: &Value) -> Result<TcbComponent, Error> {
        let component = value.as_object().ok_or_else(|| Error::format("TCB Component should be a JSON object"))?;
        let svn = json::uint_field(component, "svn")
            .ok()
            .and_then(|svn| u8::try_from(svn).ok())
            .ok_or_else(|| Error::format("TCB Component JSON should has [svn] field and it should be unsigned integer"))?;
        let optional_string = |name: &str| match json::string_field(component, name) {
            Ok(s) => Ok(Some(s.to_owned())),
            Err(FieldError::Missing) => Ok(None),
            Err(FieldError::Invalid) => Err(Error::format(format!("TCB Component JSON's [{}] field should be string", name))),
        };
        Ok(TcbComponent {
            svn,
            category: optional_string("category")?,
            type_: optional_string("type")?,
        })
    }
}

impl From<u8> for TcbComponent {
    fn from(svn: u8) -> Self {
        TcbComponent::new(svn, None, None)
    }
}

impl PartialEq for TcbComponent {
    fn eq(&self, other: &Self) -> bool {
        self.svn == other.svn
    }
}

impl Eq for TcbComponent {}

impl PartialOrd for TcbComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TcbComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.svn.cmp(&other.svn)
    }
}

/// A known TCB level of a TCB Info document together with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcbLevel {
    version: TcbInfoVersion,
    id: TcbInfoId,
    /// SVNs of the 16 SGX components, for every version.
    cpu_svn: CpuSvn,
    /// Empty for V2 levels.
    sgx_tcb_components: Vec<TcbComponent>,
    /// Only populated for V3 TDX levels.
    tdx_tcb_components: Vec<TcbComponent>,
    pce_svn: PceIsvsvn,
    status: TcbStatus,
    tcb_date: Option<DateTime<Utc>>,
    advisory_ids: Vec<String>,
}

fn component_count_error(field: &str) -> Error {
    Error::format(format!("TCB level [{}] array should have {} entries", field, TCB_COMPONENT_COUNT))
}

fn sgx_components_not_in_v2() -> Error {
    Error::format("SGX TCB Components is not a valid field in TCB Info V1 and V2 structure")
}

impl TcbLevel {
    pub fn new_v2(
        cpu_svn: CpuSvn,
        pce_svn: PceIsvsvn,
        status: TcbStatus,
        tcb_date: Option<DateTime<Utc>>,
        advisory_ids: Vec<String>,
    ) -> Self {
        TcbLevel {
            version: TcbInfoVersion::V2,
            id: TcbInfoId::Sgx,
            cpu_svn,
            sgx_tcb_components: Vec::new(),
            tdx_tcb_components: Vec::new(),
            pce_svn,
            status,
            tcb_date,
            advisory_ids,
        }
    }

    /// `tdx_tcb_components` must hold 16 entries for TDX levels and be empty for SGX levels.
    pub fn new_v3(
        id: TcbInfoId,
        sgx_tcb_components: Vec<TcbComponent>,
        tdx_tcb_components: Vec<TcbComponent>,
        pce_svn: PceIsvsvn,
        status: TcbStatus,
    ) -> Result<Self, Error> {
        if sgx_tcb_components.len() != TCB_COMPONENT_COUNT {
            return Err(component_count_error("sgxtcbcomponents"));
        }
        let tdx_count = match id {
            TcbInfoId::Sgx => 0,
            TcbInfoId::Tdx => TCB_COMPONENT_COUNT,
        };
        if tdx_tcb_components.len() != tdx_count {
            return Err(component_count_error("tdxtcbcomponents"));
        }
        let mut cpu_svn = CpuSvn::default();
        for (svn, component) in cpu_svn.iter_mut().zip(sgx_tcb_components.iter()) {
            *svn = component.svn();
        }
        Ok(TcbLevel {
            version: TcbInfoVersion::V3,
            id,
            cpu_svn,
            sgx_tcb_components,
            tdx_tcb_components,
            pce_svn,
            status,
            tcb_date: None,
            advisory_ids: Vec::new(),
        })
    }

    pub fn version(&self) -> TcbInfoVersion {
        self.version
    }

    /// SVNs of the SGX components, for V2 as well as V3 levels.
    pub fn cpu_svn(&self) -> &CpuSvn {
        &self.cpu_svn
    }

    pub fn sgx_tcb_component_svn(&self, index: usize) -> Result<u8, Error> {
        self.cpu_svn.get(index).cloned().ok_or_else(|| component_index_error(index))
    }

    pub fn sgx_tcb_component(&self, index: usize) -> Result<&TcbComponent, Error> {
        if index >= TCB_COMPONENT_COUNT {
            return Err(component_index_error(index));
        }
        self.sgx_tcb_components()?.get(index).ok_or_else(sgx_components_not_in_v2)
    }

    pub fn sgx_tcb_components(&self) -> Result<&[TcbComponent], Error> {
        if self.version < TcbInfoVersion::V3 {
            return Err(sgx_components_not_in_v2());
        }
        Ok(&self.sgx_tcb_components)
    }

    pub fn tdx_tcb_component(&self, index: usize) -> Result<&TcbComponent, Error> {
        if index >= TCB_COMPONENT_COUNT {
            return Err(component_index_error(index));
        }
        self.tdx_tcb_components()?
            .get(index)
            .ok_or_else(|| Error::format("TDX TCB Components is not a valid field in SGX TCB Info structure"))
    }

    pub fn tdx_tcb_components(&self) -> Result<&[TcbComponent], Error> {
        if self.version < TcbInfoVersion::V3 {
            return Err(Error::format("TDX TCB Components is not a valid field in TCB Info V1 and V2 structure"));
        }
        if self.id != TcbInfoId::Tdx {
            return Err(Error::format("TDX TCB Components is not a valid field in SGX TCB Info structure"));
        }
        Ok(&self.tdx_tcb_components)
    }

    pub fn pce_svn(&self) -> PceIsvsvn {
        self.pce_svn
    }

    pub fn status(&self) -> TcbStatus {
        self.status
    }

    /// Always present on levels parsed from a document.
    pub fn tcb_date(&self) -> Option<&DateTime<Utc>> {
        self.tcb_date.as_ref()
    }

    pub fn advisory_ids(&self) -> &[String] {
        &self.advisory_ids
    }

    /// Total order of the levels of one TCB Info document. The SGX component vectors decide
    /// first. On a tie the PCESVN decides, except for V3 TDX levels with equal PCESVN where the
    /// TDX component vectors break the tie.
    pub fn tcb_cmp(&self, other: &TcbLevel) -> Ordering {
        match self.cpu_svn.cmp(&other.cpu_svn) {
            Ordering::Equal => {
                if self.version == TcbInfoVersion::V3 && self.id == TcbInfoId::Tdx && self.pce_svn == other.pce_svn {
                    self.tdx_tcb_components.cmp(&other.tdx_tcb_components)
                } else {
                    self.pce_svn.cmp(&other.pce_svn)
                }
            }
            ordering => ordering,
        }
    }

    /// Whether a platform with `tcb` is at or above this level: each of its component SVNs
    /// and its PCESVN are at least the ones of this level.
    pub fn is_met_by(&self, tcb: &Tcb) -> bool {
        self.cpu_svn.iter().zip(tcb.sgx_tcb_components().iter()).all(|(level, platform)| level <= platform)
            && self.pce_svn <= tcb.pce_svn()
    }

    pub(crate) fn from_json(value: &Value, version: TcbInfoVersion, id: TcbInfoId) -> Result<TcbLevel, Error> {
        let level = value.as_object().ok_or_else(|| Error::format("TCB level should be a JSON object"))?;

        let tcb_date = json::date_field(level, "tcbDate").map_err(|e| match e {
            FieldError::Missing => Error::format("TCB level JSON should has [tcbDate] field"),
            FieldError::Invalid => Error::invalid_extension(
                "Could not parse [tcbDate] field of TCB info JSON to date. [tcbDate] should be ISO formatted date",
            ),
        })?;
        let advisory_ids = match json::string_vec_field(level, "advisoryIDs") {
            Ok(ids) => ids,
            Err(FieldError::Missing) => Vec::new(),
            Err(FieldError::Invalid) => {
                return Err(Error::invalid_extension("Could not parse [advisoryIDs] field of TCB info JSON to an array."))
            }
        };
        let status = parse_status(level)?;

        let tcb = level.get("tcb").ok_or_else(|| Error::format("TCB level JSON should has [tcb] field"))?;
        let mut parsed = match version {
            TcbInfoVersion::V2 => {
                let tcb = tcb.as_object().ok_or_else(|| Error::format("[tcb] field of TCB level should be a JSON object"))?;
                let cpu_svn = parse_flat_svns(tcb)?;
                TcbLevel::new_v2(cpu_svn, parse_pce_svn(tcb)?, status, None, Vec::new())
            }
            TcbInfoVersion::V3 => {
                let tcb = tcb.as_object().ok_or_else(|| Error::format("TCB level JSON [tcb] field should be an object"))?;
                let pce_svn = parse_pce_svn(tcb)?;
                let sgx = parse_components(tcb, "sgxtcbcomponents", "TCB level JSON should have [sgxtcbcomponents] field")?;
                let tdx = match id {
                    TcbInfoId::Sgx => Vec::new(),
                    TcbInfoId::Tdx => {
                        parse_components(tcb, "tdxtcbcomponents", "TCB level JSON for TDX should have [tdxtcbcomponents] field")?
                    }
                };
                TcbLevel::new_v3(id, sgx, tdx, pce_svn, status)?
            }
        };
        parsed.tcb_date = Some(tcb_date);
        parsed.advisory_ids = advisory_ids;
        trace!("Parsed TCB level {:?} with PCESVN {} and status {}", parsed.cpu_svn, parsed.pce_svn, parsed.status.as_str());
        Ok(parsed)
    }
}

fn parse_status(level: &Object) -> Result<TcbStatus, Error> {
    let status = json::string_field(level, "tcbStatus").map_err(|e| match e {
        FieldError::Missing => Error::format("TCB level JSON should has [tcbStatus] field"),
        FieldError::Invalid => Error::format("TCB level [tcbStatus] JSON field should be a string"),
    })?;
    TcbStatus::try_from(status)
        .map_err(|_| Error::invalid_extension(format!("TCB level [tcbStatus] JSON field has invalid value [{}]", status)))
}

fn parse_pce_svn(tcb: &Object) -> Result<PceIsvsvn, Error> {
    json::uint_field(tcb, "pcesvn")
        .ok()
        .and_then(|svn| PceIsvsvn::try_from(svn).ok())
        .ok_or_else(|| Error::format("Could not parse [pcesvn] field of TCB level JSON to unsigned integer"))
}

/// The `sgxtcbcomp01svn` .. `sgxtcbcomp16svn` fields of a V2 level.
fn parse_flat_svns(tcb: &Object) -> Result<CpuSvn, Error> {
    let mut cpu_svn = CpuSvn::default();
    for (i, svn) in cpu_svn.iter_mut().enumerate() {
        let name = format!("sgxtcbcomp{:02}svn", i + 1);
        *svn = json::uint_field(tcb, &name)
            .map_err(|e| match e {
                FieldError::Missing => Error::format(format!("TCB level JSON should has [{}] field", name)),
                FieldError::Invalid => invalid_svn(&name),
            })
            .and_then(|v| u8::try_from(v).map_err(|_| invalid_svn(&name)))?;
    }
    Ok(cpu_svn)
}

fn invalid_svn(name: &str) -> Error {
    Error::invalid_extension(format!("Could not parse [{}] field of TCB level JSON to unsigned integer", name))
}

fn parse_components(tcb: &Object, field: &str, missing: &str) -> Result<Vec<TcbComponent>, Error> {
    let components = tcb
        .get(field)
        .ok_or_else(|| Error::format(missing))?
        .as_array()
        .ok_or_else(|| Error::format(format!("TCB level JSON's [{}] field should be an array", field)))?;
    if components.len() != TCB_COMPONENT_COUNT {
        return Err(component_count_error(field));
    }
    components.iter().map(TcbComponent::from_json).collect()
}
