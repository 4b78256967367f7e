/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Parsers and validators for SGX DCAP attestation evidence.
//!
//! Untrusted inputs (PEM encoded PCK certificates and TCB Info JSON documents) are decoded
//! into immutable, fully validated structures. Every entry point either returns the complete
//! value or an [`Error`]; nothing is partially constructed.

#![deny(warnings)]

extern crate yasna;
#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::pckcrt::{Configuration, PckCertificate, PlatformPckCertificate, ProcessorPckCertificate, SgxType, Tcb};
pub use crate::tcb_info::{Fmspc, FmspcDecodeError, TcbInfo, TcbInfoId, TcbInfoVersion, TdxModule};
pub use crate::tcb_level::{TcbComponent, TcbLevel};
pub use crate::x509::{Certificate, DistinguishedName, Extension, Signature, Validity};

pub mod asn1;
mod iso8601;
mod json;
pub mod oid;
mod pckcrt;
mod tcb_info;
mod tcb_level;
#[cfg(feature = "verify")]
mod verify;
mod x509;

pub type CpuSvn = [u8; 16];
pub type Ppid = [u8; 16];
pub type PceId = [u8; 2];
pub type PceIsvsvn = u16;
pub type PlatformInstanceId = [u8; 16];

pub const CPUSVN_BYTE_LEN: usize = 16;
pub const PPID_BYTE_LEN: usize = 16;
pub const PCEID_BYTE_LEN: usize = 2;
pub const FMSPC_BYTE_LEN: usize = 6;
pub const PLATFORM_INSTANCE_ID_BYTE_LEN: usize = 16;
pub const ECDSA_P256_SIGNATURE_BYTE_LEN: usize = 64;
pub const TDX_MRSIGNER_BYTE_LEN: usize = 48;
pub const TDX_ATTRIBUTES_BYTE_LEN: usize = 8;

/// Number of SVN components in an SGX or TDX TCB vector.
pub const TCB_COMPONENT_COUNT: usize = 16;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// The input does not match the wire schema: wrong ASN.1 or JSON type, missing
        /// mandatory field, malformed date, wrong fixed length.
        Format(msg: String) {
            display("{}", msg)
        }
        /// The input is well formed but its content is not acceptable: unsupported version or
        /// identifier, wrong element count, duplicate TCB levels, missing required extensions.
        InvalidExtension(msg: String) {
            display("{}", msg)
        }
        #[cfg(feature = "verify")]
        SignatureVerification(err: mbedtls::Error) {
            display("Signature verification failed: {}", err)
        }
    }
}

impl Error {
    pub(crate) fn format<S: Into<String>>(msg: S) -> Error {
        Error::Format(msg.into())
    }

    pub(crate) fn invalid_extension<S: Into<String>>(msg: S) -> Error {
        Error::InvalidExtension(msg.into())
    }

    pub fn is_format(&self) -> bool {
        match self {
            Error::Format(_) => true,
            _ => false,
        }
    }

    pub fn is_invalid_extension(&self) -> bool {
        match self {
            Error::InvalidExtension(_) => true,
            _ => false,
        }
    }
}

/// Formats the "report every missing item" error used by all required-item checklists.
pub(crate) fn missing_items_message<T: fmt::Display>(prefix: &str, missing: &[T]) -> String {
    let names = missing.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ");
    format!("{} Missing [{}]", prefix, names)
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Copy, Hash)]
pub enum TcbStatus {
    UpToDate,
    SWHardeningNeeded,
    ConfigurationNeeded,
    ConfigurationAndSWHardeningNeeded,
    OutOfDate,
    OutOfDateConfigurationNeeded,
    Revoked,
}

impl TcbStatus {
    /// The identifier used for this status in TCB Info documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            TcbStatus::UpToDate => "UpToDate",
            TcbStatus::SWHardeningNeeded => "SWHardeningNeeded",
            TcbStatus::ConfigurationNeeded => "ConfigurationNeeded",
            TcbStatus::ConfigurationAndSWHardeningNeeded => "ConfigurationAndSWHardeningNeeded",
            TcbStatus::OutOfDate => "OutOfDate",
            TcbStatus::OutOfDateConfigurationNeeded => "OutOfDateConfigurationNeeded",
            TcbStatus::Revoked => "Revoked",
        }
    }
}

impl TryFrom<&str> for TcbStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, ()> {
        serde_json::from_value(serde_json::Value::String(value.to_owned())).map_err(|_| ())
    }
}

impl fmt::Display for TcbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcbStatus::UpToDate => write!(f, "Up to Date"),
            TcbStatus::SWHardeningNeeded => write!(f, "Software Hardening Needed"),
            TcbStatus::ConfigurationNeeded => write!(f, "Configuration Needed"),
            TcbStatus::ConfigurationAndSWHardeningNeeded => write!(f, "Configuration And Software Hardening Needed"),
            TcbStatus::OutOfDate => write!(f, "Out of Date"),
            TcbStatus::OutOfDateConfigurationNeeded => write!(f, "Out of Date, Configuration Needed"),
            TcbStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcb_status_from_str() {
        for status in &[
            TcbStatus::UpToDate,
            TcbStatus::SWHardeningNeeded,
            TcbStatus::ConfigurationNeeded,
            TcbStatus::ConfigurationAndSWHardeningNeeded,
            TcbStatus::OutOfDate,
            TcbStatus::OutOfDateConfigurationNeeded,
            TcbStatus::Revoked,
        ] {
            assert_eq!(TcbStatus::try_from(status.as_str()), Ok(*status));
        }
        assert_eq!(TcbStatus::try_from("upToDate"), Err(()));
        assert_eq!(TcbStatus::try_from(""), Err(()));
    }

    #[test]
    fn missing_items_have_no_trailing_delimiter() {
        assert_eq!(
            missing_items_message("Required TCB SGX extensions not found.", &["PCESVN", "CPUSVN"]),
            "Required TCB SGX extensions not found. Missing [PCESVN, CPUSVN]"
        );
        assert_eq!(missing_items_message("Prefix.", &["PPID"]), "Prefix. Missing [PPID]");
    }

    #[test]
    fn error_kinds() {
        let err = Error::format("bad");
        assert!(err.is_format());
        assert!(!err.is_invalid_extension());
        assert_eq!(err.to_string(), "bad");
        assert!(Error::invalid_extension("worse").is_invalid_extension());
    }
}
