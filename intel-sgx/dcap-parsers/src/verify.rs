/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! ECDSA P-256 / SHA-256 signature checks of certificates and TCB Info documents.

use std::ffi::CString;

use mbedtls::alloc::Box as MbedtlsBox;
use mbedtls::hash::{Md, Type};
use mbedtls::x509::Certificate as MbedtlsCertificate;

use crate::tcb_info::TcbInfo;
use crate::x509::Certificate;
use crate::Error;

fn signing_certificate(certificate: &Certificate) -> Result<MbedtlsBox<MbedtlsCertificate>, Error> {
    let pem = CString::new(certificate.pem()).map_err(|_| Error::format("Certificate PEM contains a NUL byte"))?;
    MbedtlsCertificate::from_pem(pem.as_bytes_with_nul()).map_err(Error::SignatureVerification)
}

/// Verifies the DER encoded ECDSA `signature` over `data` with the key of `signer`.
fn verify(signer: &Certificate, data: &[u8], signature: &[u8]) -> Result<(), Error> {
    let mut hash = [0u8; 32];
    Md::hash(Type::Sha256, data, &mut hash).map_err(Error::SignatureVerification)?;
    let mut signer = signing_certificate(signer)?;
    signer
        .public_key_mut()
        .verify(Type::Sha256, &hash, signature)
        .map_err(Error::SignatureVerification)
}

/// Converts a raw `r || s` ECDSA signature into its DER `Ecdsa-Sig-Value` encoding.
fn ecdsa_sig_der(sig: &[u8]) -> Result<Vec<u8>, Error> {
    if sig.len() % 2 != 0 {
        return Err(Error::format("ECDSA signature should consist of two integers of equal length"));
    }

    let (r_bytes, s_bytes) = sig.split_at(sig.len() / 2);
    let r = num::BigUint::from_bytes_be(r_bytes);
    let s = num::BigUint::from_bytes_be(s_bytes);

    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_biguint(&r);
            writer.next().write_biguint(&s);
        })
    }))
}

impl Certificate {
    /// Checks that this certificate was signed by the key of `issuer`. Neither validity periods
    /// nor the chain up to a trusted root are checked.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<(), Error> {
        verify(issuer, self.info(), self.signature().raw_der()).map_err(|e| {
            warn!("Signature of [{}] does not verify against [{}]: {}", self.subject().raw(), issuer.subject().raw(), e);
            e
        })
    }
}

impl TcbInfo {
    /// Checks the document signature against the key of the TCB signing certificate.
    pub fn verify_signature(&self, signer: &Certificate) -> Result<(), Error> {
        let signature = ecdsa_sig_der(self.signature())?;
        verify(signer, self.info_body(), &signature).map_err(|e| {
            warn!("TCB Info for FMSPC [{}] does not verify against [{}]: {}", self.fmspc(), signer.subject().raw(), e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_CA: &str = include_str!("../tests/data/intel_sgx_root_ca.pem");

    #[test]
    fn self_signed_root() {
        let root = Certificate::parse(ROOT_CA).unwrap();
        assert!(root.verify_signed_by(&root).is_ok());
    }

    #[test]
    fn sig_der() {
        let mut raw = [0u8; 64];
        raw[31] = 1;
        raw[32] = 0x80;
        let der = ecdsa_sig_der(&raw).unwrap();
        let signature = crate::x509::Signature::from_der(der).unwrap();
        assert_eq!(signature.r(), &[1]);
        assert_eq!(signature.s()[0], 0x80);
        assert_eq!(signature.s().len(), 32);

        assert!(ecdsa_sig_der(&raw[..63]).is_err());
    }

    #[test]
    fn tcb_info_signed_by_other_key() {
        let root = Certificate::parse(ROOT_CA).unwrap();
        let tcb_info = TcbInfo::parse(include_str!("../tests/data/tcb_info_v2.json")).unwrap();
        match tcb_info.verify_signature(&root) {
            Err(Error::SignatureVerification(_)) => (),
            e => panic!("wrong result: {:?}", e),
        }
    }
}
