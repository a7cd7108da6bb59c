//! Rejection and acceptance counters.
//!
//! The pool's only user-visible failure surface: malformed or invalid
//! input is dropped and counted, never escalated.

use devv_chain::ChainError;
use devv_primitives::ProtocolError;

/// Counters over everything the pool has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Transactions accepted into the pending buffer.
    pub accepted: u64,
    /// Duplicate signatures dropped.
    pub duplicate: u64,
    /// Byte-layout failures.
    pub rejected_malformed: u64,
    /// Signature verification failures.
    pub rejected_signature: u64,
    /// Privileged operations without an INN signer.
    pub rejected_not_inn: u64,
    /// Zero-sum violations.
    pub rejected_asymmetric: u64,
    /// Exchange debits without balance cover.
    pub rejected_insufficient: u64,
}

impl PoolStats {
    /// Count one soundness failure by kind.
    pub fn record_soundness_error(&mut self, error: &ProtocolError) {
        match error {
            ProtocolError::TxAsymmetric { .. } => self.rejected_asymmetric += 1,
            ProtocolError::NotInnSigner => self.rejected_not_inn += 1,
            ProtocolError::BadSignature => self.rejected_signature += 1,
            ProtocolError::SummaryAsymmetric { .. } | ProtocolError::EmptySummary => {
                self.rejected_asymmetric += 1
            }
            _ => self.rejected_malformed += 1,
        }
    }

    /// Count one validity failure by kind.
    pub fn record_validity_error(&mut self, error: &ChainError) {
        match error {
            ChainError::InsufficientFunds { .. } => self.rejected_insufficient += 1,
            ChainError::Protocol(protocol) => self.record_soundness_error(protocol),
            _ => self.rejected_malformed += 1,
        }
    }

    /// Total rejections of any kind.
    pub fn total_rejected(&self) -> u64 {
        self.rejected_malformed
            + self.rejected_signature
            + self.rejected_not_inn
            + self.rejected_asymmetric
            + self.rejected_insufficient
    }
}
