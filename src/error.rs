//! Error types for benefit calculation and data loading
//!
//! Lookup failures (unknown region, unknown species, missing curve set) abort
//! the whole batch. Load failures are reported to whoever asked for the reload
//! and never replace the generation already being served.

use thiserror::Error;

/// Broad classification used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A region, species code or curve set is missing from the loaded data
    DataIntegrity,
    /// Backing files are missing or malformed, or process config is invalid
    Configuration,
    /// Caller passed vectors that do not line up with the factor table
    ContractViolation,
}

#[derive(Debug, Error)]
pub enum EcoError {
    #[error("region '{0}' not found in species map")]
    UnknownRegion(String),

    #[error("unknown species code '{code}' for region '{region}'")]
    UnknownSpecies { region: String, code: String },

    #[error("region '{0}' not loaded")]
    RegionNotLoaded(String),

    #[error("failed to load benefit data: {0:#}")]
    Load(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("expected {expected} factor values, got {actual}")]
    FactorMismatch { expected: usize, actual: usize },
}

impl EcoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EcoError::UnknownRegion(_)
            | EcoError::UnknownSpecies { .. }
            | EcoError::RegionNotLoaded(_) => ErrorKind::DataIntegrity,
            EcoError::Load(_) | EcoError::Config(_) => ErrorKind::Configuration,
            EcoError::FactorMismatch { .. } => ErrorKind::ContractViolation,
        }
    }
}

pub type EcoResult<T> = Result<T, EcoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let unknown = EcoError::UnknownSpecies {
            region: "NoEastXXX".to_string(),
            code: "ZZZZ".to_string(),
        };
        assert_eq!(unknown.kind(), ErrorKind::DataIntegrity);
        assert_eq!(
            EcoError::RegionNotLoaded("X".into()).kind(),
            ErrorKind::DataIntegrity
        );
        assert_eq!(
            EcoError::Config("bad port".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            EcoError::FactorMismatch { expected: 15, actual: 3 }.kind(),
            ErrorKind::ContractViolation
        );
    }

    #[test]
    fn test_messages_name_region_and_code() {
        let err = EcoError::UnknownSpecies {
            region: "LoMidWXXX".to_string(),
            code: "NOPE".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LoMidWXXX"));
        assert!(msg.contains("NOPE"));
    }
}
