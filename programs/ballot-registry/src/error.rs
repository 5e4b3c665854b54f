use thiserror::Error;

pub type Result<T> = std::result::Result<T, ErrorCode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
    #[error("Proposal list is empty")]
    EmptyProposalList,
    #[error("Invalid proposal index")]
    InvalidProposal,
    #[error("Unknown ballot")]
    UnknownBallot,
    #[error("Ballot is not active")]
    BallotNotActive,
    #[error("Identity has already voted")]
    AlreadyVoted,
    #[error("Invalid merkle proof")]
    InvalidProof,
    #[error("Signer is not authorized")]
    Unauthorized,
    #[error("Tally overflow")]
    TallyOverflow,
}

/// Coarse classification of registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed arguments.
    Validation,
    /// Rejected after reading ballot state.
    State,
    /// Proof did not verify against the stored root.
    Proof,
    /// Signer lacks the capability required by the mutation policy.
    Authorization,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::EmptyProposalList | ErrorCode::InvalidProposal => ErrorKind::Validation,
            ErrorCode::UnknownBallot
            | ErrorCode::BallotNotActive
            | ErrorCode::AlreadyVoted
            | ErrorCode::TallyOverflow => ErrorKind::State,
            ErrorCode::InvalidProof => ErrorKind::Proof,
            ErrorCode::Unauthorized => ErrorKind::Authorization,
        }
    }
}

/// Returns early with the given error when the condition does not hold.
#[macro_export]
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err);
        }
    };
}
