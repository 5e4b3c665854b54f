use ballot_registry::ErrorCode;
use proof_service::LedgerError;

pub fn assert_rejected<T: std::fmt::Debug>(res: Result<T, LedgerError>, code: ErrorCode) {
    assert_eq!(res.unwrap_err(), LedgerError::Rejected(code))
}
