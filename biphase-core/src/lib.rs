//! Core types for the Biphase distributed transaction manager.
//!
//! This crate holds the vocabulary shared by every Biphase subsystem: the
//! central error type, XA transaction identifiers and X/Open constants with
//! their string decoders, the resource-manager contract handed to the
//! transaction manager, and the monotonic clock used for observability
//! timestamps.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod xa;

pub use clock::MonotonicClock;
pub use error::{BiphaseError, DriverError, Result};
pub use xa::{
    decode_prepare_vote, decode_resource_flag, TxStatus, XaErrorCode, XaResource, Xid,
    XAER_ASYNC, XAER_DUPID, XAER_INVAL, XAER_NOTA, XAER_OUTSIDE, XAER_PROTO, XAER_RMERR,
    XAER_RMFAIL, XA_HEURCOM, XA_HEURHAZ, XA_HEURMIX, XA_HEURRB, XA_OK, XA_RBBASE,
    XA_RBCOMMFAIL, XA_RBDEADLOCK, XA_RBEND, XA_RBINTEGRITY, XA_RBOTHER, XA_RBPROTO,
    XA_RBROLLBACK, XA_RBTIMEOUT, XA_RBTRANSIENT, XA_RDONLY, XA_TMENDRSCAN, XA_TMFAIL,
    XA_TMJOIN, XA_TMNOFLAGS, XA_TMONEPHASE, XA_TMRESUME, XA_TMSTARTRSCAN, XA_TMSUCCESS,
    XA_TMSUSPEND,
};
