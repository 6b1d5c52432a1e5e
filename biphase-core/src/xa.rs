//! XA two-phase-commit vocabulary.
//!
//! Transaction branch identifiers, the X/Open flag and return-code
//! constants, string decoders for diagnostics, and the synchronous
//! resource-manager contract handed to the transaction manager.

use std::fmt;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::error::DriverError;

// ============================================================================
// XA Flags (from X/Open XA specification)
// ============================================================================

/// No flags set.
pub const XA_TMNOFLAGS: i32 = 0x00000000;

/// Caller is joining existing transaction branch.
pub const XA_TMJOIN: i32 = 0x00200000;

/// Caller is resuming association with suspended transaction branch.
pub const XA_TMRESUME: i32 = 0x08000000;

/// Dissociate caller from transaction branch - successful.
pub const XA_TMSUCCESS: i32 = 0x04000000;

/// Dissociate caller from transaction branch - failed.
pub const XA_TMFAIL: i32 = 0x20000000;

/// Caller is suspending (not ending) its association with transaction branch.
pub const XA_TMSUSPEND: i32 = 0x02000000;

/// Start a recovery scan.
pub const XA_TMSTARTRSCAN: i32 = 0x01000000;

/// End a recovery scan.
pub const XA_TMENDRSCAN: i32 = 0x00800000;

/// Use one-phase commit optimization.
pub const XA_TMONEPHASE: i32 = 0x40000000;

// ============================================================================
// XA Return Codes
// ============================================================================

/// Normal execution.
pub const XA_OK: i32 = 0;

/// The transaction branch has been read-only and has been committed.
pub const XA_RDONLY: i32 = 3;

/// The transaction work was rolled back (heuristically).
pub const XA_HEURRB: i32 = 6;

/// The transaction work was committed (heuristically).
pub const XA_HEURCOM: i32 = 7;

/// The transaction work may have been committed or rolled back (heuristic hazard).
pub const XA_HEURHAZ: i32 = 8;

/// The transaction work was partially committed and partially rolled back (heuristic mixed).
pub const XA_HEURMIX: i32 = 5;

// ============================================================================
// XA Error Codes
// ============================================================================

/// Base of the rollback error code range.
pub const XA_RBBASE: i32 = 100;

/// Rollback was caused by unspecified reason.
pub const XA_RBROLLBACK: i32 = XA_RBBASE;

/// Rollback was caused by communication failure.
pub const XA_RBCOMMFAIL: i32 = XA_RBBASE + 1;

/// A deadlock was detected.
pub const XA_RBDEADLOCK: i32 = XA_RBBASE + 2;

/// A condition that violates the integrity of the resource was detected.
pub const XA_RBINTEGRITY: i32 = XA_RBBASE + 3;

/// The resource manager rolled back for a reason not listed.
pub const XA_RBOTHER: i32 = XA_RBBASE + 4;

/// A protocol error occurred in the resource manager.
pub const XA_RBPROTO: i32 = XA_RBBASE + 5;

/// A transaction branch took too long.
pub const XA_RBTIMEOUT: i32 = XA_RBBASE + 6;

/// May retry the transaction branch.
pub const XA_RBTRANSIENT: i32 = XA_RBBASE + 7;

/// Upper bound of rollback error codes.
pub const XA_RBEND: i32 = XA_RBTRANSIENT;

/// Asynchronous operation already outstanding.
pub const XAER_ASYNC: i32 = -2;

/// A resource manager error occurred in the transaction branch.
pub const XAER_RMERR: i32 = -3;

/// The XID is not valid.
pub const XAER_NOTA: i32 = -4;

/// Invalid arguments were given.
pub const XAER_INVAL: i32 = -5;

/// Routine invoked in an improper context.
pub const XAER_PROTO: i32 = -6;

/// Resource manager unavailable.
pub const XAER_RMFAIL: i32 = -7;

/// The XID already exists.
pub const XAER_DUPID: i32 = -8;

/// Resource manager doing work outside a global transaction.
pub const XAER_OUTSIDE: i32 = -9;

// ============================================================================
// XA Transaction Identifier (Xid)
// ============================================================================

/// XA transaction branch identifier following the X/Open XA specification.
///
/// An Xid uniquely identifies a global transaction and one of its branches.
/// The binary encoding produced by [`Xid::to_bytes`] is the form recorded
/// in the transaction journal and replayed during recovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    /// Maximum length for the global transaction ID.
    pub const MAXGTRIDSIZE: usize = 64;
    /// Maximum length for the branch qualifier.
    pub const MAXBQUALSIZE: usize = 64;

    /// Creates a new XA transaction branch identifier.
    ///
    /// # Panics
    ///
    /// Panics if `global_transaction_id` or `branch_qualifier` exceeds the
    /// maximum size.
    pub fn new(format_id: i32, global_transaction_id: &[u8], branch_qualifier: &[u8]) -> Self {
        assert!(
            global_transaction_id.len() <= Self::MAXGTRIDSIZE,
            "global transaction ID exceeds maximum size of {} bytes",
            Self::MAXGTRIDSIZE
        );
        assert!(
            branch_qualifier.len() <= Self::MAXBQUALSIZE,
            "branch qualifier exceeds maximum size of {} bytes",
            Self::MAXBQUALSIZE
        );

        Self {
            format_id,
            global_transaction_id: global_transaction_id.to_vec(),
            branch_qualifier: branch_qualifier.to_vec(),
        }
    }

    /// Generates a new random Xid with the default format ID.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        Self::new(0, uuid.as_bytes(), &[0u8; 8])
    }

    /// Returns the format identifier.
    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// Returns the global transaction identifier.
    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    /// Returns the branch qualifier.
    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }

    /// Returns the global transaction identifier as a hex string.
    ///
    /// This is the form used when reporting which transactions hold a
    /// pooled resource.
    pub fn gtrid_hex(&self) -> String {
        self.global_transaction_id
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }

    /// Appends the journal encoding of this Xid to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.format_id);
        buf.put_i32_le(self.global_transaction_id.len() as i32);
        buf.put_slice(&self.global_transaction_id);
        buf.put_i32_le(self.branch_qualifier.len() as i32);
        buf.put_slice(&self.branch_qualifier);
    }

    /// Serializes the Xid to its journal encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(
            4 + 4 + self.global_transaction_id.len() + 4 + self.branch_qualifier.len(),
        );
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Deserializes an Xid from its journal encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DriverError> {
        fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
            let raw = bytes.get(offset..offset + 4)?;
            Some(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }

        let format_id =
            read_i32(bytes, 0).ok_or_else(|| DriverError::new("Xid data too short"))?;
        let gtrid_len = read_i32(bytes, 4)
            .ok_or_else(|| DriverError::new("Xid data too short"))? as usize;
        let gtrid = bytes
            .get(8..8 + gtrid_len)
            .ok_or_else(|| DriverError::new("Xid data too short for global transaction ID"))?;
        let bqual_offset = 8 + gtrid_len;
        let bqual_len = read_i32(bytes, bqual_offset)
            .ok_or_else(|| DriverError::new("Xid data too short for branch qualifier"))?
            as usize;
        let bqual = bytes
            .get(bqual_offset + 4..bqual_offset + 4 + bqual_len)
            .ok_or_else(|| DriverError::new("Xid data too short for branch qualifier"))?;

        if gtrid_len > Self::MAXGTRIDSIZE || bqual_len > Self::MAXBQUALSIZE {
            return Err(DriverError::new("Xid component exceeds maximum size"));
        }

        Ok(Self {
            format_id,
            global_transaction_id: gtrid.to_vec(),
            branch_qualifier: bqual.to_vec(),
        })
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an XID of format {} with GTRID [", self.format_id)?;
        for byte in &self.global_transaction_id {
            write!(f, "{byte:02X}")?;
        }
        write!(f, "] and BQUAL [")?;
        for byte in &self.branch_qualifier {
            write!(f, "{byte:02X}")?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// Constant decoders
// ============================================================================

/// XA error codes reported by resource managers.
///
/// These correspond to the `errorCode` values of the X/Open XA
/// specification and enable the transaction manager to distinguish
/// rollback, heuristic, and resource-manager failure families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XaErrorCode {
    /// Rollback for an unspecified reason.
    RbRollback,
    /// Rollback caused by a communication failure.
    RbCommFail,
    /// Rollback caused by a detected deadlock.
    RbDeadlock,
    /// Rollback caused by an integrity violation.
    RbIntegrity,
    /// Rollback for a reason not otherwise listed.
    RbOther,
    /// Rollback caused by a protocol error in the resource manager.
    RbProto,
    /// Rollback because the branch took too long.
    RbTimeout,
    /// Rollback; the branch may be retried.
    RbTransient,
    /// The branch was heuristically committed.
    HeurCom,
    /// The branch outcome is a heuristic hazard.
    HeurHaz,
    /// The branch was partially committed and partially rolled back.
    HeurMix,
    /// The branch was heuristically rolled back.
    HeurRb,
    /// A resource manager error occurred.
    RmErr,
    /// The resource manager is unavailable.
    RmFail,
    /// The XID is not valid.
    NotA,
    /// Invalid arguments were given.
    Inval,
    /// Routine invoked in an improper context.
    Proto,
    /// An asynchronous operation is already outstanding.
    Async,
    /// The XID already exists.
    DupId,
    /// Work is being done outside a global transaction.
    Outside,
}

impl XaErrorCode {
    /// Creates an `XaErrorCode` from its numeric value.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            XA_RBROLLBACK => Some(Self::RbRollback),
            XA_RBCOMMFAIL => Some(Self::RbCommFail),
            XA_RBDEADLOCK => Some(Self::RbDeadlock),
            XA_RBINTEGRITY => Some(Self::RbIntegrity),
            XA_RBOTHER => Some(Self::RbOther),
            XA_RBPROTO => Some(Self::RbProto),
            XA_RBTIMEOUT => Some(Self::RbTimeout),
            XA_RBTRANSIENT => Some(Self::RbTransient),
            XA_HEURCOM => Some(Self::HeurCom),
            XA_HEURHAZ => Some(Self::HeurHaz),
            XA_HEURMIX => Some(Self::HeurMix),
            XA_HEURRB => Some(Self::HeurRb),
            XAER_RMERR => Some(Self::RmErr),
            XAER_RMFAIL => Some(Self::RmFail),
            XAER_NOTA => Some(Self::NotA),
            XAER_INVAL => Some(Self::Inval),
            XAER_PROTO => Some(Self::Proto),
            XAER_ASYNC => Some(Self::Async),
            XAER_DUPID => Some(Self::DupId),
            XAER_OUTSIDE => Some(Self::Outside),
            _ => None,
        }
    }

    /// Returns the numeric value of this error code.
    pub fn value(self) -> i32 {
        match self {
            Self::RbRollback => XA_RBROLLBACK,
            Self::RbCommFail => XA_RBCOMMFAIL,
            Self::RbDeadlock => XA_RBDEADLOCK,
            Self::RbIntegrity => XA_RBINTEGRITY,
            Self::RbOther => XA_RBOTHER,
            Self::RbProto => XA_RBPROTO,
            Self::RbTimeout => XA_RBTIMEOUT,
            Self::RbTransient => XA_RBTRANSIENT,
            Self::HeurCom => XA_HEURCOM,
            Self::HeurHaz => XA_HEURHAZ,
            Self::HeurMix => XA_HEURMIX,
            Self::HeurRb => XA_HEURRB,
            Self::RmErr => XAER_RMERR,
            Self::RmFail => XAER_RMFAIL,
            Self::NotA => XAER_NOTA,
            Self::Inval => XAER_INVAL,
            Self::Proto => XAER_PROTO,
            Self::Async => XAER_ASYNC,
            Self::DupId => XAER_DUPID,
            Self::Outside => XAER_OUTSIDE,
        }
    }

    /// Returns `true` if this code belongs to the rollback family.
    pub fn is_rollback(self) -> bool {
        (XA_RBBASE..=XA_RBEND).contains(&self.value())
    }

    /// Returns `true` if this code reports a heuristic outcome.
    pub fn is_heuristic(self) -> bool {
        matches!(self, Self::HeurCom | Self::HeurHaz | Self::HeurMix | Self::HeurRb)
    }
}

impl fmt::Display for XaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RbRollback => write!(f, "XA_RBROLLBACK"),
            Self::RbCommFail => write!(f, "XA_RBCOMMFAIL"),
            Self::RbDeadlock => write!(f, "XA_RBDEADLOCK"),
            Self::RbIntegrity => write!(f, "XA_RBINTEGRITY"),
            Self::RbOther => write!(f, "XA_RBOTHER"),
            Self::RbProto => write!(f, "XA_RBPROTO"),
            Self::RbTimeout => write!(f, "XA_RBTIMEOUT"),
            Self::RbTransient => write!(f, "XA_RBTRANSIENT"),
            Self::HeurCom => write!(f, "XA_HEURCOM"),
            Self::HeurHaz => write!(f, "XA_HEURHAZ"),
            Self::HeurMix => write!(f, "XA_HEURMIX"),
            Self::HeurRb => write!(f, "XA_HEURRB"),
            Self::RmErr => write!(f, "XAER_RMERR"),
            Self::RmFail => write!(f, "XAER_RMFAIL"),
            Self::NotA => write!(f, "XAER_NOTA"),
            Self::Inval => write!(f, "XAER_INVAL"),
            Self::Proto => write!(f, "XAER_PROTO"),
            Self::Async => write!(f, "XAER_ASYNC"),
            Self::DupId => write!(f, "XAER_DUPID"),
            Self::Outside => write!(f, "XAER_OUTSIDE"),
        }
    }
}

/// Decodes an XA resource flag into its specification name.
pub fn decode_resource_flag(flag: i32) -> String {
    match flag {
        XA_TMNOFLAGS => "NOFLAGS".to_string(),
        XA_TMJOIN => "JOIN".to_string(),
        XA_TMRESUME => "RESUME".to_string(),
        XA_TMSUCCESS => "SUCCESS".to_string(),
        XA_TMFAIL => "FAIL".to_string(),
        XA_TMSUSPEND => "SUSPEND".to_string(),
        XA_TMSTARTRSCAN => "STARTRSCAN".to_string(),
        XA_TMENDRSCAN => "ENDRSCAN".to_string(),
        XA_TMONEPHASE => "ONEPHASE".to_string(),
        other => format!("!invalid flag ({other})!"),
    }
}

/// Decodes a prepare vote into its specification name.
pub fn decode_prepare_vote(vote: i32) -> String {
    match vote {
        XA_OK => "XA_OK".to_string(),
        XA_RDONLY => "XA_RDONLY".to_string(),
        other => format!("!invalid return code ({other})!"),
    }
}

// ============================================================================
// Transaction status
// ============================================================================

/// Status of a global transaction as reported by the transaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// The transaction is active.
    Active,
    /// The transaction has been marked for rollback only.
    MarkedRollback,
    /// The transaction has been prepared.
    Prepared,
    /// The transaction has been committed.
    Committed,
    /// The transaction has been rolled back.
    RolledBack,
    /// The transaction status is unknown.
    Unknown,
    /// No transaction is associated with the current context.
    NoTransaction,
    /// The transaction is in the prepare phase.
    Preparing,
    /// The transaction is in the commit phase.
    Committing,
    /// The transaction is rolling back.
    RollingBack,
}

impl TxStatus {
    /// Creates a `TxStatus` from its numeric value.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Active),
            1 => Some(Self::MarkedRollback),
            2 => Some(Self::Prepared),
            3 => Some(Self::Committed),
            4 => Some(Self::RolledBack),
            5 => Some(Self::Unknown),
            6 => Some(Self::NoTransaction),
            7 => Some(Self::Preparing),
            8 => Some(Self::Committing),
            9 => Some(Self::RollingBack),
            _ => None,
        }
    }

    /// Returns the numeric value of this status.
    pub fn value(self) -> i32 {
        match self {
            Self::Active => 0,
            Self::MarkedRollback => 1,
            Self::Prepared => 2,
            Self::Committed => 3,
            Self::RolledBack => 4,
            Self::Unknown => 5,
            Self::NoTransaction => 6,
            Self::Preparing => 7,
            Self::Committing => 8,
            Self::RollingBack => 9,
        }
    }

    /// Returns the specification name of this status.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::MarkedRollback => "MARKED_ROLLBACK",
            Self::Prepared => "PREPARED",
            Self::Committed => "COMMITTED",
            Self::RolledBack => "ROLLEDBACK",
            Self::Unknown => "UNKNOWN",
            Self::NoTransaction => "NO_TRANSACTION",
            Self::Preparing => "PREPARING",
            Self::Committing => "COMMITTING",
            Self::RollingBack => "ROLLING_BACK",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// XA Resource contract
// ============================================================================

/// The resource-manager contract following the X/Open XA specification.
///
/// Vendor drivers expose this for every physical connection; the
/// transaction manager drives it during two-phase commit and recovery.
/// All calls block on synchronous driver I/O.
pub trait XaResource: Send + Sync {
    /// Starts work on behalf of a transaction branch.
    ///
    /// `flags` is one of [`XA_TMNOFLAGS`], [`XA_TMJOIN`], or [`XA_TMRESUME`].
    fn start(&self, xid: &Xid, flags: i32) -> Result<(), DriverError>;

    /// Ends work on behalf of a transaction branch.
    ///
    /// `flags` is one of [`XA_TMSUCCESS`], [`XA_TMFAIL`], or [`XA_TMSUSPEND`].
    fn end(&self, xid: &Xid, flags: i32) -> Result<(), DriverError>;

    /// Prepares the transaction branch for commit.
    ///
    /// Returns [`XA_OK`] if the branch can be committed, or [`XA_RDONLY`]
    /// if the branch was read-only and has been committed.
    fn prepare(&self, xid: &Xid) -> Result<i32, DriverError>;

    /// Commits the transaction branch.
    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), DriverError>;

    /// Rolls back the transaction branch.
    fn rollback(&self, xid: &Xid) -> Result<(), DriverError>;

    /// Forgets about a heuristically completed transaction branch.
    fn forget(&self, xid: &Xid) -> Result<(), DriverError>;

    /// Obtains the list of prepared transaction branches.
    ///
    /// `flags` is one of [`XA_TMSTARTRSCAN`], [`XA_TMENDRSCAN`], or
    /// [`XA_TMNOFLAGS`].
    fn recover(&self, flags: i32) -> Result<Vec<Xid>, DriverError>;

    /// Returns the transaction timeout value.
    fn transaction_timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Sets the transaction timeout value.
    ///
    /// Returns `true` if the timeout was set successfully.
    fn set_transaction_timeout(&self, _timeout: Duration) -> bool {
        false
    }

    /// Determines whether this resource manager is the same as `other`.
    ///
    /// The transaction manager uses this to join branches instead of
    /// creating new ones when two resources reach the same backend.
    /// Defaults to `false`, which is always safe: distinct branches are
    /// merely less efficient.
    fn is_same_rm(&self, _other: &dyn XaResource) -> bool {
        false
    }
}
