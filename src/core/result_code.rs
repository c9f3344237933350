use std::fmt;

/// The gateway's own verdict on a request
///
/// Every response carries a 16-bit status field; a nonzero value means the
/// gateway refused the request and maps to one of these codes. The verdict
/// is authoritative: a refused request is never retried automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCode {
    /// The version field of the request is not recognized by this gateway
    UnsupportedVersion,
    /// The gateway supports mappings but the feature is administratively
    /// disabled, or the requested operation is against its policy
    NotAuthorized,
    /// The gateway itself has no network connectivity, e.g. it has not
    /// obtained a DHCP lease for its WAN facing side
    NetworkFailure,
    /// The gateway cannot create any more mappings at this time
    OutOfResources,
    /// The opcode of the request is not supported by the gateway
    UnsupportedOpcode,
    /// A status value this client does not recognize
    Unknown(u16),
}

impl ResultCode {
    /// Classifies the status field of a response
    ///
    /// Returns [`None`] for zero, which means success.
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            0 => None,
            1 => Some(Self::UnsupportedVersion),
            2 => Some(Self::NotAuthorized),
            3 => Some(Self::NetworkFailure),
            4 => Some(Self::OutOfResources),
            5 => Some(Self::UnsupportedOpcode),
            n => Some(Self::Unknown(n)),
        }
    }

    /// The numeric value as found in the status field
    pub const fn code(&self) -> u16 {
        match self {
            Self::UnsupportedVersion => 1,
            Self::NotAuthorized => 2,
            Self::NetworkFailure => 3,
            Self::OutOfResources => 4,
            Self::UnsupportedOpcode => 5,
            Self::Unknown(n) => *n,
        }
    }

    pub const fn explain(&self) -> &'static str {
        use ResultCode::*;

        match self {
            UnsupportedVersion => concat!(
                "The version number at the start of the request is not",
                " recognized by this gateway"
            ),

            NotAuthorized => concat!(
                "The gateway supports mappings but the feature is turned",
                " off, or the requested operation is disabled by its policy"
            ),

            NetworkFailure => concat!(
                "The gateway or the device it controls is experiencing a",
                " network failure of some sort"
            ),

            OutOfResources => "The gateway cannot create any more mappings at this time",

            UnsupportedOpcode => "The opcode is not supported by the gateway",

            Unknown(_) => "The gateway reported an error this client does not recognize",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} ({})", self.explain(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ResultCode::from_status(0), None);
        assert_eq!(ResultCode::from_status(1), Some(ResultCode::UnsupportedVersion));
        assert_eq!(ResultCode::from_status(2), Some(ResultCode::NotAuthorized));
        assert_eq!(ResultCode::from_status(3), Some(ResultCode::NetworkFailure));
        assert_eq!(ResultCode::from_status(4), Some(ResultCode::OutOfResources));
        assert_eq!(ResultCode::from_status(5), Some(ResultCode::UnsupportedOpcode));
        assert_eq!(ResultCode::from_status(77), Some(ResultCode::Unknown(77)));
    }

    #[test]
    fn code_roundtrip() {
        for status in 1..10 {
            let code = ResultCode::from_status(status).unwrap();
            assert_eq!(code.code(), status);
        }
    }
}
