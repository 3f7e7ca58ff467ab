//! Native protocol version definitions.

use std::fmt;

use super::error::ProtocolError;

/// Native protocol versions.
///
/// OSS versions use their plain number as the wire code. DSE versions set
/// bit 6 (0x40) on top of a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolVersion {
    /// Protocol v3
    V3 = 0x03,
    /// Protocol v4
    V4 = 0x04,
    /// Protocol v5
    V5 = 0x05,
    /// DSE protocol v1 - Added continuous paging
    DseV1 = 0x41,
    /// DSE protocol v2 - Continuous paging backpressure (page revision)
    DseV2 = 0x42,
}

impl ProtocolVersion {
    /// All known versions, newest first.
    pub const ALL: [ProtocolVersion; 5] = [
        ProtocolVersion::DseV2,
        ProtocolVersion::DseV1,
        ProtocolVersion::V5,
        ProtocolVersion::V4,
        ProtocolVersion::V3,
    ];

    /// Create a version from its wire code.
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            0x03 => Ok(ProtocolVersion::V3),
            0x04 => Ok(ProtocolVersion::V4),
            0x05 => Ok(ProtocolVersion::V5),
            0x41 => Ok(ProtocolVersion::DseV1),
            0x42 => Ok(ProtocolVersion::DseV2),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }

    /// Get the wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Check if this is a DSE-specific version.
    pub fn is_dse(self) -> bool {
        self.code() & 0x40 != 0
    }

    /// Check if this version supports the continuous paging extension.
    pub fn supports_continuous_paging(self) -> bool {
        matches!(self, ProtocolVersion::DseV1 | ProtocolVersion::DseV2)
    }

    /// Check if this version lets the client request more continuous pages.
    pub fn supports_page_revision(self) -> bool {
        matches!(self, ProtocolVersion::DseV2)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V3 => write!(f, "V3"),
            ProtocolVersion::V4 => write!(f, "V4"),
            ProtocolVersion::V5 => write!(f, "V5"),
            ProtocolVersion::DseV1 => write!(f, "DSE_V1"),
            ProtocolVersion::DseV2 => write!(f, "DSE_V2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_codes() {
        assert_eq!(ProtocolVersion::V4.code(), 0x04);
        assert_eq!(ProtocolVersion::DseV2.code(), 0x42);
        assert_eq!(ProtocolVersion::from_code(0x41), Ok(ProtocolVersion::DseV1));
        assert_eq!(
            ProtocolVersion::from_code(0x07),
            Err(ProtocolError::UnsupportedVersion(0x07))
        );
    }

    #[test]
    fn test_is_dse() {
        assert!(!ProtocolVersion::V5.is_dse());
        assert!(ProtocolVersion::DseV1.is_dse());
    }

    #[test]
    fn test_supports_continuous_paging() {
        assert!(!ProtocolVersion::V3.supports_continuous_paging());
        assert!(!ProtocolVersion::V4.supports_continuous_paging());
        assert!(!ProtocolVersion::V5.supports_continuous_paging());
        assert!(ProtocolVersion::DseV1.supports_continuous_paging());
        assert!(ProtocolVersion::DseV2.supports_continuous_paging());
    }

    #[test]
    fn test_supports_page_revision() {
        assert!(!ProtocolVersion::DseV1.supports_page_revision());
        assert!(ProtocolVersion::DseV2.supports_page_revision());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::V4.to_string(), "V4");
        assert_eq!(ProtocolVersion::DseV2.to_string(), "DSE_V2");
    }

    #[test]
    fn test_all_versions() {
        assert_eq!(ProtocolVersion::ALL.len(), 5);
        assert_eq!(ProtocolVersion::ALL[0], ProtocolVersion::DseV2);
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_code(version.code()), Ok(version));
        }
    }
}
