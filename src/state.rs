//! ALUA access states and their wire encoding
//!
//! Asymmetric Logical Unit Access states per the SCSI Primary Commands (SPC)
//! specification. The numeric values are the ASYMMETRIC ACCESS STATE codes
//! carried in the REPORT TARGET GROUPS response.

use std::fmt;

/// ALUA target port group access state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Default)]
pub enum AluaState {
    /// Active/optimized: full-performance path
    #[default]
    ActiveOptimized = 0x00,
    /// Active/non-optimized: usable but degraded path
    ActiveNonOptimized = 0x01,
    /// Standby: path held in reserve, limited command set
    Standby = 0x02,
    /// Unavailable: path cannot service media access commands
    Unavailable = 0x03,
    /// Logical block dependent: state varies per LBA range
    LbaDependent = 0x04,
    /// Offline: port not usable at all
    Offline = 0x0E,
    /// Transitioning between states
    Transitioning = 0x0F,
}

impl AluaState {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(AluaState::ActiveOptimized),
            0x01 => Some(AluaState::ActiveNonOptimized),
            0x02 => Some(AluaState::Standby),
            0x03 => Some(AluaState::Unavailable),
            0x04 => Some(AluaState::LbaDependent),
            0x0E => Some(AluaState::Offline),
            0x0F => Some(AluaState::Transitioning),
            _ => None,
        }
    }

    /// Wire code for the ASYMMETRIC ACCESS STATE field
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Administrative name, as accepted and reported by the management layer
    pub fn name(self) -> &'static str {
        match self {
            AluaState::ActiveOptimized => "active",
            AluaState::ActiveNonOptimized => "nonoptimized",
            AluaState::Standby => "standby",
            AluaState::Unavailable => "unavailable",
            AluaState::LbaDependent => "lba_dependent",
            AluaState::Offline => "offline",
            AluaState::Transitioning => "transitioning",
        }
    }

    /// Parse an administrative state name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(AluaState::ActiveOptimized),
            "nonoptimized" => Some(AluaState::ActiveNonOptimized),
            "standby" => Some(AluaState::Standby),
            "unavailable" => Some(AluaState::Unavailable),
            "lba_dependent" => Some(AluaState::LbaDependent),
            "offline" => Some(AluaState::Offline),
            "transitioning" => Some(AluaState::Transitioning),
            _ => None,
        }
    }
}

impl fmt::Display for AluaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
