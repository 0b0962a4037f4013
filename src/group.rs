//! Target port groups and their membership entries
//!
//! A `TargetGroup` owns an ordered list of member target ports and an ordered
//! list of per-device state records. Both lists keep insertion order, which
//! is also the order in which descriptors appear in the REPORT TARGET GROUPS
//! response.

use crate::state::AluaState;

/// Target port membership entry
///
/// Associates one target port with the owning group. The relative target
/// port identifier is what goes into the per-port descriptor on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TgTarget {
    /// Target port identity (owned by the target subsystem)
    pub name: String,
    /// Relative target port identifier
    pub rel_port_id: u16,
}

/// Per-device state record
///
/// Associates one device with the owning group and carries the ALUA state
/// the group reports for that device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TgDev {
    /// Device identity (owned by the device subsystem)
    pub device: String,
    /// Current access state for this (group, device) association
    pub state: AluaState,
}

/// Snapshot of a target group, returned by registry lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupInfo {
    pub name: String,
    pub group_id: u16,
    /// Default state, seeded into new device records
    pub state: AluaState,
    pub target_count: usize,
    pub device_count: usize,
}

/// A target port group
///
/// Groups live inside the registry and are only ever touched under its lock.
/// The group owns its membership entries; destroying the group releases them
/// with it.
#[derive(Debug)]
pub struct TargetGroup {
    name: String,
    group_id: u16,
    state: AluaState,
    tgt_list: Vec<TgTarget>,
    dev_list: Vec<TgDev>,
}

impl TargetGroup {
    pub(crate) fn new(name: &str, group_id: u16) -> Self {
        TargetGroup {
            name: name.to_string(),
            group_id,
            state: AluaState::default(),
            tgt_list: Vec::new(),
            dev_list: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group identifier, fixed at creation for the life of the group
    pub fn group_id(&self) -> u16 {
        self.group_id
    }

    /// Default state for new device records
    pub fn state(&self) -> AluaState {
        self.state
    }

    /// Member target ports, in insertion order
    pub fn targets(&self) -> &[TgTarget] {
        &self.tgt_list
    }

    /// Device state records, in insertion order
    pub fn devices(&self) -> &[TgDev] {
        &self.dev_list
    }

    /// Find the state record for a device, if this group has one
    pub fn find_device(&self, device: &str) -> Option<&TgDev> {
        self.dev_list.iter().find(|dgd| dgd.device == device)
    }

    /// Append a target port membership entry
    ///
    /// Duplicate detection is the target subsystem's responsibility.
    pub(crate) fn add_target(&mut self, name: &str, rel_port_id: u16) {
        self.tgt_list.push(TgTarget {
            name: name.to_string(),
            rel_port_id,
        });
    }

    /// Remove a target port entry; returns false if no such entry
    pub(crate) fn remove_target(&mut self, name: &str) -> bool {
        match self.tgt_list.iter().position(|tgt| tgt.name == name) {
            Some(idx) => {
                self.tgt_list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Create or update the state record for a device
    pub(crate) fn set_device_state(&mut self, device: &str, state: AluaState) {
        match self.dev_list.iter_mut().find(|dgd| dgd.device == device) {
            Some(dgd) => dgd.state = state,
            None => self.dev_list.push(TgDev {
                device: device.to_string(),
                state,
            }),
        }
    }

    /// Remove the state record for a device; returns false if no record
    pub(crate) fn remove_device(&mut self, device: &str) -> bool {
        match self.dev_list.iter().position(|dgd| dgd.device == device) {
            Some(idx) => {
                self.dev_list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Reassign the default state and every existing device record
    pub(crate) fn set_state(&mut self, state: AluaState) {
        self.state = state;
        for dgd in &mut self.dev_list {
            dgd.state = state;
        }
    }

    pub(crate) fn info(&self) -> TargetGroupInfo {
        TargetGroupInfo {
            name: self.name.clone(),
            group_id: self.group_id,
            state: self.state,
            target_count: self.tgt_list.len(),
            device_count: self.dev_list.len(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
