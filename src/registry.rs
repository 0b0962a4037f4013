//! Target group registry and its locking discipline
//!
//! One process-wide registry owns every target port group. A single mutex
//! serializes all registry, membership and state operations, including both
//! passes of response encoding; ALUA changes are rare enough that global
//! serialization costs nothing and rules out torn reads on the group lists.
//!
//! Administrative calls (`create_group`, `destroy_group`) acquire the lock
//! interruptibly: the caller hands in a [`CancelToken`] and gets
//! `AluaError::Cancelled` back, with no change made, if the token fires
//! while the call is still waiting. Read paths block uninterruptibly; the
//! critical sections are short and never call back out of this crate.

use crate::error::{AluaError, AluaResult};
use crate::group::{TargetGroup, TargetGroupInfo, TgDev, TgTarget};
use crate::report;
use crate::state::AluaState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;

/// Cancellation flag for interruptible lock acquisition
///
/// Clones share the same flag, so one handle can be parked with the
/// administrative caller while another is cancelled from a signal handler
/// or shutdown path.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of any call waiting on this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Registry of target port groups
///
/// Groups are kept in creation order; that order is also the order of the
/// target port group descriptors in the REPORT TARGET GROUPS response.
#[derive(Debug, Default)]
pub struct AluaRegistry {
    groups: Mutex<Vec<TargetGroup>>,
}

impl AluaRegistry {
    pub fn new() -> Self {
        AluaRegistry {
            groups: Mutex::new(Vec::new()),
        }
    }

    /// Uninterruptible acquisition for read paths.
    ///
    /// A poisoned lock means a panic fired inside a critical section (the
    /// encoder's fill canary); the registry view can no longer be trusted.
    fn lock(&self) -> MutexGuard<'_, Vec<TargetGroup>> {
        self.groups.lock().expect("ALUA registry lock poisoned")
    }

    /// Interruptible acquisition for administrative calls.
    fn lock_interruptible(
        &self,
        cancel: &CancelToken,
    ) -> AluaResult<MutexGuard<'_, Vec<TargetGroup>>> {
        loop {
            if cancel.is_cancelled() {
                return Err(AluaError::Cancelled);
            }
            match self.groups.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => thread::yield_now(),
                Err(TryLockError::Poisoned(err)) => {
                    panic!("ALUA registry lock poisoned: {}", err)
                }
            }
        }
    }

    /// Create a new, empty target group
    ///
    /// The group id is auto-assigned: the lowest identifier >= 1 not held by
    /// a live group. It stays fixed for the life of the group.
    pub fn create_group(&self, name: &str, cancel: &CancelToken) -> AluaResult<TargetGroupInfo> {
        self.do_create(name, None, cancel)
    }

    /// Create a new target group with a caller-chosen group id
    ///
    /// Fails with `AlreadyExists` if a live group already holds the id.
    pub fn create_group_with_id(
        &self,
        name: &str,
        group_id: u16,
        cancel: &CancelToken,
    ) -> AluaResult<TargetGroupInfo> {
        self.do_create(name, Some(group_id), cancel)
    }

    fn do_create(
        &self,
        name: &str,
        group_id: Option<u16>,
        cancel: &CancelToken,
    ) -> AluaResult<TargetGroupInfo> {
        if name.is_empty() {
            return Err(AluaError::InvalidArgument("empty group name".to_string()));
        }

        let mut groups = self.lock_interruptible(cancel)?;

        if groups.iter().any(|tg| tg.name() == name) {
            return Err(AluaError::AlreadyExists(format!("target group '{}'", name)));
        }

        let group_id = match group_id {
            Some(id) => {
                if groups.iter().any(|tg| tg.group_id() == id) {
                    return Err(AluaError::AlreadyExists(format!("group id {}", id)));
                }
                id
            }
            None => next_free_group_id(&groups)?,
        };

        let tg = TargetGroup::new(name, group_id);
        let info = tg.info();
        groups.try_reserve(1)?;
        groups.push(tg);

        log::info!("created target group '{}' with group id {}", name, group_id);
        Ok(info)
    }

    /// Destroy a target group and release all its membership entries
    ///
    /// The group and every target/device entry it owns go away under the
    /// same lock acquisition; no intermediate state is observable.
    pub fn destroy_group(&self, name: &str, cancel: &CancelToken) -> AluaResult<()> {
        let mut groups = self.lock_interruptible(cancel)?;

        let idx = groups
            .iter()
            .position(|tg| tg.name() == name)
            .ok_or_else(|| AluaError::NotFound(format!("target group '{}'", name)))?;

        let tg = groups.remove(idx);
        log::info!(
            "destroyed target group '{}' ({} targets, {} devices)",
            name,
            tg.targets().len(),
            tg.devices().len()
        );
        Ok(())
    }

    /// Tear down every group (module unload path)
    pub fn clear(&self) {
        let mut groups = self.lock();
        let count = groups.len();
        groups.clear();
        if count > 0 {
            log::info!("cleared {} target groups", count);
        }
    }

    /// Look up a group by name
    pub fn lookup_group(&self, name: &str) -> AluaResult<TargetGroupInfo> {
        let groups = self.lock();
        groups
            .iter()
            .find(|tg| tg.name() == name)
            .map(|tg| tg.info())
            .ok_or_else(|| AluaError::NotFound(format!("target group '{}'", name)))
    }

    /// Look up the first group (registry order) holding a state record for
    /// a device
    pub fn lookup_group_by_device(&self, device: &str) -> AluaResult<TargetGroupInfo> {
        let groups = self.lock();
        groups
            .iter()
            .find(|tg| tg.find_device(device).is_some())
            .map(|tg| tg.info())
            .ok_or_else(|| AluaError::NotFound(format!("no target group for device '{}'", device)))
    }

    /// Group names in registry (creation) order
    pub fn group_names(&self) -> Vec<String> {
        let groups = self.lock();
        groups.iter().map(|tg| tg.name().to_string()).collect()
    }

    /// Member target ports of a group, in insertion order
    pub fn group_targets(&self, group: &str) -> AluaResult<Vec<TgTarget>> {
        let groups = self.lock();
        let tg = find_group(&groups, group)?;
        Ok(tg.targets().to_vec())
    }

    /// Device state records of a group, in insertion order
    pub fn group_devices(&self, group: &str) -> AluaResult<Vec<TgDev>> {
        let groups = self.lock();
        let tg = find_group(&groups, group)?;
        Ok(tg.devices().to_vec())
    }

    /// Append a target port to a group's member list
    pub fn add_target(&self, group: &str, target: &str, rel_port_id: u16) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        tg.add_target(target, rel_port_id);
        log::debug!(
            "added target '{}' (rel port id {}) to group '{}'",
            target,
            rel_port_id,
            group
        );
        Ok(())
    }

    /// Remove a target port from a group's member list
    pub fn remove_target(&self, group: &str, target: &str) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        if !tg.remove_target(target) {
            return Err(AluaError::NotFound(format!(
                "target '{}' in group '{}'",
                target, group
            )));
        }
        log::debug!("removed target '{}' from group '{}'", target, group);
        Ok(())
    }

    /// Create or update the state record for a (group, device) pair
    pub fn add_device_state(
        &self,
        group: &str,
        device: &str,
        state: AluaState,
    ) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        tg.set_device_state(device, state);
        log::debug!(
            "device '{}' in group '{}' set to state '{}'",
            device,
            group,
            state
        );
        Ok(())
    }

    /// Add a device record seeded with the group's default state
    pub fn add_device(&self, group: &str, device: &str) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        let state = tg.state();
        tg.set_device_state(device, state);
        log::debug!(
            "device '{}' added to group '{}' with default state '{}'",
            device,
            group,
            state
        );
        Ok(())
    }

    /// Remove the state record for a (group, device) pair
    pub fn remove_device(&self, group: &str, device: &str) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        if !tg.remove_device(device) {
            return Err(AluaError::NotFound(format!(
                "device '{}' in group '{}'",
                device, group
            )));
        }
        log::debug!("removed device '{}' from group '{}'", device, group);
        Ok(())
    }

    /// Current state of a (group, device) association
    pub fn find_device_state(&self, group: &str, device: &str) -> AluaResult<AluaState> {
        let groups = self.lock();
        let tg = find_group(&groups, group)?;
        tg.find_device(device)
            .map(|dgd| dgd.state)
            .ok_or_else(|| {
                AluaError::NotFound(format!("device '{}' in group '{}'", device, group))
            })
    }

    /// Reassign a group's default state and every device record it holds
    pub fn set_group_state(&self, group: &str, state: AluaState) -> AluaResult<()> {
        let mut groups = self.lock();
        let tg = find_group_mut(&mut groups, group)?;
        tg.set_state(state);
        log::info!("target group '{}' set to state '{}'", group, state);
        Ok(())
    }

    /// Build the REPORT TARGET GROUPS response for a device
    ///
    /// Both the sizing and the fill pass run under one lock acquisition, so
    /// the buffer always matches a single registry snapshot. The returned
    /// buffer is owned by the caller.
    pub fn report_target_groups(&self, device: &str, data_format: u8) -> AluaResult<Vec<u8>> {
        let groups = self.lock();
        report::build_group_info(&groups, device, data_format)
    }
}

fn find_group<'a>(groups: &'a [TargetGroup], name: &str) -> AluaResult<&'a TargetGroup> {
    groups
        .iter()
        .find(|tg| tg.name() == name)
        .ok_or_else(|| AluaError::NotFound(format!("target group '{}'", name)))
}

fn find_group_mut<'a>(
    groups: &'a mut [TargetGroup],
    name: &str,
) -> AluaResult<&'a mut TargetGroup> {
    groups
        .iter_mut()
        .find(|tg| tg.name() == name)
        .ok_or_else(|| AluaError::NotFound(format!("target group '{}'", name)))
}

/// Lowest group id >= 1 not held by a live group
fn next_free_group_id(groups: &[TargetGroup]) -> AluaResult<u16> {
    (1..=u16::MAX)
        .find(|id| !groups.iter().any(|tg| tg.group_id() == *id))
        .ok_or_else(|| AluaError::InvalidArgument("no free group id".to_string()))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lookup_destroy() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        let info = registry.create_group("controller_a", &cancel).unwrap();
        assert_eq!(info.name, "controller_a");
        assert_eq!(info.group_id, 1);
        assert_eq!(info.state, AluaState::ActiveOptimized);

        let looked_up = registry.lookup_group("controller_a").unwrap();
        assert_eq!(looked_up, info);

        registry.destroy_group("controller_a", &cancel).unwrap();
        assert!(matches!(
            registry.lookup_group("controller_a"),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("tg", &cancel).unwrap();
        assert!(matches!(
            registry.create_group("tg", &cancel),
            Err(AluaError::AlreadyExists(_))
        ));
        assert_eq!(registry.group_names(), vec!["tg"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();
        assert!(matches!(
            registry.create_group("", &cancel),
            Err(AluaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_destroy_missing_group() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();
        assert!(matches!(
            registry.destroy_group("nope", &cancel),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_auto_ids_skip_live_ids() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group_with_id("explicit", 1, &cancel).unwrap();
        let info = registry.create_group("auto", &cancel).unwrap();
        assert_eq!(info.group_id, 2);
    }

    #[test]
    fn test_duplicate_group_id_rejected() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group_with_id("a", 0x1234, &cancel).unwrap();
        assert!(matches!(
            registry.create_group_with_id("b", 0x1234, &cancel),
            Err(AluaError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_group_id_stable_across_other_destroys() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("a", &cancel).unwrap();
        let b = registry.create_group("b", &cancel).unwrap();
        registry.destroy_group("a", &cancel).unwrap();

        assert_eq!(registry.lookup_group("b").unwrap().group_id, b.group_id);
    }

    #[test]
    fn test_cancelled_token_aborts_without_change() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(
            registry.create_group("tg", &cancel),
            Err(AluaError::Cancelled)
        ));
        assert!(registry.group_names().is_empty());

        // Destroy waits on the same interruptible path
        assert!(matches!(
            registry.destroy_group("tg", &cancel),
            Err(AluaError::Cancelled)
        ));
    }

    #[test]
    fn test_lookup_group_by_device_registry_order() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("first", &cancel).unwrap();
        registry.create_group("second", &cancel).unwrap();
        registry.add_device("second", "disk1").unwrap();
        registry.add_device("first", "disk1").unwrap();

        // Scan order is registry order, not insertion order of the records
        let info = registry.lookup_group_by_device("disk1").unwrap();
        assert_eq!(info.name, "first");

        assert!(matches!(
            registry.lookup_group_by_device("disk2"),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_destroy_releases_memberships() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("tg", &cancel).unwrap();
        registry.add_target("tg", "port1", 1).unwrap();
        registry.add_device("tg", "disk1").unwrap();

        registry.destroy_group("tg", &cancel).unwrap();
        assert!(matches!(
            registry.lookup_group_by_device("disk1"),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_member_listings_follow_insertion_order() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("tg", &cancel).unwrap();
        registry.add_target("tg", "port_b", 2).unwrap();
        registry.add_target("tg", "port_a", 1).unwrap();
        registry.add_device("tg", "disk2").unwrap();
        registry
            .add_device_state("tg", "disk1", AluaState::Standby)
            .unwrap();

        let targets = registry.group_targets("tg").unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["port_b", "port_a"]);

        let devices = registry.group_devices("tg").unwrap();
        assert_eq!(devices[0].device, "disk2");
        assert_eq!(devices[0].state, AluaState::ActiveOptimized);
        assert_eq!(devices[1].device, "disk1");
        assert_eq!(devices[1].state, AluaState::Standby);

        assert!(matches!(
            registry.group_targets("missing"),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_device_state_lifecycle() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("tg", &cancel).unwrap();
        registry
            .add_device_state("tg", "disk1", AluaState::Standby)
            .unwrap();
        assert_eq!(
            registry.find_device_state("tg", "disk1").unwrap(),
            AluaState::Standby
        );

        registry
            .add_device_state("tg", "disk1", AluaState::Transitioning)
            .unwrap();
        assert_eq!(
            registry.find_device_state("tg", "disk1").unwrap(),
            AluaState::Transitioning
        );

        registry.remove_device("tg", "disk1").unwrap();
        assert!(matches!(
            registry.find_device_state("tg", "disk1"),
            Err(AluaError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_group_state_reassigns_records() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("tg", &cancel).unwrap();
        registry.add_device("tg", "disk1").unwrap();
        registry
            .add_device_state("tg", "disk2", AluaState::ActiveNonOptimized)
            .unwrap();

        registry.set_group_state("tg", AluaState::Unavailable).unwrap();
        assert_eq!(
            registry.find_device_state("tg", "disk1").unwrap(),
            AluaState::Unavailable
        );
        assert_eq!(
            registry.find_device_state("tg", "disk2").unwrap(),
            AluaState::Unavailable
        );
        assert_eq!(
            registry.lookup_group("tg").unwrap().state,
            AluaState::Unavailable
        );
    }

    #[test]
    fn test_clear() {
        let registry = AluaRegistry::new();
        let cancel = CancelToken::new();

        registry.create_group("a", &cancel).unwrap();
        registry.create_group("b", &cancel).unwrap();
        registry.clear();
        assert!(registry.group_names().is_empty());
    }
}
