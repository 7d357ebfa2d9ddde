//! Integration tests for BufferOrch through its public SAI-style surface
//!
//! A recording callback stands in for the components that watch pool state,
//! so every test can check both the returned statuses and what was announced.

use std::sync::{Arc, Mutex};

use sonic_bufferorch::buffer::{BufferPoolType, PoolSnapshot, ProfileParams};
use sonic_bufferorch::config::{BufferOrchConfig, HardwareProfile};
use sonic_bufferorch::{BufferOrch, BufferOrchCallbacks, ProfileSnapshot, ThresholdMode};
use sonic_sai::{
    BufferPoolAttr, BufferPoolOid, BufferProfileAttr, BufferProfileOid, IngressPriorityGroupAttr,
    IngressPriorityGroupOid, PortAttr, QueueAttr, QueueOid, RawSaiObjectId, SaiAttribute,
    SaiAttributeValue, SaiError, SaiList, SaiObjectType, SaiStatus, SaiValueKind,
};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Changed(BufferPoolOid, u64),
    Removed(BufferPoolOid),
}

#[derive(Debug, Clone, PartialEq)]
enum ProfileEvent {
    Changed(BufferProfileOid, ProfileSnapshot),
    Removed(BufferProfileOid),
}

/// Mock state watcher recording every notification, pools and profiles
/// kept apart
#[derive(Default)]
struct RecordingCallbacks {
    events: Mutex<Vec<Event>>,
    profile_events: Mutex<Vec<ProfileEvent>>,
}

impl RecordingCallbacks {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn take_profiles(&self) -> Vec<ProfileEvent> {
        std::mem::take(&mut *self.profile_events.lock().unwrap())
    }
}

impl BufferOrchCallbacks for RecordingCallbacks {
    fn on_pool_state_changed(&self, pool: BufferPoolOid, snapshot: &PoolSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Changed(pool, snapshot.shared_size));
    }

    fn on_pool_removed(&self, pool: BufferPoolOid) {
        self.events.lock().unwrap().push(Event::Removed(pool));
    }

    fn on_profile_state_changed(&self, profile: BufferProfileOid, snapshot: &ProfileSnapshot) {
        self.profile_events
            .lock()
            .unwrap()
            .push(ProfileEvent::Changed(profile, snapshot.clone()));
    }

    fn on_profile_removed(&self, profile: BufferProfileOid) {
        self.profile_events
            .lock()
            .unwrap()
            .push(ProfileEvent::Removed(profile));
    }
}

fn orch_with(hardware: HardwareProfile) -> (BufferOrch, Arc<RecordingCallbacks>) {
    let mut orch = BufferOrch::from_config(&BufferOrchConfig {
        hardware,
        ..BufferOrchConfig::default()
    });
    let callbacks = Arc::new(RecordingCallbacks::default());
    orch.set_callbacks(callbacks.clone());
    (orch, callbacks)
}

fn non_tiled() -> (BufferOrch, Arc<RecordingCallbacks>) {
    orch_with(HardwareProfile::default())
}

fn pgs(orch: &mut BufferOrch, hw_port_number: u32, count: u32) -> Vec<IngressPriorityGroupOid> {
    let port = orch.register_port(hw_port_number, count, 1).unwrap();
    orch.port_priority_groups(port).unwrap()
}

fn queues(orch: &mut BufferOrch, hw_port_number: u32, count: u32) -> Vec<QueueOid> {
    let port = orch.register_port(hw_port_number, 1, count).unwrap();
    orch.port_queues(port).unwrap()
}

fn get_u64(orch: &BufferOrch, oid: RawSaiObjectId, id: impl Into<u32>) -> u64 {
    let mut attrs = [SaiAttribute::new(id, SaiAttributeValue::empty(SaiValueKind::U64))];
    orch.get_attributes(oid, &mut attrs).unwrap();
    attrs[0].value.as_u64().unwrap()
}

mod accounting_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_size_tracks_attached_profiles() {
        let (mut orch, _) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let small = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let large = orch
            .create_profile(&ProfileParams::dynamic(pool, 3 * MIB, 0))
            .unwrap();
        let pgs = pgs(&mut orch, 0, 4);

        let attached = |orch: &BufferOrch| {
            [small, large]
                .iter()
                .filter(|p| orch.profile_snapshot(**p).unwrap().reference_count > 0)
                .map(|p| orch.profile_snapshot(*p).unwrap().size)
                .sum::<u64>()
        };
        let check = |orch: &BufferOrch| {
            let snapshot = orch.pool_snapshot(pool).unwrap();
            assert_eq!(snapshot.shared_size + attached(orch), snapshot.size);
        };

        orch.set_pg_profile(pgs[0], Some(small)).unwrap();
        check(&orch);
        orch.set_pg_profile(pgs[1], Some(small)).unwrap();
        check(&orch);
        orch.set_pg_profile(pgs[2], Some(large)).unwrap();
        check(&orch);
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 6 * MIB);

        orch.set_pg_profile(pgs[0], None).unwrap();
        check(&orch);
        orch.set_pg_profile(pgs[1], None).unwrap();
        check(&orch);
        orch.set_pg_profile(pgs[2], None).unwrap();
        check(&orch);
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 10 * MIB);
    }

    #[test]
    fn test_oversized_attach_is_rejected() {
        let (mut orch, callbacks) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 2 * MIB, None)
            .unwrap();
        let first = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB + 1, 0))
            .unwrap();
        let second = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pgs = pgs(&mut orch, 0, 2);
        orch.set_pg_profile(pgs[0], Some(first)).unwrap();
        callbacks.take();

        let err = orch.set_pg_profile(pgs[1], Some(second)).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, MIB - 1);
        assert_eq!(orch.profile_snapshot(second).unwrap().reference_count, 0);
        assert_eq!(callbacks.take(), vec![]);
        assert_eq!(orch.stats().errors, 1);
    }

    #[test]
    fn test_egress_profile_larger_than_pool() {
        let (mut orch, _) = non_tiled();
        let size = 4 * MIB;
        let pool = orch
            .create_pool(BufferPoolType::Egress, size, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, size + 1, 0))
            .unwrap();
        let queues = queues(&mut orch, 0, 1);

        let err = orch.set_queue_profile(queues[0], Some(profile)).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, size);
    }

    #[test]
    fn test_attach_and_detach_notify_pool() {
        let (mut orch, callbacks) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pgs = pgs(&mut orch, 0, 1);
        callbacks.take();

        orch.set_pg_profile(pgs[0], Some(profile)).unwrap();
        orch.set_pg_profile(pgs[0], None).unwrap();
        assert_eq!(
            callbacks.take(),
            vec![
                Event::Changed(pool, 3 * MIB),
                Event::Changed(pool, 4 * MIB),
            ]
        );
    }
}

mod tiled_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tiled() -> (BufferOrch, Arc<RecordingCallbacks>) {
        orch_with(HardwareProfile {
            tile_count: 4,
            ports_per_tile: Some(4),
            replication: 2,
            ..HardwareProfile::default()
        })
    }

    #[test]
    fn test_headroom_reserved_on_every_tile() {
        let (mut orch, callbacks) = tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(
                &ProfileParams::dynamic(pool, 1_048_576, 0).with_headroom(262_144, 262_144),
            )
            .unwrap();
        let pgs = pgs(&mut orch, 0, 1);
        callbacks.take();

        orch.set_pg_profile(pgs[0], Some(profile)).unwrap();
        let snapshot = orch.pool_snapshot(pool).unwrap();
        assert_eq!(snapshot.tile_reserved, vec![1_310_720, 0, 0, 0]);
        assert_eq!(snapshot.shared_size, 0);
        assert_eq!(snapshot.tiles_total_reserved_size, 5_242_880);
        assert_eq!(
            get_u64(&orch, pool.as_raw(), BufferPoolAttr::TilesTotalReservedSize),
            5_242_880
        );
        assert_eq!(callbacks.take(), vec![Event::Changed(pool, 0)]);

        orch.set_pg_profile(pgs[0], None).unwrap();
        let snapshot = orch.pool_snapshot(pool).unwrap();
        assert_eq!(snapshot.shared_size, 10_485_760);
        assert_eq!(snapshot.tile_reserved, vec![0, 0, 0, 0]);
        assert_eq!(snapshot.tiles_total_reserved_size, 0);
    }

    #[test]
    fn test_same_tile_charged_once() {
        let (mut orch, _) = tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB / 4, 0))
            .unwrap();
        // Ports 0 and 1 share tile 0
        let a = pgs(&mut orch, 0, 1)[0];
        let b = pgs(&mut orch, 1, 1)[0];

        orch.set_pg_profile(a, Some(profile)).unwrap();
        orch.set_pg_profile(b, Some(profile)).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().tile_reserved, vec![MIB / 4, 0, 0, 0]);
    }
}

mod lifecycle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_in_use_profile_then_retry() {
        let (mut orch, callbacks) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pgs = pgs(&mut orch, 0, 2);
        orch.set_pg_profile(pgs[0], Some(profile)).unwrap();
        orch.set_pg_profile(pgs[1], Some(profile)).unwrap();

        let err = orch.remove(profile.as_raw()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ObjectInUse);
        assert_eq!(orch.profile_snapshot(profile).unwrap().reference_count, 2);

        orch.set_pg_profile(pgs[0], None).unwrap();
        assert_eq!(
            orch.remove_profile(profile).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
        orch.set_pg_profile(pgs[1], None).unwrap();
        orch.remove_profile(profile).unwrap();

        orch.remove(pool.as_raw()).unwrap();
        assert_eq!(callbacks.take().last(), Some(&Event::Removed(pool)));
        assert_eq!(orch.pool_count(), 0);
    }

    #[test]
    fn test_remove_pool_with_profiles() {
        let (mut orch, _) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Egress, MIB, None)
            .unwrap();
        orch.create_profile(&ProfileParams::dynamic(pool, 1024, 0))
            .unwrap();

        assert_eq!(
            orch.remove_pool(pool).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let (mut orch, _) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0).with_headroom(0, 0))
            .unwrap();

        orch.set_attribute(
            pool.as_raw(),
            &SaiAttribute::new(BufferPoolAttr::Size, SaiAttributeValue::U64(8 * MIB)),
        )
        .unwrap();
        assert_eq!(get_u64(&orch, pool.as_raw(), BufferPoolAttr::Size), 8 * MIB);

        let updates = [
            (BufferProfileAttr::ReservedBufferSize, SaiAttributeValue::U64(2 * MIB)),
            (BufferProfileAttr::SharedDynamicTh, SaiAttributeValue::I8(-2)),
            (BufferProfileAttr::XoffTh, SaiAttributeValue::U64(4096)),
            (BufferProfileAttr::XonTh, SaiAttributeValue::U64(2048)),
        ];
        for (attr, value) in updates {
            orch.set_attribute(profile.as_raw(), &SaiAttribute::new(attr, value.clone()))
                .unwrap();
            let mut attrs = [SaiAttribute::new(attr, SaiAttributeValue::empty(value.kind()))];
            orch.get_attributes(profile.as_raw(), &mut attrs).unwrap();
            assert_eq!(attrs[0].value, value, "{}", attr.name());
        }
    }

    fn get_oid(orch: &BufferOrch, oid: RawSaiObjectId, id: impl Into<u32>) -> RawSaiObjectId {
        let mut attrs = [SaiAttribute::new(id, SaiAttributeValue::empty(SaiValueKind::Oid))];
        orch.get_attributes(oid, &mut attrs).unwrap();
        attrs[0].value.as_oid().unwrap()
    }

    #[test]
    fn test_static_threshold_and_pool_round_trip() {
        let (mut orch, _) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, Some(ThresholdMode::Static))
            .unwrap();
        let other = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, Some(ThresholdMode::Static))
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::static_limit(pool, MIB, 4096))
            .unwrap();

        orch.set_attribute(
            profile.as_raw(),
            &SaiAttribute::new(BufferProfileAttr::SharedStaticTh, SaiAttributeValue::U64(8192)),
        )
        .unwrap();
        assert_eq!(
            get_u64(&orch, profile.as_raw(), BufferProfileAttr::SharedStaticTh),
            8192
        );

        orch.set_attribute(
            profile.as_raw(),
            &SaiAttribute::new(BufferProfileAttr::PoolId, SaiAttributeValue::Oid(other.as_raw())),
        )
        .unwrap();
        assert_eq!(
            get_oid(&orch, profile.as_raw(), BufferProfileAttr::PoolId),
            other.as_raw()
        );
        assert_eq!(orch.pool_snapshot(pool).unwrap().profile_count, 0);
    }

    #[test]
    fn test_consumer_binding_round_trip() {
        let (mut orch, _) = non_tiled();
        let ingress = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, None)
            .unwrap();
        let egress = orch
            .create_pool(BufferPoolType::Egress, 8 * MIB, None)
            .unwrap();
        let pg_profile = orch
            .create_profile(&ProfileParams::dynamic(ingress, MIB, 0))
            .unwrap();
        let queue_profile = orch
            .create_profile(&ProfileParams::dynamic(egress, MIB, 0))
            .unwrap();
        let port = orch.register_port(0, 1, 1).unwrap();
        let pg = orch.port_priority_groups(port).unwrap()[0];
        let queue = orch.port_queues(port).unwrap()[0];

        let bindings = [
            (pg.as_raw(), u32::from(IngressPriorityGroupAttr::BufferProfile), pg_profile.as_raw()),
            (queue.as_raw(), u32::from(QueueAttr::BufferProfileId), queue_profile.as_raw()),
            (port.as_raw(), u32::from(PortAttr::QosIngressBufferProfile), pg_profile.as_raw()),
        ];
        for (consumer, attr, profile) in bindings {
            assert_eq!(get_oid(&orch, consumer, attr), 0);
            orch.set_attribute(consumer, &SaiAttribute::new(attr, SaiAttributeValue::Oid(profile)))
                .unwrap();
            assert_eq!(get_oid(&orch, consumer, attr), profile);
            orch.set_attribute(consumer, &SaiAttribute::new(attr, SaiAttributeValue::Oid(0)))
                .unwrap();
            assert_eq!(get_oid(&orch, consumer, attr), 0);
        }
    }

    #[test]
    fn test_profile_changes_are_announced() {
        let (mut orch, callbacks) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        callbacks.take();
        callbacks.take_profiles();

        orch.set_attribute(
            profile.as_raw(),
            &SaiAttribute::new(BufferProfileAttr::SharedDynamicTh, SaiAttributeValue::I8(-3)),
        )
        .unwrap();
        assert_eq!(callbacks.take(), vec![Event::Changed(pool, 4 * MIB)]);
        assert_eq!(
            callbacks.take_profiles(),
            vec![ProfileEvent::Changed(profile, orch.profile_snapshot(profile).unwrap())]
        );

        orch.remove_profile(profile).unwrap();
        assert_eq!(callbacks.take_profiles(), vec![ProfileEvent::Removed(profile)]);
    }

    #[test]
    fn test_cross_direction_pool_move() {
        let (mut orch, callbacks) = non_tiled();
        let ingress = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let egress = orch
            .create_pool(BufferPoolType::Egress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(ingress, MIB, 0))
            .unwrap();
        callbacks.take();

        let err = orch
            .set_attribute(
                profile.as_raw(),
                &SaiAttribute::new(BufferProfileAttr::PoolId, SaiAttributeValue::Oid(egress.as_raw())),
            )
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(0));
        assert_eq!(orch.profile_snapshot(profile).unwrap().pool, ingress.as_raw());
        assert_eq!(orch.pool_snapshot(egress).unwrap().profile_count, 0);
        assert_eq!(callbacks.take(), vec![]);
    }

    #[test]
    fn test_consumers_live_with_their_port() {
        let (mut orch, _) = non_tiled();
        let queue = queues(&mut orch, 0, 1)[0];

        let err = orch.remove(queue.as_raw()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::NotSupported);
        assert_eq!(SaiObjectType::of(queue.as_raw()), Some(SaiObjectType::Queue));
    }
}

mod get_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_overflow_reports_required_size() {
        let (mut orch, _) = non_tiled();
        let port = orch.register_port(0, 8, 1).unwrap();

        let mut attrs = [
            SaiAttribute::new(PortAttr::HwPortNumber, SaiAttributeValue::U32(0)),
            SaiAttribute::new(
                PortAttr::IngressPriorityGroupList,
                SaiAttributeValue::ObjectList(SaiList::with_capacity(4)),
            ),
        ];
        let err = orch.get_attributes(port.as_raw(), &mut attrs).unwrap_err();
        assert_eq!(err, SaiError::BufferOverflow { index: 1, required: 8 });
        assert_eq!(err.status(), SaiStatus::BufferOverflow);

        attrs[1].value = SaiAttributeValue::ObjectList(SaiList::with_capacity(8));
        orch.get_attributes(port.as_raw(), &mut attrs).unwrap();
        match &attrs[1].value {
            SaiAttributeValue::ObjectList(list) => assert_eq!(list.list.len(), 8),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_get_read_only_counters() {
        let (mut orch, _) = non_tiled();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pgs = pgs(&mut orch, 3, 3);
        for pg in &pgs {
            orch.set_pg_profile(*pg, Some(profile)).unwrap();
        }

        assert_eq!(get_u64(&orch, pool.as_raw(), BufferPoolAttr::SharedSize), 3 * MIB);
        let mut attrs = [SaiAttribute::new(
            BufferProfileAttr::ReferenceCount,
            SaiAttributeValue::empty(SaiValueKind::U32),
        )];
        orch.get_attributes(profile.as_raw(), &mut attrs).unwrap();
        assert_eq!(attrs[0].value, SaiAttributeValue::U32(3));
    }
}
