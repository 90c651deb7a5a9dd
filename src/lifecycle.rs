// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device-loss tracking and recovery.
//!
//! A GPU device can become invalid at any moment: a driver reset, a switch out of exclusive
//! full-screen, the adapter being unplugged. Every native handle created from it is then garbage.
//! [DeviceLifecycleTracker] keeps a registry of the objects owning such handles and drives all of
//! them through a two-phase protocol:
//!
//! 1. **Lost**: every registered [TrackedResource] releases its native handles but keeps its
//!    logical configuration (name, size, format, ...).
//! 2. **Reset**: every resource rebuilds its native handles from that configuration against the
//!    replacement device.
//!
//! # States
//!
//! ```text
//!            device_lost()              device_reset()
//!   Active ───────────────► Lost ────────────────────► Recovering ──► Active
//!      ▲                                                    │
//!      └──────────── (sweep finished, even partially) ──────┘
//! ```
//!
//! Recovery never stops at the first failure. Every resource is attempted, and the failures are
//! returned together as a [RecoveryError]. Failed resources stay released until
//! [DeviceLifecycleTracker::recreate] succeeds for them.
//!
//! # Registration
//!
//! The tracker only holds weak references, so it never keeps a resource alive. No tracker lock is
//! held while a resource callback runs: callbacks may register, unregister or drop resources.
//! Resources unregistered or dropped before the sweep reaches them are skipped; resources
//! registered during a sweep are not visited by it.

use crate::error::{CreationError, RecoveryError, ResourceFailure, StaleHandle};
use crate::sys::time::Instant;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Device is usable.
    Active,
    /// Device was lost; native handles are released.
    Lost,
    /// A reset sweep is recreating native handles.
    Recovering,
}

/// Identifies a registration with a [DeviceLifecycleTracker].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        ResourceId(raw)
    }
}

/**
An object owning native handles that must survive device loss.

`Ctx` is whatever the owner needs to rebuild native objects, typically the replacement device.
*/
pub trait TrackedResource<Ctx: ?Sized>: Send {
    /// Debug name, used in logs and recovery reports.
    fn name(&self) -> &str;

    /// Releases native handles. Logical configuration must be kept.
    ///
    /// Must tolerate being called on an already-released resource.
    fn device_lost(&mut self);

    /// Recreates native handles from the preserved configuration.
    fn device_reset(&mut self, ctx: &Ctx) -> Result<(), CreationError>;
}

/// A resource as shared between its owner and the tracker.
pub type Shared<R> = Arc<Mutex<R>>;

struct Registration<Ctx: ?Sized + 'static> {
    id: ResourceId,
    resource: Weak<Mutex<dyn TrackedResource<Ctx>>>,
}

impl<Ctx: ?Sized> Clone for Registration<Ctx> {
    fn clone(&self) -> Self {
        Registration {
            id: self.id,
            resource: self.resource.clone(),
        }
    }
}

struct Inner<Ctx: ?Sized + 'static> {
    state: DeviceState,
    registrations: Vec<Registration<Ctx>>,
    next_id: u64,
    lost_at: Option<Instant>,
    /// The resource whose reset callback is running; a loss sweep leaves it to the reset sweep.
    resetting: Option<ResourceId>,
    waiters: Vec<r#continue::Sender<()>>,
}

impl<Ctx: ?Sized> Inner<Ctx> {
    fn is_registered(&self, id: ResourceId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }

    /// Drops registrations whose resource no longer exists, returning the live ones.
    fn live_snapshot(&mut self) -> Vec<Registration<Ctx>> {
        self.registrations.retain(|r| r.resource.strong_count() > 0);
        self.registrations.clone()
    }
}

pub struct DeviceLifecycleTracker<Ctx: ?Sized + 'static> {
    inner: Mutex<Inner<Ctx>>,
}

fn lock_resource<R: ?Sized>(resource: &Mutex<R>) -> MutexGuard<'_, R> {
    //a resource that panicked mid-callback is still worth notifying
    resource.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<Ctx: ?Sized + 'static> DeviceLifecycleTracker<Ctx> {
    pub fn new() -> Self {
        DeviceLifecycleTracker {
            inner: Mutex::new(Inner {
                state: DeviceState::Active,
                registrations: Vec::new(),
                next_id: 0,
                lost_at: None,
                resetting: None,
                waiters: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<Ctx>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == DeviceState::Active
    }

    /// Fails with [StaleHandle] unless the device is [DeviceState::Active].
    pub fn ensure_active(&self) -> Result<(), StaleHandle> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StaleHandle::new("device"))
        }
    }

    /// Starts tracking `resource`. The tracker keeps only a weak reference.
    pub fn register<R>(&self, resource: &Shared<R>) -> ResourceId
    where
        R: TrackedResource<Ctx> + 'static,
    {
        let weak = Arc::downgrade(resource);
        let weak: Weak<Mutex<dyn TrackedResource<Ctx>>> = weak;
        let mut inner = self.lock();
        let id = ResourceId(inner.next_id);
        inner.next_id += 1;
        inner.registrations.push(Registration { id, resource: weak });
        id
    }

    /// Stops tracking `id`. Returns whether it was registered.
    pub fn unregister(&self, id: ResourceId) -> bool {
        let mut inner = self.lock();
        let before = inner.registrations.len();
        inner.registrations.retain(|r| r.id != id);
        inner.registrations.len() != before
    }

    /// Number of registered resources that are still alive.
    pub fn len(&self) -> usize {
        let mut inner = self.lock();
        inner.registrations.retain(|r| r.resource.strong_count() > 0);
        inner.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, id: ResourceId) -> Option<Arc<Mutex<dyn TrackedResource<Ctx>>>> {
        let inner = self.lock();
        inner
            .registrations
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.resource.upgrade())
    }

    /// Whether `id` should still be visited by a sweep, and the resource if it is alive.
    fn still_tracked(
        &self,
        registration: &Registration<Ctx>,
    ) -> Option<Arc<Mutex<dyn TrackedResource<Ctx>>>> {
        if !self.lock().is_registered(registration.id) {
            return None;
        }
        registration.resource.upgrade()
    }

    /**
    Handles a device-lost notification.

    Every registered resource releases its native handles. Calling this while already lost is a
    no-op; calling it during recovery interrupts the recovery.
    */
    pub fn device_lost(&self) {
        let (snapshot, busy) = {
            let mut inner = self.lock();
            if inner.state == DeviceState::Lost {
                logwise::warn_sync!("device_lost: device is already lost");
                return;
            }
            inner.state = DeviceState::Lost;
            inner.lost_at = Some(Instant::now());
            (inner.live_snapshot(), inner.resetting)
        };
        logwise::info_sync!(
            "device lost, releasing {count} tracked resources",
            count = snapshot.len()
        );
        for registration in &snapshot {
            //its reset callback holds the lock and may be the caller; the reset sweep releases it
            if busy == Some(registration.id) {
                continue;
            }
            if let Some(resource) = self.still_tracked(registration) {
                lock_resource(&*resource).device_lost();
            }
        }
    }

    /**
    Handles a device-reset notification.

    Every registered resource recreates its native handles against `ctx`. All resources are
    attempted; failures are aggregated into the returned [RecoveryError]. The tracker is
    [DeviceState::Active] afterwards either way, unless the device was lost again mid-sweep.

    Resetting an active device does nothing.
    */
    pub fn device_reset(&self, ctx: &Ctx) -> Result<(), RecoveryError> {
        let snapshot = {
            let mut inner = self.lock();
            match inner.state {
                DeviceState::Active => {
                    logwise::trace_sync!("device_reset: device is already active");
                    return Ok(());
                }
                DeviceState::Recovering => {
                    logwise::warn_sync!("device_reset: recovery already in progress");
                    return Ok(());
                }
                DeviceState::Lost => {}
            }
            inner.state = DeviceState::Recovering;
            inner.live_snapshot()
        };
        let sweep = logwise::perfwarn_begin!("device_reset sweep");
        let mut failures = Vec::new();
        for registration in &snapshot {
            let Some(resource) = self.still_tracked(registration) else {
                continue;
            };
            let mut guard = lock_resource(&*resource);
            let recovering = {
                let mut inner = self.lock();
                if inner.state == DeviceState::Recovering {
                    inner.resetting = Some(registration.id);
                    true
                } else {
                    false
                }
            };
            if !recovering {
                //lost again underneath us; whatever is left stays released
                failures.push(ResourceFailure {
                    id: Some(registration.id),
                    name: guard.name().to_string(),
                    error: CreationError::DeviceLost,
                });
                continue;
            }
            let result = guard.device_reset(ctx);
            let interrupted = {
                let mut inner = self.lock();
                inner.resetting = None;
                inner.state != DeviceState::Recovering
            };
            if interrupted {
                //the loss skipped this resource, so drop whatever it just built
                guard.device_lost();
                failures.push(ResourceFailure {
                    id: Some(registration.id),
                    name: guard.name().to_string(),
                    error: CreationError::DeviceLost,
                });
                continue;
            }
            if let Err(error) = result {
                logwise::warn_sync!(
                    "failed to recreate {name}: {error}",
                    name = logwise::privacy::LogIt(guard.name()),
                    error = logwise::privacy::LogIt(&error)
                );
                failures.push(ResourceFailure {
                    id: Some(registration.id),
                    name: guard.name().to_string(),
                    error,
                });
            }
        }
        drop(sweep);

        let waiters = {
            let mut inner = self.lock();
            if inner.state == DeviceState::Recovering {
                inner.state = DeviceState::Active;
                if let Some(lost_at) = inner.lost_at.take() {
                    let elapsed_ms =
                        u64::try_from(lost_at.elapsed().as_millis()).unwrap_or(u64::MAX);
                    logwise::info_sync!(
                        "device recovered after {elapsed_ms}ms, {failed} of {total} resources failed",
                        elapsed_ms = elapsed_ms,
                        failed = failures.len(),
                        total = snapshot.len()
                    );
                }
                std::mem::take(&mut inner.waiters)
            } else {
                Vec::new()
            }
        };
        for waiter in waiters {
            waiter.send(());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RecoveryError { failures })
        }
    }

    /// Releases one resource's native handles outside of a sweep.
    ///
    /// Returns whether the resource was tracked and alive.
    pub fn force_release(&self, id: ResourceId) -> bool {
        match self.find(id) {
            Some(resource) => {
                lock_resource(&*resource).device_lost();
                true
            }
            None => false,
        }
    }

    /// Recreates one resource, e.g. after it failed during a reset sweep.
    ///
    /// Unknown or dropped resources are ignored.
    pub fn recreate(&self, id: ResourceId, ctx: &Ctx) -> Result<(), CreationError> {
        if !self.is_active() {
            return Err(CreationError::DeviceLost);
        }
        match self.find(id) {
            Some(resource) => lock_resource(&*resource).device_reset(ctx),
            None => Ok(()),
        }
    }

    /// Resolves once the device is [DeviceState::Active].
    ///
    /// Resolves immediately if it already is, otherwise when the next reset sweep finishes.
    pub async fn wait_until_active(&self) {
        let receiver = {
            let mut inner = self.lock();
            if inner.state == DeviceState::Active {
                return;
            }
            let (sender, receiver) = r#continue::continuation();
            inner.waiters.push(sender);
            receiver
        };
        receiver.await
    }
}

impl<Ctx: ?Sized + 'static> Default for DeviceLifecycleTracker<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx: ?Sized + 'static> Debug for DeviceLifecycleTracker<Ctx> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("DeviceLifecycleTracker")
            .field("state", &inner.state)
            .field("registrations", &inner.registrations.len())
            .field("waiters", &inner.waiters.len())
            .finish()
    }
}

impl<Ctx: ?Sized + 'static> Drop for DeviceLifecycleTracker<Ctx> {
    fn drop(&mut self) {
        //nobody can restore the device anymore; don't leave waiters hanging
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for waiter in inner.waiters.drain(..) {
            waiter.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Hands out fresh native ids and fails for chosen names.
    struct FakeDevice {
        next: AtomicU64,
        refuse: Vec<&'static str>,
    }

    impl FakeDevice {
        fn new() -> Self {
            FakeDevice {
                next: AtomicU64::new(1),
                refuse: Vec::new(),
            }
        }
        fn create(&self, name: &str) -> Result<u64, CreationError> {
            if self.refuse.contains(&name) {
                return Err(CreationError::OutOfMemory {
                    what: name.to_string(),
                });
            }
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[derive(Debug)]
    struct Surface {
        name: &'static str,
        width: u32,
        height: u32,
        native: Option<u64>,
        released: u32,
    }

    impl Surface {
        fn shared(name: &'static str, device: &FakeDevice) -> Shared<Surface> {
            Arc::new(Mutex::new(Surface {
                name,
                width: 640,
                height: 480,
                native: Some(device.create(name).unwrap()),
                released: 0,
            }))
        }
        fn native(&self) -> Result<u64, StaleHandle> {
            self.native.ok_or_else(|| StaleHandle::new(self.name))
        }
    }

    impl TrackedResource<FakeDevice> for Surface {
        fn name(&self) -> &str {
            self.name
        }
        fn device_lost(&mut self) {
            if self.native.take().is_some() {
                self.released += 1;
            }
        }
        fn device_reset(&mut self, ctx: &FakeDevice) -> Result<(), CreationError> {
            self.native = Some(ctx.create(self.name)?);
            Ok(())
        }
    }

    #[test]
    fn test_round_trip_preserves_configuration() {
        let device = FakeDevice::new();
        let tracker = DeviceLifecycleTracker::new();
        let surface = Surface::shared("backbuffer", &device);
        tracker.register(&surface);
        let before = surface.lock().unwrap().native().unwrap();

        tracker.device_lost();
        assert_eq!(tracker.state(), DeviceState::Lost);
        assert_eq!(
            surface.lock().unwrap().native(),
            Err(StaleHandle::new("backbuffer"))
        );
        assert!(tracker.ensure_active().is_err());

        tracker.device_reset(&device).unwrap();
        assert_eq!(tracker.state(), DeviceState::Active);
        let s = surface.lock().unwrap();
        assert_ne!(s.native().unwrap(), before);
        assert_eq!((s.name, s.width, s.height), ("backbuffer", 640, 480));
    }

    #[test]
    fn test_partial_recovery_aggregates_failures() {
        let mut device = FakeDevice::new();
        let tracker = DeviceLifecycleTracker::new();
        let a = Surface::shared("a", &device);
        let b = Surface::shared("b", &device);
        let c = Surface::shared("c", &device);
        let d = Surface::shared("d", &device);
        let ids: Vec<_> = [&a, &b, &c, &d].iter().map(|s| tracker.register(*s)).collect();

        tracker.device_lost();
        device.refuse = vec!["b", "d"];
        let err = tracker.device_reset(&device).unwrap_err();
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0].name, "b");
        assert_eq!(err.failures[0].id, Some(ids[1]));
        assert_eq!(err.failures[1].name, "d");

        //the rest came back and the device is usable again
        assert!(tracker.is_active());
        assert!(a.lock().unwrap().native().is_ok());
        assert!(c.lock().unwrap().native().is_ok());
        assert!(b.lock().unwrap().native().is_err());

        device.refuse.clear();
        tracker.recreate(ids[1], &device).unwrap();
        assert!(b.lock().unwrap().native().is_ok());
    }

    #[test]
    fn test_repeated_loss_releases_once() {
        let device = FakeDevice::new();
        let tracker = DeviceLifecycleTracker::new();
        let s = Surface::shared("s", &device);
        tracker.register(&s);
        tracker.device_lost();
        tracker.device_lost();
        assert_eq!(s.lock().unwrap().released, 1);
        //reset of an active device is a no-op
        tracker.device_reset(&device).unwrap();
        let native = s.lock().unwrap().native().unwrap();
        tracker.device_reset(&device).unwrap();
        assert_eq!(s.lock().unwrap().native().unwrap(), native);
    }

    #[test]
    fn test_dropped_resources_are_skipped() {
        let device = FakeDevice::new();
        let tracker = DeviceLifecycleTracker::new();
        let kept = Surface::shared("kept", &device);
        let gone = Surface::shared("gone", &device);
        tracker.register(&kept);
        tracker.register(&gone);
        drop(gone);
        assert_eq!(tracker.len(), 1);
        tracker.device_lost();
        tracker.device_reset(&device).unwrap();
        assert!(kept.lock().unwrap().native().is_ok());
    }

    /// Unregisters another resource from inside its own lost callback.
    struct Saboteur {
        tracker: Arc<DeviceLifecycleTracker<FakeDevice>>,
        victim: ResourceId,
        newcomer: Option<Shared<Surface>>,
    }

    impl TrackedResource<FakeDevice> for Saboteur {
        fn name(&self) -> &str {
            "saboteur"
        }
        fn device_lost(&mut self) {
            self.tracker.unregister(self.victim);
            if let Some(newcomer) = &self.newcomer {
                self.tracker.register(newcomer);
            }
        }
        fn device_reset(&mut self, _ctx: &FakeDevice) -> Result<(), CreationError> {
            Ok(())
        }
    }

    #[test]
    fn test_mutation_during_sweep() {
        let device = FakeDevice::new();
        let tracker = Arc::new(DeviceLifecycleTracker::new());
        let victim = Surface::shared("victim", &device);
        let newcomer = Surface::shared("newcomer", &device);
        let saboteur = Arc::new(Mutex::new(Saboteur {
            tracker: tracker.clone(),
            victim: ResourceId(1),
            newcomer: Some(newcomer.clone()),
        }));
        assert_eq!(tracker.register(&saboteur), ResourceId(0));
        assert_eq!(tracker.register(&victim), ResourceId(1));

        tracker.device_lost();
        //victim was unregistered before the sweep reached it
        assert_eq!(victim.lock().unwrap().released, 0);
        //newcomer was registered mid-sweep and not visited
        assert_eq!(newcomer.lock().unwrap().released, 0);
        assert_eq!(tracker.len(), 2);
    }

    /// Loses the device again from inside its first reset callback.
    struct Tripwire {
        tracker: Arc<DeviceLifecycleTracker<FakeDevice>>,
        tripped: bool,
        native: Option<u64>,
        seen: Option<DeviceState>,
    }

    impl TrackedResource<FakeDevice> for Tripwire {
        fn name(&self) -> &str {
            "tripwire"
        }
        fn device_lost(&mut self) {
            self.native = None;
        }
        fn device_reset(&mut self, ctx: &FakeDevice) -> Result<(), CreationError> {
            self.seen = Some(self.tracker.state());
            self.native = Some(ctx.create("tripwire")?);
            if !self.tripped {
                self.tripped = true;
                self.tracker.device_lost();
            }
            Ok(())
        }
    }

    #[test]
    fn test_loss_during_recovery() {
        use std::future::Future;
        use std::task::{Context, Poll, Waker};

        let device = FakeDevice::new();
        let tracker = Arc::new(DeviceLifecycleTracker::new());
        let first = Surface::shared("first", &device);
        let tripwire = Arc::new(Mutex::new(Tripwire {
            tracker: tracker.clone(),
            tripped: false,
            native: None,
            seen: None,
        }));
        let last = Surface::shared("last", &device);
        tracker.register(&first);
        let tripwire_id = tracker.register(&tripwire);
        let last_id = tracker.register(&last);

        tracker.device_lost();
        let mut cx = Context::from_waker(Waker::noop());
        let mut waiting = std::pin::pin!(tracker.wait_until_active());
        assert!(waiting.as_mut().poll(&mut cx).is_pending());

        let err = tracker.device_reset(&device).unwrap_err();
        assert_eq!(tripwire.lock().unwrap().seen, Some(DeviceState::Recovering));
        assert_eq!(tracker.state(), DeviceState::Lost);
        let failed: Vec<_> = err.failures.iter().map(|f| (f.id, &f.error)).collect();
        assert_eq!(
            failed,
            vec![
                (Some(tripwire_id), &CreationError::DeviceLost),
                (Some(last_id), &CreationError::DeviceLost)
            ]
        );
        //nothing built before or during the second loss survives it
        assert!(first.lock().unwrap().native().is_err());
        assert_eq!(first.lock().unwrap().released, 2);
        assert_eq!(tripwire.lock().unwrap().native, None);
        assert!(last.lock().unwrap().native().is_err());
        assert!(waiting.as_mut().poll(&mut cx).is_pending());

        tracker.device_reset(&device).unwrap();
        assert!(tracker.is_active());
        assert!(tripwire.lock().unwrap().native.is_some());
        assert!(last.lock().unwrap().native().is_ok());
        assert_eq!(waiting.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn test_force_release() {
        let device = FakeDevice::new();
        let tracker = DeviceLifecycleTracker::new();
        let s = Surface::shared("s", &device);
        let id = tracker.register(&s);
        assert!(tracker.force_release(id));
        assert!(s.lock().unwrap().native().is_err());
        tracker.recreate(id, &device).unwrap();
        assert!(s.lock().unwrap().native().is_ok());
        assert!(tracker.unregister(id));
        assert!(!tracker.force_release(id));
    }

    #[test]
    fn test_wait_until_active() {
        let device = Arc::new(FakeDevice::new());
        let tracker = Arc::new(DeviceLifecycleTracker::new());
        test_executors::spin_on(tracker.wait_until_active());

        tracker.device_lost();
        let resetter = {
            let tracker = tracker.clone();
            let device = device.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                tracker.device_reset(&device).unwrap();
            })
        };
        test_executors::spin_on(tracker.wait_until_active());
        assert!(tracker.is_active());
        resetter.join().unwrap();
    }
}
