//! Constructor binding and the scoped installer.
//!
//! Browsers expose the cross-domain request API as a global constructor;
//! here the equivalent is a per-thread binding slot holding a
//! [`Constructor`] handle. A harness that normally resolves the
//! constructor through [`current_constructor`] can have the fake swapped
//! in for a scope by [`use_fake_xdomain_request`], which hands back a
//! guard that undoes the swap.
//!
//! The swap only happens when a binding already exists, mirroring how the
//! real installer leaves environments without the native object untouched.
//! The fake constructor returned by the guard is usable either way.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::request::{FakeXDomainRequest, RequestConfig};

/// Factory behind a [`Constructor`] handle
pub type BuildFn = dyn Fn(RequestConfig) -> FakeXDomainRequest;

/// Hook observing every request built while installed; may mutate the
/// fresh instance before the constructor returns it
pub type CreateHook = Box<dyn FnMut(&mut FakeXDomainRequest)>;

thread_local! {
    static BINDING: RefCell<Option<Constructor>> = const { RefCell::new(None) };
    static ON_CREATE: RefCell<Option<CreateHook>> = const { RefCell::new(None) };
}

/// Cloneable handle to a request factory.
///
/// Clones share identity: [`Constructor::same_as`] compares the underlying
/// factory, not the display name, so a restored binding can be recognized
/// even after passing through the slot.
#[derive(Clone)]
pub struct Constructor {
    inner: Rc<ConstructorInner>,
}

struct ConstructorInner {
    name: String,
    build: Box<BuildFn>,
}

impl Constructor {
    /// Wrap a factory under a display name
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(RequestConfig) -> FakeXDomainRequest + 'static,
    {
        Self {
            inner: Rc::new(ConstructorInner {
                name: name.into(),
                build: Box::new(build),
            }),
        }
    }

    /// Display name of the constructor
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Build a request with the default configuration
    #[must_use]
    pub fn build(&self) -> FakeXDomainRequest {
        self.build_with_config(RequestConfig::default())
    }

    /// Build a request with the given configuration
    #[must_use]
    pub fn build_with_config(&self, config: RequestConfig) -> FakeXDomainRequest {
        (self.inner.build)(config)
    }

    /// Whether both handles wrap the same factory
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name())
            .finish()
    }
}

/// Install a constructor in this thread's binding slot, returning the one
/// it displaced
pub fn install_constructor(constructor: Constructor) -> Option<Constructor> {
    BINDING.with(|slot| slot.borrow_mut().replace(constructor))
}

/// Handle to the currently bound constructor, if any
#[must_use]
pub fn current_constructor() -> Option<Constructor> {
    BINDING.with(|slot| slot.borrow().clone())
}

/// Empty this thread's binding slot, returning what it held
pub fn take_constructor() -> Option<Constructor> {
    BINDING.with(|slot| slot.borrow_mut().take())
}

/// Install the creation hook, replacing any previous one.
///
/// The hook observes every request built on this thread until cleared,
/// regardless of which constructor (or none) is bound.
pub fn set_on_create<F>(hook: F)
where
    F: FnMut(&mut FakeXDomainRequest) + 'static,
{
    ON_CREATE.with(|slot| *slot.borrow_mut() = Some(Box::new(hook)));
}

/// Remove the creation hook
pub fn clear_on_create() {
    ON_CREATE.with(|slot| slot.borrow_mut().take());
}

/// Whether a creation hook is installed on this thread
#[must_use]
pub fn has_on_create() -> bool {
    ON_CREATE.with(|slot| slot.borrow().is_some())
}

/// Run the creation hook against a fresh request.
///
/// The hook is taken out of its slot for the call, so a hook that itself
/// constructs requests does not recurse; a replacement installed during
/// the call sticks.
pub(crate) fn run_on_create(request: &mut FakeXDomainRequest) {
    let hook = ON_CREATE.with(|slot| slot.borrow_mut().take());
    if let Some(mut hook) = hook {
        hook(request);
        ON_CREATE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                *slot = Some(hook);
            }
        });
    }
}

/// Swap the fake constructor into this thread's binding for a scope.
///
/// The swap occurs only when a binding already exists; either way the
/// returned guard carries a fake constructor ready to build requests.
/// Dropping the guard restores the displaced binding and clears the
/// creation hook; call [`FakeXdrGuard::restore`] to control hook
/// retention explicitly.
#[must_use]
pub fn use_fake_xdomain_request() -> FakeXdrGuard {
    let fake = Constructor::new("FakeXDomainRequest", FakeXDomainRequest::with_config);
    let previous = current_constructor();
    if previous.is_some() {
        install_constructor(fake.clone());
    }
    FakeXdrGuard {
        fake,
        previous,
        restored: false,
    }
}

/// Undo token for [`use_fake_xdomain_request`].
///
/// Restoration runs once: through [`FakeXdrGuard::restore`] or on drop,
/// whichever comes first.
#[must_use]
pub struct FakeXdrGuard {
    fake: Constructor,
    previous: Option<Constructor>,
    restored: bool,
}

impl FakeXdrGuard {
    /// The fake constructor this guard installed (or stands ready with,
    /// when no binding existed to swap)
    #[must_use]
    pub fn constructor(&self) -> &Constructor {
        &self.fake
    }

    /// The binding displaced by the swap, if one existed
    #[must_use]
    pub fn displaced(&self) -> Option<&Constructor> {
        self.previous.as_ref()
    }

    /// Restore the displaced binding now.
    ///
    /// The creation hook is cleared unless `keep_on_create` is true.
    pub fn restore(mut self, keep_on_create: bool) {
        self.restore_now(keep_on_create);
    }

    fn restore_now(&mut self, keep_on_create: bool) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Some(previous) = self.previous.take() {
            install_constructor(previous);
        }
        if !keep_on_create {
            clear_on_create();
        }
    }
}

impl Drop for FakeXdrGuard {
    fn drop(&mut self) {
        self.restore_now(false);
    }
}

impl fmt::Debug for FakeXdrGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeXdrGuard")
            .field("fake", &self.fake)
            .field("displaced", &self.previous)
            .field("restored", &self.restored)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn native_constructor() -> Constructor {
        Constructor::new("NativeXDomainRequest", FakeXDomainRequest::with_config)
    }

    // ===== Constructor handles =====

    #[test]
    fn test_constructor_builds_requests() {
        let constructor = native_constructor();
        let request = constructor.build();
        assert_eq!(request.chunk_size(), crate::request::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_constructor_builds_with_config() {
        let constructor = native_constructor();
        let request = constructor.build_with_config(RequestConfig::new().with_chunk_size(7));
        assert_eq!(request.chunk_size(), 7);
    }

    #[test]
    fn test_same_as_tracks_identity_not_name() {
        let first = Constructor::new("Twin", FakeXDomainRequest::with_config);
        let second = Constructor::new("Twin", FakeXDomainRequest::with_config);
        assert_eq!(first.name(), second.name());
        assert!(!first.same_as(&second));
        assert!(first.same_as(&first.clone()));
    }

    // ===== Binding slot =====

    #[test]
    fn test_install_displaces_the_previous_binding() {
        assert!(current_constructor().is_none());
        let first = native_constructor();
        assert!(install_constructor(first.clone()).is_none());

        let second = native_constructor();
        let displaced = install_constructor(second.clone()).unwrap();
        assert!(displaced.same_as(&first));
        assert!(current_constructor().unwrap().same_as(&second));

        take_constructor();
    }

    #[test]
    fn test_take_empties_the_slot() {
        install_constructor(native_constructor());
        assert!(take_constructor().is_some());
        assert!(current_constructor().is_none());
        assert!(take_constructor().is_none());
    }

    // ===== Scoped installation =====

    #[test]
    fn test_swap_occurs_only_over_an_existing_binding() {
        assert!(current_constructor().is_none());
        let guard = use_fake_xdomain_request();

        // no binding existed, so the slot stays empty
        assert!(current_constructor().is_none());
        assert!(guard.displaced().is_none());

        // the fake is still usable through the guard
        let mut request = guard.constructor().build();
        request.open("GET", "/direct");
        assert!(request.send(None).is_ok());

        guard.restore(false);
        assert!(current_constructor().is_none());
    }

    #[test]
    fn test_swap_and_restore_over_an_existing_binding() {
        let native = native_constructor();
        install_constructor(native.clone());

        let guard = use_fake_xdomain_request();
        let bound = current_constructor().unwrap();
        assert!(bound.same_as(guard.constructor()));
        assert_eq!(bound.name(), "FakeXDomainRequest");
        assert!(guard.displaced().unwrap().same_as(&native));

        guard.restore(false);
        assert!(current_constructor().unwrap().same_as(&native));

        take_constructor();
    }

    #[test]
    fn test_dropping_the_guard_restores_the_binding() {
        let native = native_constructor();
        install_constructor(native.clone());

        {
            let _guard = use_fake_xdomain_request();
            assert!(!current_constructor().unwrap().same_as(&native));
        }
        assert!(current_constructor().unwrap().same_as(&native));

        take_constructor();
    }

    // ===== Creation hook =====

    #[test]
    fn test_on_create_observes_every_construction() {
        let count = Rc::new(RefCell::new(0));
        let count_in_hook = Rc::clone(&count);
        set_on_create(move |_| *count_in_hook.borrow_mut() += 1);

        let _first = FakeXDomainRequest::new();
        let _second = FakeXDomainRequest::new();
        assert_eq!(*count.borrow(), 2);

        clear_on_create();
        let _third = FakeXDomainRequest::new();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_on_create_may_reconfigure_the_request() {
        set_on_create(|request| request.set_chunk_size(3));
        let request = FakeXDomainRequest::new();
        assert_eq!(request.chunk_size(), 3);
        clear_on_create();
    }

    #[test]
    fn test_on_create_survives_its_own_invocation() {
        set_on_create(|_| {});
        let _request = FakeXDomainRequest::new();
        assert!(has_on_create());
        clear_on_create();
    }

    #[test]
    fn test_restore_clears_the_hook_by_default() {
        let guard = use_fake_xdomain_request();
        set_on_create(|_| {});
        assert!(has_on_create());

        guard.restore(false);
        assert!(!has_on_create());
    }

    #[test]
    fn test_restore_can_keep_the_hook() {
        let guard = use_fake_xdomain_request();
        set_on_create(|_| {});

        guard.restore(true);
        assert!(has_on_create());

        clear_on_create();
    }

    #[test]
    fn test_drop_clears_the_hook() {
        {
            let _guard = use_fake_xdomain_request();
            set_on_create(|_| {});
        }
        assert!(!has_on_create());
    }
}
