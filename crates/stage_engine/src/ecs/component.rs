//! Component trait and typed component references

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::lifecycle::Lifecycle;

/// Type-erasure helper, implemented for every `'static` type
pub trait AsAny: Any {
    /// Upcast to `&dyn Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any` for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Marker trait for components
///
/// A component is a unit of behavior attached to exactly one game object.
/// It has no scheduling of its own; its [`Lifecycle`] hooks run when the
/// owning object is dispatched.
pub trait Component: Lifecycle + AsAny {}

/// One attached component plus its type tag
///
/// The tag is kept outside the cell so lookups never have to borrow a
/// component that is busy running a hook.
#[derive(Clone)]
pub(crate) struct Attached {
    type_id: TypeId,
    type_name: &'static str,
    cell: Rc<RefCell<dyn Component>>,
}

impl Attached {
    pub(crate) fn new<C: Component>(component: C) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            cell: Rc::new(RefCell::new(component)),
        }
    }

    pub(crate) fn is<T: Component>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn cell(&self) -> &RefCell<dyn Component> {
        &self.cell
    }
}

impl fmt::Debug for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A component that has not been attached yet
///
/// Produced by [`GameObjectBuilder::with_component`](super::GameObjectBuilder::with_component)
/// so builders can carry heterogeneous components.
pub struct PendingComponent(pub(crate) Attached);

impl PendingComponent {
    /// Wrap a component for later attachment
    pub fn new<C: Component>(component: C) -> Self {
        Self(Attached::new(component))
    }
}

impl fmt::Debug for PendingComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingComponent").field(&self.0).finish()
    }
}

/// Typed reference to a component attached to a game object
///
/// Returned by component lookups. Access goes through closures because the
/// component may be running a hook at the time of the call; in that case
/// access yields `None` instead of panicking.
pub struct ComponentRef<T: Component> {
    attached: Attached,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentRef<T> {
    /// Wrap a fresh component, returning the attachment and a reference to it
    pub(crate) fn attach(component: T) -> (Attached, Self) {
        let attached = Attached::new(component);
        let reference = Self {
            attached: attached.clone(),
            _marker: PhantomData,
        };
        (attached, reference)
    }

    pub(crate) fn from_attached(attached: &Attached) -> Option<Self> {
        attached.is::<T>().then(|| Self {
            attached: attached.clone(),
            _marker: PhantomData,
        })
    }

    /// Run `f` with shared access to the component
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let component = self.attached.cell.try_borrow().ok()?;
        (*component).as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` with exclusive access to the component
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut component = self.attached.cell.try_borrow_mut().ok()?;
        (*component).as_any_mut().downcast_mut::<T>().map(f)
    }

    /// Whether both references point at the same attached component
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.attached.cell, &other.attached.cell)
    }
}

impl<T: Component> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        Self {
            attached: self.attached.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Component> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.attached).finish()
    }
}
