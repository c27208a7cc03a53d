// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Registry proxies
//!
//! A wrapper stands in for one concrete type so the factory can create
//! instances of it without compile-time knowledge of the type. Wrapper identity
//! is its [`TypeKey`], so two wrappers built for the same Rust type are the
//! same type as far as the factory is concerned.

use crate::domain::component_tree::ComponentId;
use crate::domain::object::{Component, ComponentCreatable, Object, ObjectCreatable};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Stable type-erased identity of a creatable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(TypeId);

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// Kind of instance a wrapper produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Object,
    Component,
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapperKind::Object => f.write_str("object"),
            WrapperKind::Component => f.write_str("component"),
        }
    }
}

/// Creation proxy for one concrete type.
pub trait ObjectWrapper: Send + Sync {
    fn type_key(&self) -> TypeKey;

    /// Registered type name; empty if the type is anonymous.
    fn type_name(&self) -> &str;

    fn kind(&self) -> WrapperKind;

    /// `None` when the wrapped type is a component.
    fn create_object(&self, name: &str) -> Option<Box<dyn Object>>;

    /// `None` when the wrapped type is a plain object. The caller attaches the
    /// returned instance under `parent`.
    fn create_component(&self, name: &str, parent: ComponentId) -> Option<Arc<dyn Component>>;
}

impl fmt::Debug for dyn ObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWrapper")
            .field("type_name", &self.type_name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Name shown in tables for wrappers without a type name.
pub const UNKNOWN_TYPE_NAME: &str = "<unknown>";

/// Display name of a wrapper, falling back to `<unknown>`.
pub fn display_name(wrapper: &dyn ObjectWrapper) -> &str {
    if wrapper.type_name().is_empty() {
        UNKNOWN_TYPE_NAME
    } else {
        wrapper.type_name()
    }
}

pub fn same_type(a: &dyn ObjectWrapper, b: &dyn ObjectWrapper) -> bool {
    a.type_key() == b.type_key()
}

/// Wrapper for an [`ObjectCreatable`] type.
pub struct ObjectRegistry<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: ObjectCreatable> ObjectRegistry<T> {
    pub fn get() -> Arc<dyn ObjectWrapper> {
        Arc::new(Self { _marker: PhantomData })
    }
}

impl<T: ObjectCreatable> ObjectWrapper for ObjectRegistry<T> {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::Object
    }

    fn create_object(&self, name: &str) -> Option<Box<dyn Object>> {
        Some(Box::new(T::new(name)))
    }

    fn create_component(&self, _name: &str, _parent: ComponentId) -> Option<Arc<dyn Component>> {
        None
    }
}

/// Wrapper for a [`ComponentCreatable`] type.
pub struct ComponentRegistry<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: ComponentCreatable> ComponentRegistry<T> {
    pub fn get() -> Arc<dyn ObjectWrapper> {
        Arc::new(Self { _marker: PhantomData })
    }
}

impl<T: ComponentCreatable> ObjectWrapper for ComponentRegistry<T> {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::Component
    }

    fn create_object(&self, _name: &str) -> Option<Box<dyn Object>> {
        None
    }

    fn create_component(&self, name: &str, _parent: ComponentId) -> Option<Arc<dyn Component>> {
        Some(Arc::new(T::new(name)))
    }
}
