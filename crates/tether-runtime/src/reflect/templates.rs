//! Built-in reflection templates

use std::sync::Arc;

use crate::exception::{HostErrorInfo, HostException};
use crate::reflect::descriptor::{TypeCatalog, TypeDescriptor};
use crate::reflect::function::{native_source, BoundMethod, HostFunction, HostType};
use crate::reflect::{Exposure, MissingMemberPolicy};
use crate::template::{DispatchResult, HostObjectTemplate};
use crate::value::{HostObject, Value};

/// Members every script object answers through its prototype
pub(crate) const INHERITED: [&str; 2] = ["toString", "valueOf"];

pub(crate) fn missing<T>(policy: MissingMemberPolicy, type_name: &str, name: &str) -> DispatchResult<T> {
    match policy {
        MissingMemberPolicy::Ignore => DispatchResult::NotHandled,
        MissingMemberPolicy::Throw => DispatchResult::Failed(
            HostErrorInfo::new(format!("{} has no member '{}'", type_name, name))
                .with_name("TypeError")
                .into(),
        ),
    }
}

fn read_only<T>(type_name: &str, name: &str) -> DispatchResult<T> {
    DispatchResult::Failed(
        HostErrorInfo::new(format!("{}.{} is read-only", type_name, name))
            .with_name("TypeError")
            .into(),
    )
}

fn wrong_target() -> HostException {
    HostException::msg("reflection template applied to a foreign object")
}

/// Host closures
pub(crate) fn function_template(exposure: Exposure) -> HostObjectTemplate {
    HostObjectTemplate::new(move |object| object.is::<HostFunction>() && exposure.allows(object))
        .with_name("host-function")
        .on_invoke(|cx, target, args| {
            let function = target.downcast_ref::<HostFunction>().ok_or_else(wrong_target)?;
            function.call(cx, args)
        })
        .on_to_string(|_, target| match target.downcast_ref::<HostFunction>() {
            Some(function) => DispatchResult::Handled(native_source(function.name().unwrap_or(""))),
            None => DispatchResult::NotHandled,
        })
}

/// Methods read off host objects and types
pub(crate) fn bound_method_template() -> HostObjectTemplate {
    HostObjectTemplate::for_type::<BoundMethod>()
        .with_name("host-method")
        .on_invoke(|cx, target, args| {
            let method = target.downcast_ref::<BoundMethod>().ok_or_else(wrong_target)?;
            method.call(cx, args)
        })
        .on_to_string(|_, target| match target.downcast_ref::<BoundMethod>() {
            Some(method) => DispatchResult::Handled(native_source(method.name())),
            None => DispatchResult::NotHandled,
        })
}

/// Type objects: static members and construction
pub(crate) fn type_template(exposure: Exposure, policy: MissingMemberPolicy) -> HostObjectTemplate {
    HostObjectTemplate::new(move |object| object.is::<HostType>() && exposure.allows(object))
        .with_name("host-type")
        .on_get_property(move |_, target, name| {
            let Some(ty) = target.downcast_ref::<HostType>() else {
                return DispatchResult::NotHandled;
            };
            let descriptor = ty.descriptor();
            if let Some(getter) = descriptor.static_property(name) {
                return getter().into();
            }
            if descriptor.static_method(name).is_some() {
                return DispatchResult::Handled(bound(name, None, descriptor));
            }
            if INHERITED.contains(&name) {
                return DispatchResult::NotHandled;
            }
            missing(policy, descriptor.name(), name)
        })
        .on_set_property(move |_, target, name, _| {
            let Some(ty) = target.downcast_ref::<HostType>() else {
                return DispatchResult::NotHandled;
            };
            let descriptor = ty.descriptor();
            if descriptor.has_static_member(name) {
                return read_only(descriptor.name(), name);
            }
            missing(policy, descriptor.name(), name)
        })
        .on_delete_property(|_, target, name| match target.downcast_ref::<HostType>() {
            Some(ty) if ty.descriptor().has_static_member(name) => DispatchResult::Handled(false),
            _ => DispatchResult::NotHandled,
        })
        .on_enumerate_properties(|_, target| {
            Ok(target
                .downcast_ref::<HostType>()
                .map(|ty| ty.descriptor().static_member_names())
                .unwrap_or_default())
        })
        .on_invoke(|cx, target, args| {
            let ty = target.downcast_ref::<HostType>().ok_or_else(wrong_target)?;
            ty.construct(cx, args)
        })
        .on_to_string(|_, target| match target.downcast_ref::<HostType>() {
            Some(ty) => DispatchResult::Handled(native_source(ty.descriptor().name())),
            None => DispatchResult::NotHandled,
        })
}

/// Instances of every type described in `catalog`
pub(crate) fn object_template(
    catalog: Arc<TypeCatalog>,
    exposure: Exposure,
    policy: MissingMemberPolicy,
) -> HostObjectTemplate {
    let describe = {
        let catalog = catalog.clone();
        move |object: &HostObject| catalog.lookup(object)
    };
    let get = describe.clone();
    let set = describe.clone();
    let delete = describe.clone();
    let enumerate = describe.clone();
    let display = describe;

    HostObjectTemplate::new(move |object| {
        catalog.lookup(object).is_some() && exposure.allows(object)
    })
    .with_name("host-object")
    .on_get_property(move |_, target, name| {
        let Some(descriptor) = get(target) else {
            return DispatchResult::NotHandled;
        };
        if let Some(property) = descriptor.property(name) {
            return (property.getter)(target).into();
        }
        if descriptor.method(name).is_some() {
            return DispatchResult::Handled(bound(name, Some(target.clone()), &descriptor));
        }
        if INHERITED.contains(&name) {
            return DispatchResult::NotHandled;
        }
        missing(policy, descriptor.name(), name)
    })
    .on_set_property(move |_, target, name, value| {
        let Some(descriptor) = set(target) else {
            return DispatchResult::NotHandled;
        };
        match descriptor.property(name) {
            Some(property) => match &property.setter {
                Some(setter) => setter(target, value).into(),
                None => read_only(descriptor.name(), name),
            },
            None if descriptor.method(name).is_some() => read_only(descriptor.name(), name),
            None => missing(policy, descriptor.name(), name),
        }
    })
    .on_delete_property(move |_, target, name| match delete(target) {
        Some(descriptor) if descriptor.has_member(name) => DispatchResult::Handled(false),
        _ => DispatchResult::NotHandled,
    })
    .on_enumerate_properties(move |_, target| {
        Ok(enumerate(target)
            .map(|descriptor| descriptor.member_names())
            .unwrap_or_default())
    })
    .on_to_string(move |_, target| match display(target) {
        Some(descriptor) => DispatchResult::Handled(descriptor.display(target)),
        None => DispatchResult::NotHandled,
    })
}

fn bound(name: &str, receiver: Option<HostObject>, declaring: &Arc<TypeDescriptor>) -> Value {
    Value::host(BoundMethod {
        name: name.to_string(),
        receiver,
        declaring: declaring.clone(),
    })
}
