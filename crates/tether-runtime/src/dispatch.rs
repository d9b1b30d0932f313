//! Template registry and callback dispatch
//!
//! Every template registered with a context is turned into a native
//! callback table. The callbacks resolve the keep-alive slot back to its
//! host object, run the template's handler with panics contained, and
//! encode the outcome using the boundary result protocol.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tether_engine::ScriptContext;
use tether_sdk::{ContextId, HostCallbacks, TaggedValue, TemplateId};
use tracing::{error, trace};

use crate::codec;
use crate::context::{ContextInner, JsContext};
use crate::error::Result;
use crate::exception::{error_template, HostException};
use crate::template::{DispatchResult, HostObjectTemplate};
use crate::value::{HostObject, Value};

// ============================================================================
// Registry
// ============================================================================

struct Registration {
    id: TemplateId,
    template: Arc<HostObjectTemplate>,
}

/// Templates of one context in selection order
pub(crate) struct Registry {
    entries: Vec<Registration>,
    default: TemplateId,
    errors: TemplateId,
}

impl Registry {
    pub(crate) fn new(
        native: &ScriptContext,
        context: &Weak<ContextInner>,
        templates: impl IntoIterator<Item = Arc<HostObjectTemplate>>,
    ) -> Self {
        let errors_template = Arc::new(error_template());
        let errors = native.add_template(callbacks(context.clone(), errors_template.clone()));
        let default = native.add_template(callbacks(
            context.clone(),
            Arc::new(HostObjectTemplate::catch_all()),
        ));
        let mut registry = Self {
            entries: vec![Registration {
                id: errors,
                template: errors_template,
            }],
            default,
            errors,
        };
        for template in templates {
            registry.register(native, context, template);
        }
        registry
    }

    pub(crate) fn register(
        &mut self,
        native: &ScriptContext,
        context: &Weak<ContextInner>,
        template: Arc<HostObjectTemplate>,
    ) -> TemplateId {
        let id = native.add_template(callbacks(context.clone(), template.clone()));
        trace!(template = id.0, name = template.name(), "template registered");
        self.entries.push(Registration { id, template });
        id
    }

    /// Template servicing `object`: the first whose selector accepts it
    pub(crate) fn select(&self, object: &HostObject) -> TemplateId {
        self.entries
            .iter()
            .find(|entry| entry.template.matches(object))
            .map_or(self.default, |entry| entry.id)
    }

    /// Template servicing thrown error records
    pub(crate) fn errors(&self) -> TemplateId {
        self.errors
    }
}

// ============================================================================
// Results
// ============================================================================

/// Handler outputs that can be handed back to the engine
trait IntoTagged {
    fn into_tagged(self, cx: &JsContext) -> Result<TaggedValue>;
}

impl IntoTagged for Value {
    fn into_tagged(self, cx: &JsContext) -> Result<TaggedValue> {
        codec::encode(&self, cx)
    }
}

impl IntoTagged for () {
    fn into_tagged(self, _: &JsContext) -> Result<TaggedValue> {
        Ok(TaggedValue::Undefined)
    }
}

impl IntoTagged for bool {
    fn into_tagged(self, _: &JsContext) -> Result<TaggedValue> {
        Ok(TaggedValue::Boolean(self))
    }
}

impl IntoTagged for String {
    fn into_tagged(self, _: &JsContext) -> Result<TaggedValue> {
        Ok(TaggedValue::string(&self))
    }
}

impl IntoTagged for Vec<String> {
    fn into_tagged(self, _: &JsContext) -> Result<TaggedValue> {
        Ok(TaggedValue::from_names(self))
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Resolve the context and slot, run `handler`, and encode its outcome.
/// A context that is gone or disposed answers `Empty`; a disposed one also
/// asks the engine to stop. A slot that no longer resolves aborts the
/// execution.
fn dispatch<T: IntoTagged>(
    context: &Weak<ContextInner>,
    slot: i32,
    operation: &'static str,
    handler: impl FnOnce(&JsContext, &HostObject) -> DispatchResult<T>,
) -> TaggedValue {
    let Some(inner) = context.upgrade() else {
        return TaggedValue::Empty;
    };
    let cx = JsContext { inner };
    if cx.ensure_alive().is_err() {
        cx.interrupt();
        return TaggedValue::Empty;
    }
    trace!(context = cx.id().0, slot, operation, "dispatch");

    let target = cx.inner.keepalive.lock().get(slot);
    let target = match target {
        Ok(target) => target,
        Err(err) => return cx.abort(err),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&cx, &target)))
        .unwrap_or_else(|payload| DispatchResult::Failed(HostException::from_panic(payload)));
    match outcome {
        DispatchResult::Handled(value) => match value.into_tagged(&cx) {
            Ok(tagged) => tagged,
            Err(err) => cx.fail(err.into()),
        },
        DispatchResult::NotHandled => TaggedValue::Empty,
        DispatchResult::Failed(exception) => cx.fail(exception),
    }
}

fn handled<T>(result: std::result::Result<T, HostException>) -> DispatchResult<T> {
    result.into()
}

/// Callback table servicing proxies of `template`'s objects
pub(crate) fn callbacks(
    context: Weak<ContextInner>,
    template: Arc<HostObjectTemplate>,
) -> HostCallbacks {
    let mut callbacks = {
        let context = context.clone();
        let template = template.clone();
        HostCallbacks::new(move |_: ContextId, slot| remove(&context, &template, slot))
    };

    if let Some(handler) = template.get_property.clone() {
        let context = context.clone();
        callbacks = callbacks.with_get_property(move |_, slot, name| {
            dispatch(&context, slot, "get_property", |cx, target| handler(cx, target, name))
        });
    }
    if let Some(handler) = template.set_property.clone() {
        let context = context.clone();
        callbacks = callbacks.with_set_property(move |_, slot, name, value| {
            dispatch(&context, slot, "set_property", |cx, target| {
                match codec::extract(value, cx) {
                    Ok(value) => handler(cx, target, name, value),
                    Err(err) => DispatchResult::Failed(err.into()),
                }
            })
        });
    }
    if let Some(handler) = template.delete_property.clone() {
        let context = context.clone();
        callbacks = callbacks.with_delete_property(move |_, slot, name| {
            dispatch(&context, slot, "delete_property", |cx, target| handler(cx, target, name))
        });
    }
    if let Some(handler) = template.enumerate_properties.clone() {
        let context = context.clone();
        callbacks = callbacks.with_enumerate_properties(move |_, slot| {
            dispatch(&context, slot, "enumerate_properties", |cx, target| {
                handled(handler(cx, target))
            })
        });
    }
    if let Some(handler) = template.invoke.clone() {
        let context = context.clone();
        callbacks = callbacks.with_invoke(move |_, slot, args| {
            dispatch(&context, slot, "invoke", |cx, target| {
                match codec::extract_all(args, cx) {
                    Ok(args) => handled(handler(cx, target, &args)),
                    Err(err) => DispatchResult::Failed(err.into()),
                }
            })
        });
    }
    if let Some(handler) = template.value_of.clone() {
        let context = context.clone();
        callbacks = callbacks.with_value_of(move |_, slot| {
            dispatch(&context, slot, "value_of", |cx, target| handled(handler(cx, target)))
        });
    }
    if let Some(handler) = template.to_string.clone() {
        callbacks = callbacks.with_to_string(move |_, slot| {
            dispatch(&context, slot, "to_string", |cx, target| handler(cx, target))
        });
    }
    callbacks
}

/// The engine collected a proxy. The slot is released first; the
/// template's own notification may not fail the collection.
fn remove(context: &Weak<ContextInner>, template: &HostObjectTemplate, slot: i32) {
    let Some(inner) = context.upgrade() else {
        return;
    };
    let object = inner.keepalive.lock().remove(slot);
    trace!(slot, template = template.name(), "host object released");
    let (Some(object), Some(handler)) = (object, template.remove.as_ref()) else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| handler(&object))).is_err() {
        error!(slot, template = template.name(), "remove handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::ContextConfig;
    use crate::engine::JsEngine;
    use crate::error::Error;
    use crate::exception::FilterDecision;
    use crate::reflect::ReflectionConfig;

    struct Target;
    struct Evictor;

    #[test]
    fn test_unresolvable_slot_escapes_script_catch() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let seen = consulted.clone();
        let target = HostObjectTemplate::for_type::<Target>()
            .on_get_property(|_, _, _| DispatchResult::Handled(Value::from("reached")));
        let evictor = HostObjectTemplate::for_type::<Evictor>().on_get_property(|cx, _, _| {
            cx.inner.keepalive.lock().clear();
            DispatchResult::Handled(Value::Undefined)
        });
        let config = ContextConfig::new()
            .with_reflection(ReflectionConfig::disabled())
            .with_template(target)
            .with_template(evictor)
            .with_error_filter(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                FilterDecision::Proceed
            });
        let engine = JsEngine::default();
        let cx = engine.create_context_with(config).unwrap();
        cx.set_variable("t", Value::host(Target)).unwrap();
        cx.set_variable("evict", Value::host(Evictor)).unwrap();
        assert_eq!(cx.execute("t.x", None).unwrap(), Value::from("reached"));

        let result = cx.execute(
            "evict.now; var caught = false; try { t.x } catch (e) { caught = true } caught",
            None,
        );
        assert!(matches!(result, Err(Error::Resolution(_))));
        assert_eq!(consulted.load(Ordering::SeqCst), 0);

        // The request does not outlive the failed execution
        assert_eq!(cx.execute("1 + 1", None).unwrap(), Value::Integer(2));
    }
}
