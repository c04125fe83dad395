//! Method and field resolution (§4.2, §4.3, §4.4).
//!
//! Grounded structurally on `resolveClassStaticField`/`resolveClassInstanceField`/
//! `resolveClassVirtualMethod`/`resolveClassSpecialMethod`/`resolveStaticClassMethod`
//! in `examples/original_source/src/myjvm/jvm.c`, reimplemented against the tagged
//! `Constant` enum instead of the source's single overloaded pointer array.

use std::rc::Rc;

use crate::class::Class;
use crate::constant_pool::{Constant, FieldCache, MethodEntry};
use crate::environment::Environment;
use crate::error::JvmError;
use crate::native;
use crate::registry::Registry;

pub enum MethodResolution {
    Found { owner: Rc<Class>, method_index: usize, args_len: usize },
    Native { class_name: String, method_name: String },
}

fn method_ref_parts(caller: &Rc<Class>, cp_index: u16) -> Result<(u16, u16), JvmError> {
    match caller.constant_pool.get(cp_index as usize - 1) {
        Some(Constant::MethodRef { class_index, name_and_type_index, .. })
        | Some(Constant::InterfaceMethodRef { class_index, name_and_type_index, .. }) => {
            Ok((*class_index, *name_and_type_index))
        }
        _ => Err(JvmError::UnresolvedMethod {
            class: caller.name.clone(),
            name: "?".to_string(),
            descriptor: format!("bad constant pool index {}", cp_index),
        }),
    }
}

fn method_ref_cache(caller: &Rc<Class>, cp_index: u16) -> &crate::constant_pool::MethodRefCache {
    match &caller.constant_pool[cp_index as usize - 1] {
        Constant::MethodRef { cache, .. } | Constant::InterfaceMethodRef { cache, .. } => cache,
        _ => unreachable!("checked by method_ref_parts"),
    }
}

/// §4.2 `resolveClassRef`: ensures the referenced class is loaded and the `ClassRef`
/// cache slot is filled. Idempotent.
pub fn resolve_class_ref(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
) -> Result<Rc<Class>, JvmError> {
    let (name_index, cached) = match &caller.constant_pool[cp_index as usize - 1] {
        Constant::Class { name_index, resolved } => (*name_index, resolved),
        _ => {
            return Err(JvmError::UnresolvedClass {
                name: format!("bad constant pool index {} in {}", cp_index, caller.name),
                source: None,
            })
        }
    };

    if let Some(existing) = cached.borrow().clone() {
        return Ok(existing);
    }

    let name = caller.utf8(name_index)?.to_string();
    let class = registry.load_class_recursive(env, &name)?;
    *cached.borrow_mut() = Some(class.clone());
    Ok(class)
}

fn walk_ancestors(start: Rc<Class>) -> impl Iterator<Item = Rc<Class>> {
    let mut current = Some(start);
    std::iter::from_fn(move || {
        let this = current.take()?;
        current = this.parent_class.borrow().clone();
        Some(this)
    })
}

/// §4.3 mode 1. Matches name+descriptor+`STATIC`. Native matches short-circuit before
/// caching and before the `STATIC` check, matching §4.7's "checked inside resolution"
/// rule regardless of which invoke opcode is driving resolution.
pub fn resolve_static_method(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
) -> Result<MethodResolution, JvmError> {
    resolve_method_common(registry, env, caller, cp_index, true)
}

/// §4.3 mode 2. Matches name+descriptor regardless of `STATIC` (constructors,
/// private/super-invocation).
pub fn resolve_special_method(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
) -> Result<MethodResolution, JvmError> {
    resolve_method_common(registry, env, caller, cp_index, false)
}

fn resolve_method_common(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
    require_static: bool,
) -> Result<MethodResolution, JvmError> {
    let cache = method_ref_cache(caller, cp_index);
    if let Some(entry) = cache.direct.borrow().clone() {
        let args_len = cache.args_len.borrow().unwrap();
        return Ok(MethodResolution::Found { owner: entry.owner, method_index: entry.method_index, args_len });
    }

    let (class_index, nat_index) = method_ref_parts(caller, cp_index)?;
    let class_name = resolve_class_ref(registry, env, caller, class_index)?.name.clone();
    let owner_class = resolve_class_ref(registry, env, caller, class_index)?;
    let (name, descriptor) = caller.name_and_type(nat_index)?;
    let (name, descriptor) = (name.to_string(), descriptor.to_string());

    if native::is_allow_listed(&class_name, &name) {
        return Ok(MethodResolution::Native { class_name, method_name: name });
    }

    for class in walk_ancestors(owner_class) {
        if let Some(idx) = class.find_method(&name, &descriptor) {
            let method = &class.methods[idx];
            if require_static && !method.is_static() {
                continue;
            }
            if method.is_native() {
                // Not in our allow-list (checked above), but still a resolvable
                // native per §4.7's "any other native resolves successfully but is a
                // no-op" — never cached, re-walked on every call.
                return Ok(MethodResolution::Native { class_name: class.name.clone(), method_name: name });
            }

            let args_len = method.args_len;
            *cache.direct.borrow_mut() = Some(MethodEntry { owner: class.clone(), method_index: idx });
            *cache.args_len.borrow_mut() = Some(args_len);
            return Ok(MethodResolution::Found { owner: class, method_index: idx, args_len });
        }
    }

    Err(JvmError::UnresolvedMethod { class: class_name, name, descriptor })
}

/// §4.3 mode 3. Keyed by the receiver's runtime class via the `MethodRef`'s
/// `MethodTable`; a miss walks the receiver's chain and installs the result.
pub fn resolve_virtual_method(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
    receiver_class: &Rc<Class>,
) -> Result<MethodResolution, JvmError> {
    let (class_index, nat_index) = method_ref_parts(caller, cp_index)?;
    let static_class_name = resolve_class_ref(registry, env, caller, class_index)?.name.clone();
    let (name, descriptor) = caller.name_and_type(nat_index)?;
    let (name, descriptor) = (name.to_string(), descriptor.to_string());

    if native::is_allow_listed(&static_class_name, &name) {
        return Ok(MethodResolution::Native { class_name: static_class_name, method_name: name });
    }

    let cache = method_ref_cache(caller, cp_index);
    if let Some(entry) = cache.table.borrow().get(&receiver_class.name) {
        let args_len = resolve_args_len(caller, cp_index)?;
        return Ok(MethodResolution::Found { owner: entry.owner.clone(), method_index: entry.method_index, args_len });
    }

    for class in walk_ancestors(receiver_class.clone()) {
        if let Some(idx) = class.find_method(&name, &descriptor) {
            let method = &class.methods[idx];
            if method.is_native() {
                return Ok(MethodResolution::Native { class_name: class.name.clone(), method_name: name });
            }
            let args_len = method.args_len;
            cache.table.borrow_mut().insert(
                receiver_class.name.clone(),
                MethodEntry { owner: class.clone(), method_index: idx },
            );
            *cache.args_len.borrow_mut() = Some(args_len);
            return Ok(MethodResolution::Found { owner: class, method_index: idx, args_len });
        }
    }

    Err(JvmError::UnresolvedMethod { class: receiver_class.name.clone(), name, descriptor })
}

fn resolve_args_len(caller: &Rc<Class>, cp_index: u16) -> Result<usize, JvmError> {
    let cache = method_ref_cache(caller, cp_index);
    if let Some(len) = *cache.args_len.borrow() {
        return Ok(len);
    }
    // Shouldn't happen: args_len is always installed alongside the first cache fill.
    Err(JvmError::UnresolvedMethod {
        class: caller.name.clone(),
        name: "?".to_string(),
        descriptor: "args_len missing from warm cache".to_string(),
    })
}

/// Reads a `MethodRef`'s descriptor directly from the constant pool and sums its
/// parameter byte sizes, independent of whatever resolution found (or didn't find).
/// Needed by the invoke opcode handlers for native dispatch, where no `Class`/`Method`
/// may exist at all to read `args_len` off of (e.g. `java/lang/System`, which this
/// engine never loads).
pub fn method_descriptor_args_len(caller: &Rc<Class>, cp_index: u16) -> Result<usize, JvmError> {
    let (_class_index, nat_index) = method_ref_parts(caller, cp_index)?;
    let (_name, descriptor) = caller.name_and_type(nat_index)?;
    let parsed = crate::types::parse_descriptor(descriptor)?;
    parsed.args_len()
}

/// §4.4: static field resolution, requires `STATIC`. Caches `ftype`/`findex` on the
/// `FieldRef`; the owning class is *not* cached directly (reachable via the `ClassRef`).
pub fn resolve_static_field(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
) -> Result<(Rc<Class>, FieldCache), JvmError> {
    resolve_field_common(registry, env, caller, cp_index, true)
}

/// §4.4: instance field resolution, requires `STATIC` clear.
pub fn resolve_instance_field(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
) -> Result<(Rc<Class>, FieldCache), JvmError> {
    resolve_field_common(registry, env, caller, cp_index, false)
}

fn resolve_field_common(
    registry: &Registry,
    env: &Environment,
    caller: &Rc<Class>,
    cp_index: u16,
    require_static: bool,
) -> Result<(Rc<Class>, FieldCache), JvmError> {
    let (class_index, nat_index, cache) = match &caller.constant_pool[cp_index as usize - 1] {
        Constant::FieldRef { class_index, name_and_type_index, cache } => {
            (*class_index, *name_and_type_index, cache)
        }
        _ => {
            return Err(JvmError::UnresolvedField {
                class: caller.name.clone(),
                name: format!("bad constant pool index {}", cp_index),
            })
        }
    };

    let owner_class = resolve_class_ref(registry, env, caller, class_index)?;

    if let Some(fc) = cache.borrow().clone() {
        let owner = fc.owner.clone();
        return Ok((owner, fc));
    }

    let (name, _descriptor) = caller.name_and_type(nat_index)?;
    let name = name.to_string();

    for class in walk_ancestors(owner_class.clone()) {
        if let Some(idx) = class.find_field(&name) {
            let field = &class.fields[idx];
            if field.is_static() != require_static {
                continue;
            }
            let fc = FieldCache { owner: class.clone(), ftype: field.ftype.clone(), findex: field.slot };
            *cache.borrow_mut() = Some(fc.clone());
            return Ok((class, fc));
        }
    }

    Err(JvmError::UnresolvedField { class: owner_class.name.clone(), name })
}
