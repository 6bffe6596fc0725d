//! Lexically scoped environment: a named mapping with a parent link
//! (`spec.md` §4.4).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A reference-counted, interior-mutable scope link. Cloning an
/// `Environment` shares the same scope, which is what `Engine::call` needs
/// when it hands a callee the global environment directly (`spec.md` §4.3
/// "function frames parent directly to globals").
#[derive(Debug, Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    pub fn new_global() -> Self {
        Self(Rc::new(RefCell::new(Scope::default())))
    }

    /// Creates a nested scope whose parent is `self`.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Always creates/overwrites a binding in the current scope, regardless
    /// of whether an outer scope already defines the name (`spec.md` §4.4:
    /// "There is no name shadowing safeguard").
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    /// Walks up the parent chain looking for `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        if let Some(v) = scope.vars.get(name) {
            return Some(v.clone());
        }
        scope.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        let scope = self.0.borrow();
        scope.vars.contains_key(name) || scope.parent.as_ref().is_some_and(|p| p.has(name))
    }

    /// Assigns `name` in the nearest scope that already defines it; if no
    /// scope defines it, defines it locally in `self` (`spec.md` §4.4).
    pub fn set(&self, name: &str, value: Value) {
        if self.0.borrow().vars.contains_key(name) {
            self.0.borrow_mut().vars.insert(name.to_string(), value);
            return;
        }
        let parent = self.0.borrow().parent.clone();
        match parent {
            Some(p) if p.has(name) => p.set(name, value),
            _ => self.define(name, value),
        }
    }

    fn same_scope(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `has`, but never looks inside `boundary` (nor past it). Backs the
    /// method-body identifier resolution order decided in `DESIGN.md`:
    /// call-frame locals/params are searched before falling back to `this`'s
    /// fields, with `boundary` set to the global environment so a name that
    /// only exists globally is *not* reported as already resolved here.
    pub fn has_before(&self, name: &str, boundary: &Self) -> bool {
        if self.same_scope(boundary) {
            return false;
        }
        let scope = self.0.borrow();
        scope.vars.contains_key(name) || scope.parent.as_ref().is_some_and(|p| p.has_before(name, boundary))
    }

    /// `get`, bounded the same way as [`Environment::has_before`].
    pub fn get_before(&self, name: &str, boundary: &Self) -> Option<Value> {
        if self.same_scope(boundary) {
            return None;
        }
        let scope = self.0.borrow();
        if let Some(v) = scope.vars.get(name) {
            return Some(v.clone());
        }
        scope.parent.as_ref().and_then(|p| p.get_before(name, boundary))
    }

    /// `set`, bounded the same way as [`Environment::has_before`]. Assumes
    /// the caller already confirmed `has_before` so there is a defining
    /// scope to reach; a no-op otherwise.
    pub fn set_before(&self, name: &str, value: Value, boundary: &Self) {
        if self.same_scope(boundary) {
            return;
        }
        if self.0.borrow().vars.contains_key(name) {
            self.0.borrow_mut().vars.insert(name.to_string(), value);
            return;
        }
        let parent = self.0.borrow().parent.clone();
        if let Some(p) = parent {
            p.set_before(name, value, boundary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_bindings() {
        let global = Environment::new_global();
        global.define("x", Value::Int(1));
        let child = global.child();
        assert!(matches!(child.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn set_mutates_defining_scope_not_local() {
        let global = Environment::new_global();
        global.define("x", Value::Int(1));
        let child = global.child();
        child.set("x", Value::Int(2));
        assert!(matches!(global.get("x"), Some(Value::Int(2))));
        // `set` did not create a shadow binding in `child`.
        assert!(!child.0.borrow().vars.contains_key("x"));
    }

    #[test]
    fn set_defines_locally_when_undefined_anywhere() {
        let global = Environment::new_global();
        let child = global.child();
        child.set("y", Value::Int(5));
        assert!(global.get("y").is_none());
        assert!(matches!(child.get("y"), Some(Value::Int(5))));
    }

    #[test]
    fn define_shadows_without_safeguard() {
        let global = Environment::new_global();
        global.define("x", Value::Int(1));
        let child = global.child();
        child.define("x", Value::Int(99));
        assert!(matches!(child.get("x"), Some(Value::Int(99))));
        assert!(matches!(global.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn before_helpers_stop_at_the_boundary_scope() {
        let global = Environment::new_global();
        global.define("shared", Value::Int(1));
        let frame = global.child();
        let block = frame.child();
        block.define("local", Value::Int(2));

        assert!(block.get_before("local", &global).is_some());
        assert!(block.get_before("shared", &global).is_none());
        assert!(!block.has_before("shared", &global));

        block.set_before("local", Value::Int(3), &global);
        assert!(matches!(block.get("local"), Some(Value::Int(3))));
    }
}
