////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

use std::{
    cell::RefCell,
    fmt::{Debug, Formatter},
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::{CompactString, ToCompactString};

use crate::runtime::{RuntimeError, RuntimeResult, TypeRef};

/// Keyword arguments of an invocation, forwarded unchanged by the call
/// trampoline.
pub type Keywords = [(CompactString, Value)];

/// A user-supplied handler method.
///
/// Handlers are looked up by name on the operand(s) at trampoline call time
/// and invoked under the receiver-first convention: the body receives the
/// receiver, the positional arguments, and the keyword arguments.
///
/// The declared arity counts positional arguments only and is the single
/// signature property the runtime validates; a [variadic](Self::variadic)
/// handler accepts any number of them.
#[derive(Clone)]
pub struct ScriptFn {
    name: CompactString,
    arity: Option<usize>,
    body: Rc<dyn Fn(&Value, &[Value], &Keywords) -> RuntimeResult<Value>>,
}

impl Debug for ScriptFn {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.arity {
            Some(arity) => {
                formatter.write_fmt(format_args!("ScriptFn({}/{})", self.name, arity))
            }

            None => formatter.write_fmt(format_args!("ScriptFn({}/variadic)", self.name)),
        }
    }
}

impl ScriptFn {
    /// Creates a handler with a fixed positional `arity`. The body ignores
    /// keyword arguments.
    pub fn new(
        name: impl Into<CompactString>,
        arity: usize,
        body: impl Fn(&Value, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity: Some(arity),
            body: Rc::new(move |receiver, args, _keywords| body(receiver, args)),
        }
    }

    /// Creates a handler accepting any number of positional arguments along
    /// with keyword arguments.
    pub fn variadic(
        name: impl Into<CompactString>,
        body: impl Fn(&Value, &[Value], &Keywords) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity: None,
            body: Rc::new(body),
        }
    }

    /// The name of the handler.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        receiver: &Value,
        args: &[Value],
        keywords: &Keywords,
    ) -> RuntimeResult<Value> {
        if let Some(parameters) = self.arity {
            if parameters != args.len() {
                return Err(RuntimeError::ArityMismatch {
                    function: self.name.clone(),
                    parameters,
                    arguments: args.len(),
                });
            }
        }

        (self.body)(receiver, args, keywords)
    }
}

#[derive(Debug)]
enum ValueRepr {
    Nil,
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    Function(ScriptFn),
    Instance(Instance),
}

#[derive(Debug)]
struct Instance {
    ty: TypeRef,
    dict: RefCell<AHashMap<CompactString, Value>>,
}

/// A cheaply clonable handle over a dynamic runtime value.
///
/// Beyond the ordinary data variants, the model carries the host's two
/// protocol values:
///
/// - [nil](Self::nil) — the absence of data;
/// - [not_implemented](Self::not_implemented) — the *unsupported sentinel*:
///   a cooperative "this operand combination is not handled here" signal,
///   distinct from raising an error, that drives the reflected-fallback
///   chains of binary operators.
///
/// An [instance](Self::instance) value holds its [TypeRef] and a
/// per-instance attribute dictionary; [handler lookup](Self::lookup)
/// consults the dictionary first and the type's attached namespace second.
#[derive(Clone, Debug)]
pub struct Value {
    repr: Rc<ValueRepr>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.repr, &*other.repr) {
            (ValueRepr::Nil, ValueRepr::Nil) => true,
            (ValueRepr::NotImplemented, ValueRepr::NotImplemented) => true,
            (ValueRepr::Bool(this), ValueRepr::Bool(other)) => this == other,
            (ValueRepr::Int(this), ValueRepr::Int(other)) => this == other,
            (ValueRepr::Float(this), ValueRepr::Float(other)) => this == other,
            (ValueRepr::Str(this), ValueRepr::Str(other)) => this == other,

            _ => Rc::ptr_eq(&self.repr, &other.repr),
        }
    }
}

impl From<bool> for Value {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::of(ValueRepr::Bool(value))
    }
}

impl From<i64> for Value {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::of(ValueRepr::Int(value))
    }
}

impl From<f64> for Value {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::of(ValueRepr::Float(value))
    }
}

impl From<&str> for Value {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self::of(ValueRepr::Str(CompactString::from(value)))
    }
}

impl From<ScriptFn> for Value {
    #[inline(always)]
    fn from(value: ScriptFn) -> Self {
        Self::of(ValueRepr::Function(value))
    }
}

impl Value {
    #[inline(always)]
    fn of(repr: ValueRepr) -> Self {
        Self {
            repr: Rc::new(repr),
        }
    }

    /// The absence of data.
    #[inline(always)]
    pub fn nil() -> Self {
        Self::of(ValueRepr::Nil)
    }

    /// The unsupported sentinel.
    #[inline(always)]
    pub fn not_implemented() -> Self {
        Self::of(ValueRepr::NotImplemented)
    }

    /// Creates an instance of the type described by `ty`, with an empty
    /// attribute dictionary.
    pub fn instance(ty: &TypeRef) -> Self {
        Self::of(ValueRepr::Instance(Instance {
            ty: TypeRef::clone(ty),
            dict: RefCell::new(AHashMap::new()),
        }))
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(&*self.repr, ValueRepr::Nil)
    }

    /// Returns true if this value is the unsupported sentinel.
    #[inline(always)]
    pub fn is_not_implemented(&self) -> bool {
        matches!(&*self.repr, ValueRepr::NotImplemented)
    }

    /// The integer payload, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match &*self.repr {
            ValueRepr::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The string payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match &*self.repr {
            ValueRepr::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// The type descriptor of this value, if the value is an instance of a
    /// descriptor-bearing type.
    pub fn type_of(&self) -> Option<&TypeRef> {
        match &*self.repr {
            ValueRepr::Instance(instance) => Some(&instance.ty),
            _ => None,
        }
    }

    /// The user-facing name of this value's type.
    pub fn type_name(&self) -> CompactString {
        match &*self.repr {
            ValueRepr::Nil => CompactString::new_inline("nil"),
            ValueRepr::NotImplemented => CompactString::new_inline("NotImplemented"),
            ValueRepr::Bool(..) => CompactString::new_inline("bool"),
            ValueRepr::Int(..) => CompactString::new_inline("int"),
            ValueRepr::Float(..) => CompactString::new_inline("float"),
            ValueRepr::Str(..) => CompactString::new_inline("str"),
            ValueRepr::Function(function) => function.name.to_compact_string(),
            ValueRepr::Instance(instance) => instance.ty.name().to_compact_string(),
        }
    }

    /// Looks up a named member on this value: the instance attribute
    /// dictionary first, then the type's attached namespace.
    ///
    /// Only instances participate in dynamic lookup; every other variant
    /// yields `None`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let ValueRepr::Instance(instance) = &*self.repr else {
            return None;
        };

        if let Some(member) = instance.dict.borrow().get(name) {
            return Some(member.clone());
        }

        instance.ty.member(name)
    }

    /// Invokes this value as a callable under the receiver-first convention,
    /// without keyword arguments.
    #[inline(always)]
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        self.invoke_with_keywords(receiver, args, &[])
    }

    /// Invokes this value as a callable under the receiver-first convention.
    ///
    /// Returns [NotCallable](RuntimeError::NotCallable) if the value is not
    /// a function, and [ArityMismatch](RuntimeError::ArityMismatch) if the
    /// positional argument count does not match the function's declared
    /// arity.
    pub fn invoke_with_keywords(
        &self,
        receiver: &Value,
        args: &[Value],
        keywords: &Keywords,
    ) -> RuntimeResult<Value> {
        match &*self.repr {
            ValueRepr::Function(function) => function.call(receiver, args, keywords),

            _ => Err(RuntimeError::NotCallable {
                receiver_type: self.type_name(),
            }),
        }
    }

    /// Coerces this value to a boolean: `false`, `true`, or an integer's
    /// zero test. Everything else is a [TypeMismatch](RuntimeError::TypeMismatch).
    pub fn truthiness(&self) -> RuntimeResult<bool> {
        match &*self.repr {
            ValueRepr::Bool(value) => Ok(*value),
            ValueRepr::Int(value) => Ok(*value != 0),

            _ => Err(RuntimeError::TypeMismatch {
                expected: "a boolean",
                actual: self.type_name(),
            }),
        }
    }

    /// Coerces this value to a native signed size: an integer passes
    /// through, a boolean widens to 0 or 1, a float is narrowed with a
    /// checked cast, and everything else is a
    /// [TypeMismatch](RuntimeError::TypeMismatch).
    pub fn to_size(&self) -> RuntimeResult<i64> {
        match &*self.repr {
            ValueRepr::Int(value) => Ok(*value),
            ValueRepr::Bool(value) => Ok(*value as i64),

            ValueRepr::Float(value) => {
                cast::i64(*value).map_err(|_| RuntimeError::NumberCast {
                    value: *value,
                    to: "a signed size",
                })
            }

            _ => Err(RuntimeError::TypeMismatch {
                expected: "a signed size",
                actual: self.type_name(),
            }),
        }
    }

    fn dict(&self) -> Option<&RefCell<AHashMap<CompactString, Value>>> {
        match &*self.repr {
            ValueRepr::Instance(instance) => Some(&instance.dict),
            _ => None,
        }
    }
}

/// The host's generic attribute-read routine: the receiver's instance
/// dictionary first, then the receiver type's attached namespace.
///
/// This routine (not a custom trampoline) is what gets installed into the
/// attribute-get slot when `"__getattr__"` is registered on a type.
pub fn generic_attr_get(receiver: &Value, name: &str) -> RuntimeResult<Value> {
    receiver
        .lookup(name)
        .ok_or_else(|| RuntimeError::UnknownField {
            receiver_type: receiver.type_name(),
            field: CompactString::from(name),
        })
}

/// The host's generic attribute-write routine: assigns into (or, for a
/// `None` value, deletes from) the receiver's instance dictionary.
///
/// This routine (not a custom trampoline) is what gets installed into the
/// attribute-set slot when `"__setattr__"` is registered on a type.
pub fn generic_attr_set(
    receiver: &Value,
    name: &str,
    value: Option<&Value>,
) -> RuntimeResult<()> {
    let Some(dict) = receiver.dict() else {
        return Err(RuntimeError::TypeMismatch {
            expected: "an instance with an attribute dictionary",
            actual: receiver.type_name(),
        });
    };

    match value {
        Some(value) => {
            let _ = dict
                .borrow_mut()
                .insert(CompactString::from(name), value.clone());

            Ok(())
        }

        None => match dict.borrow_mut().remove(name) {
            Some(..) => Ok(()),

            None => Err(RuntimeError::UnknownField {
                receiver_type: receiver.type_name(),
                field: CompactString::from(name),
            }),
        },
    }
}
