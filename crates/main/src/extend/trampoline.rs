////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

//! The trampoline registry.
//!
//! A trampoline is a plain function of a slot cell's exact calling
//! convention that, when the host dispatches through the cell, looks up the
//! corresponding dunder-named handler on the operand *at call time* and
//! invokes it. Late lookup is the point: redefining a handler in the type's
//! namespace (or shadowing it in an instance dictionary) takes effect
//! immediately, without re-registering the operation.
//!
//! Calling conventions differ in how they treat a missing handler:
//!
//! - Binary arithmetic trampolines decline cooperatively: a missing handler
//!   (or a handler returning the unsupported sentinel) makes the trampoline
//!   consult the right operand's reflected handler, and if that also
//!   declines, the sentinel propagates to the host.
//! - Unary arithmetic trampolines decline with the sentinel directly.
//! - Everything else (repr, str, iteration, sizing, subscripting, calls) is
//!   strict: a missing handler is a
//!   [MissingHandler](RuntimeError::MissingHandler) error, since no fallback
//!   operand exists to decline to.

use crate::runtime::{
    generic_attr_get,
    generic_attr_set,
    AttrGetFn,
    AttrSetFn,
    BinaryFn,
    InvocationFn,
    Keywords,
    MembershipFn,
    PredicateFn,
    RuntimeError,
    RuntimeResult,
    SizingFn,
    SubscriptAssignFn,
    SubscriptFn,
    TernaryFn,
    UnaryFn,
    Value,
};

use crate::extend::OpSymbol;

/// A trampoline function tagged by its calling convention. The tag is what
/// lets the installer type-check the function against the resolved cell.
#[derive(Clone, Copy, Debug)]
pub(super) enum Trampoline {
    Unary(UnaryFn),
    Binary(BinaryFn),
    Ternary(TernaryFn),
    Predicate(PredicateFn),
    Sizing(SizingFn),
    Membership(MembershipFn),
    SubscriptGet(SubscriptFn),
    SubscriptAssign(SubscriptAssignFn),
    Invocation(InvocationFn),
    AttrGet(AttrGetFn),
    AttrSet(AttrSetFn),
}

/// Returns the trampoline wired for `symbol`. Total over the symbol table.
pub(super) fn lookup_trampoline(symbol: OpSymbol) -> Trampoline {
    use OpSymbol::*;

    match symbol {
        Repr => Trampoline::Unary(repr),
        Str => Trampoline::Unary(str),
        Call => Trampoline::Invocation(call),
        Hash => Trampoline::Sizing(hash),
        Iter => Trampoline::Unary(iter),
        Next => Trampoline::Unary(next),

        // Attribute access bypasses the dunder-lookup machinery entirely:
        // registering it wires the host's own generic routines into the
        // attribute slots.
        GetAttr => Trampoline::AttrGet(generic_attr_get),
        SetAttr => Trampoline::AttrSet(generic_attr_set),

        Len => Trampoline::Sizing(length),
        Contains => Trampoline::Membership(contains),
        GetItem => Trampoline::SubscriptGet(item),
        SetItem | DelItem => Trampoline::SubscriptAssign(assign_item),

        Add => Trampoline::Binary(add),
        Sub => Trampoline::Binary(sub),
        Mul => Trampoline::Binary(mul),
        Mod => Trampoline::Binary(rem),
        Divmod => Trampoline::Binary(divmod),
        Pow => Trampoline::Ternary(power),
        Lshift => Trampoline::Binary(lshift),
        Rshift => Trampoline::Binary(rshift),
        And => Trampoline::Binary(bit_and),
        Xor => Trampoline::Binary(bit_xor),
        Or => Trampoline::Binary(bit_or),
        FloorDiv => Trampoline::Binary(floor_div),
        TrueDiv => Trampoline::Binary(true_div),
        MatMul => Trampoline::Binary(matmul),

        Neg => Trampoline::Unary(neg),
        Pos => Trampoline::Unary(pos),
        Abs => Trampoline::Unary(abs),
        Invert => Trampoline::Unary(invert),
        Int => Trampoline::Unary(to_int),
        Float => Trampoline::Unary(to_float),
        Bool => Trampoline::Predicate(truth),

        IAdd => Trampoline::Binary(inplace_add),
        ISub => Trampoline::Binary(inplace_sub),
        IMul => Trampoline::Binary(inplace_mul),
        IMod => Trampoline::Binary(inplace_rem),
        IPow => Trampoline::Ternary(inplace_power),
        ILshift => Trampoline::Binary(inplace_lshift),
        IRshift => Trampoline::Binary(inplace_rshift),
        IAnd => Trampoline::Binary(inplace_bit_and),
        IXor => Trampoline::Binary(inplace_bit_xor),
        IOr => Trampoline::Binary(inplace_bit_or),
        IFloorDiv => Trampoline::Binary(inplace_floor_div),
        ITrueDiv => Trampoline::Binary(inplace_true_div),
        IMatMul => Trampoline::Binary(inplace_matmul),

        Index => Trampoline::Binary(index),
    }
}

fn required(receiver: &Value, method: &'static str) -> RuntimeResult<Value> {
    receiver
        .lookup(method)
        .ok_or_else(|| RuntimeError::MissingHandler {
            receiver_type: receiver.type_name(),
            method,
        })
}

// The right operand's reflected handler. A missing handler yields the
// unsupported sentinel rather than an error; the host decides what an
// unsupported operand pair means.
fn reflected(lhs: &Value, rhs: &Value, method: &'static str) -> RuntimeResult<Value> {
    let Some(handler) = rhs.lookup(method) else {
        return Ok(Value::not_implemented());
    };

    handler.invoke(rhs, &[lhs.clone()])
}

macro_rules! reflected_binary {
    ($name:ident, $method:literal, $mirror:literal) => {
        fn $name(lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
            if let Some(handler) = lhs.lookup($method) {
                let result = handler.invoke(lhs, &[rhs.clone()])?;

                if !result.is_not_implemented() {
                    return Ok(result);
                }
            }

            reflected(lhs, rhs, $mirror)
        }
    };
}

reflected_binary!(add, "__add__", "__radd__");
reflected_binary!(sub, "__sub__", "__rsub__");
reflected_binary!(mul, "__mul__", "__rmul__");
reflected_binary!(rem, "__mod__", "__rmod__");
reflected_binary!(divmod, "__divmod__", "__rdivmod__");
reflected_binary!(lshift, "__lshift__", "__rlshift__");
reflected_binary!(rshift, "__rshift__", "__rrshift__");
reflected_binary!(bit_and, "__and__", "__rand__");
reflected_binary!(bit_xor, "__xor__", "__rxor__");
reflected_binary!(bit_or, "__or__", "__ror__");
reflected_binary!(floor_div, "__floordiv__", "__rfloordiv__");
reflected_binary!(true_div, "__truediv__", "__rtruediv__");
reflected_binary!(matmul, "__matmul__", "__rmatmul__");

macro_rules! forward_binary {
    ($name:ident, $method:literal) => {
        fn $name(lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
            let Some(handler) = lhs.lookup($method) else {
                return Ok(Value::not_implemented());
            };

            handler.invoke(lhs, &[rhs.clone()])
        }
    };
}

forward_binary!(inplace_add, "__iadd__");
forward_binary!(inplace_sub, "__isub__");
forward_binary!(inplace_mul, "__imul__");
forward_binary!(inplace_rem, "__imod__");
forward_binary!(inplace_lshift, "__ilshift__");
forward_binary!(inplace_rshift, "__irshift__");
forward_binary!(inplace_bit_and, "__iand__");
forward_binary!(inplace_bit_xor, "__ixor__");
forward_binary!(inplace_bit_or, "__ior__");
forward_binary!(inplace_floor_div, "__ifloordiv__");
forward_binary!(inplace_true_div, "__itruediv__");
forward_binary!(inplace_matmul, "__imatmul__");
forward_binary!(index, "__index__");

macro_rules! lenient_unary {
    ($name:ident, $method:literal) => {
        fn $name(receiver: &Value) -> RuntimeResult<Value> {
            let Some(handler) = receiver.lookup($method) else {
                return Ok(Value::not_implemented());
            };

            handler.invoke(receiver, &[])
        }
    };
}

lenient_unary!(neg, "__neg__");
lenient_unary!(pos, "__pos__");
lenient_unary!(abs, "__abs__");
lenient_unary!(invert, "__invert__");
lenient_unary!(to_int, "__int__");
lenient_unary!(to_float, "__float__");

macro_rules! strict_unary {
    ($name:ident, $method:literal) => {
        fn $name(receiver: &Value) -> RuntimeResult<Value> {
            required(receiver, $method)?.invoke(receiver, &[])
        }
    };
}

strict_unary!(repr, "__repr__");
strict_unary!(str, "__str__");
strict_unary!(iter, "__iter__");
strict_unary!(next, "__next__");

// Power and its reflected mirror take an asymmetric path: an absent (or
// declining) "__pow__" falls back to the exponent's plain "__rpow__", and
// the modulus operand does not participate in the fallback.
fn power(receiver: &Value, exponent: &Value, modulus: &Value) -> RuntimeResult<Value> {
    if let Some(handler) = receiver.lookup("__pow__") {
        let result = handler.invoke(receiver, &[exponent.clone(), modulus.clone()])?;

        if !result.is_not_implemented() {
            return Ok(result);
        }
    }

    reflected(receiver, exponent, "__rpow__")
}

fn inplace_power(receiver: &Value, exponent: &Value, modulus: &Value) -> RuntimeResult<Value> {
    let Some(handler) = receiver.lookup("__ipow__") else {
        return Ok(Value::not_implemented());
    };

    handler.invoke(receiver, &[exponent.clone(), modulus.clone()])
}

fn truth(receiver: &Value) -> RuntimeResult<bool> {
    required(receiver, "__bool__")?
        .invoke(receiver, &[])?
        .truthiness()
}

fn length(receiver: &Value) -> RuntimeResult<i64> {
    required(receiver, "__len__")?
        .invoke(receiver, &[])?
        .to_size()
}

fn hash(receiver: &Value) -> RuntimeResult<i64> {
    required(receiver, "__hash__")?
        .invoke(receiver, &[])?
        .to_size()
}

fn contains(receiver: &Value, candidate: &Value) -> RuntimeResult<bool> {
    let result = required(receiver, "__contains__")?
        .invoke(receiver, &[candidate.clone()])?;

    Ok(result.to_size()? != 0)
}

//TODO: Forward the subscript key to the handler once zero-argument
// "__getitem__" registrations are phased out.
fn item(receiver: &Value, _key: &Value) -> RuntimeResult<Value> {
    required(receiver, "__getitem__")?.invoke(receiver, &[])
}

fn assign_item(receiver: &Value, key: &Value, value: Option<&Value>) -> RuntimeResult<()> {
    match value {
        Some(value) => {
            let _ = required(receiver, "__setitem__")?
                .invoke(receiver, &[key.clone(), value.clone()])?;
        }

        None => {
            let _ = required(receiver, "__delitem__")?.invoke(receiver, &[key.clone()])?;
        }
    }

    Ok(())
}

fn call(receiver: &Value, args: &[Value], keywords: &Keywords) -> RuntimeResult<Value> {
    required(receiver, "__call__")?.invoke_with_keywords(receiver, args, keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ScriptFn, TypeDescriptor};

    #[test]
    fn test_reflected_fallback_on_missing_handler() {
        let left_ty = TypeDescriptor::new("left");
        let right_ty = TypeDescriptor::new("right");

        right_ty.define(
            "__radd__",
            Value::from(ScriptFn::new("__radd__", 1, |_receiver, _args| {
                Ok(Value::from("reflected"))
            })),
        );

        let lhs = Value::instance(&left_ty);
        let rhs = Value::instance(&right_ty);

        assert_eq!(add(&lhs, &rhs).unwrap().as_str(), Some("reflected"));
    }

    #[test]
    fn test_reflected_fallback_on_sentinel() {
        let left_ty = TypeDescriptor::new("left");
        let right_ty = TypeDescriptor::new("right");

        left_ty.define(
            "__add__",
            Value::from(ScriptFn::new("__add__", 1, |_receiver, _args| {
                Ok(Value::not_implemented())
            })),
        );

        right_ty.define(
            "__radd__",
            Value::from(ScriptFn::new("__radd__", 1, |receiver, _args| {
                Ok(receiver.clone())
            })),
        );

        let lhs = Value::instance(&left_ty);
        let rhs = Value::instance(&right_ty);

        // The reflected handler runs with the right operand as receiver.
        assert_eq!(add(&lhs, &rhs).unwrap(), rhs);
    }

    #[test]
    fn test_both_operands_decline() {
        let ty = TypeDescriptor::new("mute");

        let lhs = Value::instance(&ty);
        let rhs = Value::instance(&ty);

        assert!(sub(&lhs, &rhs).unwrap().is_not_implemented());
    }

    #[test]
    fn test_inplace_has_no_reflected_fallback() {
        let left_ty = TypeDescriptor::new("left");
        let right_ty = TypeDescriptor::new("right");

        right_ty.define(
            "__radd__",
            Value::from(ScriptFn::new("__radd__", 1, |_receiver, _args| {
                Ok(Value::from("reflected"))
            })),
        );

        let lhs = Value::instance(&left_ty);
        let rhs = Value::instance(&right_ty);

        assert!(inplace_add(&lhs, &rhs).unwrap().is_not_implemented());
    }

    #[test]
    fn test_power_falls_back_to_plain_rpow() {
        let base_ty = TypeDescriptor::new("base");
        let exp_ty = TypeDescriptor::new("exponent");

        // The reflected handler is a plain binary: it never sees the
        // modulus operand.
        exp_ty.define(
            "__rpow__",
            Value::from(ScriptFn::new("__rpow__", 1, |_receiver, args| {
                Ok(args[0].clone())
            })),
        );

        let base = Value::instance(&base_ty);
        let exponent = Value::instance(&exp_ty);
        let modulus = Value::nil();

        assert_eq!(power(&base, &exponent, &modulus).unwrap(), base);
    }

    #[test]
    fn test_strict_conventions_report_missing_handlers() {
        let ty = TypeDescriptor::new("opaque");
        let receiver = Value::instance(&ty);

        assert!(matches!(
            repr(&receiver).unwrap_err(),
            RuntimeError::MissingHandler {
                method: "__repr__",
                ..
            },
        ));

        assert!(matches!(
            length(&receiver).unwrap_err(),
            RuntimeError::MissingHandler {
                method: "__len__",
                ..
            },
        ));

        // Lenient conventions decline instead.
        assert!(neg(&receiver).unwrap().is_not_implemented());
    }

    #[test]
    fn test_item_ignores_the_subscript_key() {
        let ty = TypeDescriptor::new("cursor");

        ty.define(
            "__getitem__",
            Value::from(ScriptFn::new("__getitem__", 0, |_receiver, _args| {
                Ok(Value::from(42))
            })),
        );

        let receiver = Value::instance(&ty);

        assert_eq!(
            item(&receiver, &Value::from(7)).unwrap().as_int(),
            Some(42),
        );
    }

    #[test]
    fn test_assignment_and_deletion_split_by_handler() {
        let ty = TypeDescriptor::new("store");

        ty.define(
            "__setitem__",
            Value::from(ScriptFn::new("__setitem__", 2, |receiver, args| {
                let key = args[0].as_str().unwrap_or_default().to_owned();

                generic_attr_set(receiver, &key, Some(&args[1]))?;

                Ok(Value::nil())
            })),
        );

        ty.define(
            "__delitem__",
            Value::from(ScriptFn::new("__delitem__", 1, |receiver, args| {
                let key = args[0].as_str().unwrap_or_default().to_owned();

                generic_attr_set(receiver, &key, None)?;

                Ok(Value::nil())
            })),
        );

        let receiver = Value::instance(&ty);
        let key = Value::from("answer");

        assign_item(&receiver, &key, Some(&Value::from(42))).unwrap();

        assert_eq!(receiver.lookup("answer").unwrap().as_int(), Some(42));

        assign_item(&receiver, &key, None).unwrap();

        assert!(receiver.lookup("answer").is_none());
    }

    #[test]
    fn test_membership_accepts_boolean_and_integer_results() {
        let ty = TypeDescriptor::new("range");

        // Handlers report membership as a boolean or as a raw size; both
        // coerce.
        ty.define(
            "__contains__",
            Value::from(ScriptFn::new("__contains__", 1, |_receiver, args| {
                Ok(Value::from(args[0].as_int() == Some(3)))
            })),
        );

        let receiver = Value::instance(&ty);

        assert!(contains(&receiver, &Value::from(3)).unwrap());
        assert!(!contains(&receiver, &Value::from(4)).unwrap());

        ty.define(
            "__contains__",
            Value::from(ScriptFn::new("__contains__", 1, |_receiver, _args| {
                Ok(Value::from(1))
            })),
        );

        assert!(contains(&receiver, &Value::nil()).unwrap());

        let bare = Value::instance(&TypeDescriptor::new("bare"));

        assert!(matches!(
            contains(&bare, &Value::nil()).unwrap_err(),
            RuntimeError::MissingHandler {
                method: "__contains__",
                ..
            },
        ));
    }

    #[test]
    fn test_late_lookup_sees_redefined_handlers() {
        let ty = TypeDescriptor::new("mutable");
        let receiver = Value::instance(&ty);

        assert!(matches!(
            truth(&receiver).unwrap_err(),
            RuntimeError::MissingHandler { .. },
        ));

        ty.define(
            "__bool__",
            Value::from(ScriptFn::new("__bool__", 0, |_receiver, _args| {
                Ok(Value::from(true))
            })),
        );

        assert!(truth(&receiver).unwrap());
    }
}
