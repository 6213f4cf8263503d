////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

use std::rc::Rc;

use crate::{
    extend::OpSymbol,
    runtime::{
        BinaryFn,
        Keywords,
        MappingSlots,
        NumberSlots,
        RuntimeError,
        RuntimeResult,
        SequenceSlots,
        SlotCell,
        TernaryFn,
        TypeDescriptor,
        TypeRef,
        UnaryFn,
        Value,
    },
};

/// The host evaluator's view of a dispatchable value: a borrow of the value
/// plus a handle over its type descriptor, exposing one entry point per
/// operator form.
///
/// Binary entry points implement the host's resolution discipline on top of
/// the dispatch table: read the left type's slot; treat an absent slot or an
/// unsupported-sentinel result as "try the right type's slot" (skipped when
/// both operands share a type); and if both sides decline, surface
/// [UnsupportedOperands](RuntimeError::UnsupportedOperands). An operation
/// with no wired slot on any eligible side is
/// [UndefinedOperator](RuntimeError::UndefinedOperator).
///
/// In-place and unary entry points consult the receiver's type only.
pub struct Object<'a> {
    receiver: &'a Value,
    ty: TypeRef,
}

impl<'a> Object<'a> {
    /// Wraps a value for dispatch. Values without a type descriptor (nil,
    /// primitives, bare functions) are a
    /// [TypeMismatch](RuntimeError::TypeMismatch).
    pub fn of(receiver: &'a Value) -> RuntimeResult<Self> {
        let Some(ty) = receiver.type_of() else {
            return Err(RuntimeError::TypeMismatch {
                expected: "an instance with a type descriptor",
                actual: receiver.type_name(),
            });
        };

        Ok(Self {
            receiver,
            ty: TypeRef::clone(ty),
        })
    }

    /// The wrapped value.
    #[inline(always)]
    pub fn receiver(&self) -> &Value {
        self.receiver
    }

    /// The wrapped value's type descriptor.
    #[inline(always)]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn add(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Add, rhs, |ty| {
            number(ty, |block| &block.add).or_else(|| sequence(ty, |block| &block.concat))
        })
    }

    pub fn sub(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Sub, rhs, |ty| number(ty, |block| &block.subtract))
    }

    pub fn mul(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Mul, rhs, |ty| {
            number(ty, |block| &block.multiply).or_else(|| sequence(ty, |block| &block.repeat))
        })
    }

    pub fn rem(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Mod, rhs, |ty| number(ty, |block| &block.remainder))
    }

    pub fn divmod(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Divmod, rhs, |ty| number(ty, |block| &block.divmod))
    }

    /// Raises the receiver to `exponent`, optionally modulo `modulus` (the
    /// host passes nil for the plain two-operand form).
    pub fn pow(&self, exponent: &Value, modulus: &Value) -> RuntimeResult<Value> {
        self.ternary(OpSymbol::Pow, exponent, modulus, |ty| {
            number(ty, |block| &block.power)
        })
    }

    pub fn shl(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Lshift, rhs, |ty| {
            number(ty, |block| &block.shift_left)
        })
    }

    pub fn shr(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Rshift, rhs, |ty| {
            number(ty, |block| &block.shift_right)
        })
    }

    pub fn bit_and(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::And, rhs, |ty| number(ty, |block| &block.bit_and))
    }

    pub fn bit_xor(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Xor, rhs, |ty| number(ty, |block| &block.bit_xor))
    }

    pub fn bit_or(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::Or, rhs, |ty| number(ty, |block| &block.bit_or))
    }

    pub fn floor_div(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::FloorDiv, rhs, |ty| {
            number(ty, |block| &block.floor_divide)
        })
    }

    pub fn true_div(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::TrueDiv, rhs, |ty| {
            number(ty, |block| &block.true_divide)
        })
    }

    pub fn matmul(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.binary(OpSymbol::MatMul, rhs, |ty| {
            number(ty, |block| &block.matrix_multiply)
        })
    }

    pub fn neg(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Neg, number(&self.ty, |block| &block.negative))
    }

    pub fn pos(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Pos, number(&self.ty, |block| &block.positive))
    }

    pub fn abs(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Abs, number(&self.ty, |block| &block.absolute))
    }

    pub fn invert(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Invert, number(&self.ty, |block| &block.invert))
    }

    pub fn to_int(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Int, number(&self.ty, |block| &block.to_int))
    }

    pub fn to_float(&self) -> RuntimeResult<Value> {
        self.unary(OpSymbol::Float, number(&self.ty, |block| &block.to_float))
    }

    /// Truth-tests the receiver through the numeric block's predicate slot.
    pub fn truth(&self) -> RuntimeResult<bool> {
        let Some(function) = number(&self.ty, |block| &block.truth) else {
            return Err(self.undefined(OpSymbol::Bool));
        };

        function(self.receiver)
    }

    /// An integer usable as a native index, through the numeric block's
    /// index slot. Consults the receiver's type only.
    pub fn index(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(OpSymbol::Index, rhs, number(&self.ty, |block| &block.index))
    }

    pub fn iadd(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IAdd,
            rhs,
            number(&self.ty, |block| &block.inplace_add)
                .or_else(|| sequence(&self.ty, |block| &block.inplace_concat)),
        )
    }

    pub fn isub(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::ISub,
            rhs,
            number(&self.ty, |block| &block.inplace_subtract),
        )
    }

    pub fn imul(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IMul,
            rhs,
            number(&self.ty, |block| &block.inplace_multiply)
                .or_else(|| sequence(&self.ty, |block| &block.inplace_repeat)),
        )
    }

    pub fn irem(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IMod,
            rhs,
            number(&self.ty, |block| &block.inplace_remainder),
        )
    }

    pub fn ipow(&self, exponent: &Value, modulus: &Value) -> RuntimeResult<Value> {
        let Some(function) = number(&self.ty, |block| &block.inplace_power) else {
            return Err(self.undefined(OpSymbol::IPow));
        };

        self.finish(
            OpSymbol::IPow,
            Some(exponent),
            function(self.receiver, exponent, modulus)?,
        )
    }

    pub fn ishl(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::ILshift,
            rhs,
            number(&self.ty, |block| &block.inplace_shift_left),
        )
    }

    pub fn ishr(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IRshift,
            rhs,
            number(&self.ty, |block| &block.inplace_shift_right),
        )
    }

    pub fn ibit_and(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IAnd,
            rhs,
            number(&self.ty, |block| &block.inplace_bit_and),
        )
    }

    pub fn ibit_xor(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IXor,
            rhs,
            number(&self.ty, |block| &block.inplace_bit_xor),
        )
    }

    pub fn ibit_or(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IOr,
            rhs,
            number(&self.ty, |block| &block.inplace_bit_or),
        )
    }

    pub fn ifloor_div(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IFloorDiv,
            rhs,
            number(&self.ty, |block| &block.inplace_floor_divide),
        )
    }

    pub fn itrue_div(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::ITrueDiv,
            rhs,
            number(&self.ty, |block| &block.inplace_true_divide),
        )
    }

    pub fn imatmul(&self, rhs: &Value) -> RuntimeResult<Value> {
        self.strict_binary(
            OpSymbol::IMatMul,
            rhs,
            number(&self.ty, |block| &block.inplace_matrix_multiply),
        )
    }

    /// The receiver's length, through the mapping block's sizing slot or,
    /// failing that, the sequence block's.
    pub fn len(&self) -> RuntimeResult<i64> {
        let slot = mapping(&self.ty, |block| &block.length)
            .or_else(|| sequence(&self.ty, |block| &block.length));

        let Some(function) = slot else {
            return Err(self.undefined(OpSymbol::Len));
        };

        function(self.receiver)
    }

    pub fn contains(&self, candidate: &Value) -> RuntimeResult<bool> {
        let slot = mapping(&self.ty, |block| &block.contains)
            .or_else(|| sequence(&self.ty, |block| &block.contains));

        let Some(function) = slot else {
            return Err(self.undefined(OpSymbol::Contains));
        };

        function(self.receiver, candidate)
    }

    pub fn index_get(&self, key: &Value) -> RuntimeResult<Value> {
        let slot = mapping(&self.ty, |block| &block.subscript)
            .or_else(|| sequence(&self.ty, |block| &block.item));

        let Some(function) = slot else {
            return Err(self.undefined(OpSymbol::GetItem));
        };

        function(self.receiver, key)
    }

    pub fn index_set(&self, key: &Value, value: &Value) -> RuntimeResult<()> {
        let Some(function) = self.assign_slot() else {
            return Err(self.undefined(OpSymbol::SetItem));
        };

        function(self.receiver, key, Some(value))
    }

    pub fn index_delete(&self, key: &Value) -> RuntimeResult<()> {
        let Some(function) = self.assign_slot() else {
            return Err(self.undefined(OpSymbol::DelItem));
        };

        function(self.receiver, key, None)
    }

    /// Calls the receiver through the root invocation slot.
    pub fn invoke(&self, args: &[Value], keywords: &Keywords) -> RuntimeResult<Value> {
        let Some(function) = self.ty.root().call.get() else {
            return Err(self.undefined(OpSymbol::Call));
        };

        function(self.receiver, args, keywords)
    }

    pub fn hash(&self) -> RuntimeResult<i64> {
        let Some(function) = self.ty.root().hash.get() else {
            return Err(self.undefined(OpSymbol::Hash));
        };

        function(self.receiver)
    }

    pub fn attr_get(&self, name: &str) -> RuntimeResult<Value> {
        let Some(function) = self.ty.root().attr_get.get() else {
            return Err(self.undefined(OpSymbol::GetAttr));
        };

        function(self.receiver, name)
    }

    pub fn attr_set(&self, name: &str, value: Option<&Value>) -> RuntimeResult<()> {
        let Some(function) = self.ty.root().attr_set.get() else {
            return Err(self.undefined(OpSymbol::SetAttr));
        };

        function(self.receiver, name, value)
    }

    pub fn repr(&self) -> RuntimeResult<Value> {
        self.root_unary(OpSymbol::Repr, self.ty.root().repr.get())
    }

    pub fn to_str(&self) -> RuntimeResult<Value> {
        self.root_unary(OpSymbol::Str, self.ty.root().str.get())
    }

    pub fn iterate(&self) -> RuntimeResult<Value> {
        self.root_unary(OpSymbol::Iter, self.ty.root().iter.get())
    }

    pub fn next(&self) -> RuntimeResult<Value> {
        self.root_unary(OpSymbol::Next, self.ty.root().next.get())
    }

    fn binary(
        &self,
        symbol: OpSymbol,
        rhs: &Value,
        pick: impl Fn(&TypeDescriptor) -> Option<BinaryFn>,
    ) -> RuntimeResult<Value> {
        let mut dispatched = false;

        if let Some(function) = pick(&self.ty) {
            dispatched = true;

            let result = function(self.receiver, rhs)?;

            if !result.is_not_implemented() {
                return Ok(result);
            }
        }

        if let Some(rhs_ty) = rhs.type_of() {
            if !Rc::ptr_eq(rhs_ty, &self.ty) {
                if let Some(function) = pick(rhs_ty) {
                    dispatched = true;

                    let result = function(self.receiver, rhs)?;

                    if !result.is_not_implemented() {
                        return Ok(result);
                    }
                }
            }
        }

        match dispatched {
            false => Err(self.undefined(symbol)),

            true => Err(RuntimeError::UnsupportedOperands {
                symbol,
                lhs_type: self.receiver.type_name(),
                rhs_type: Some(rhs.type_name()),
            }),
        }
    }

    fn ternary(
        &self,
        symbol: OpSymbol,
        second: &Value,
        third: &Value,
        pick: impl Fn(&TypeDescriptor) -> Option<TernaryFn>,
    ) -> RuntimeResult<Value> {
        let mut dispatched = false;

        if let Some(function) = pick(&self.ty) {
            dispatched = true;

            let result = function(self.receiver, second, third)?;

            if !result.is_not_implemented() {
                return Ok(result);
            }
        }

        if let Some(second_ty) = second.type_of() {
            if !Rc::ptr_eq(second_ty, &self.ty) {
                if let Some(function) = pick(second_ty) {
                    dispatched = true;

                    let result = function(self.receiver, second, third)?;

                    if !result.is_not_implemented() {
                        return Ok(result);
                    }
                }
            }
        }

        match dispatched {
            false => Err(self.undefined(symbol)),

            true => Err(RuntimeError::UnsupportedOperands {
                symbol,
                lhs_type: self.receiver.type_name(),
                rhs_type: Some(second.type_name()),
            }),
        }
    }

    fn strict_binary(
        &self,
        symbol: OpSymbol,
        rhs: &Value,
        slot: Option<BinaryFn>,
    ) -> RuntimeResult<Value> {
        let Some(function) = slot else {
            return Err(self.undefined(symbol));
        };

        self.finish(symbol, Some(rhs), function(self.receiver, rhs)?)
    }

    fn unary(&self, symbol: OpSymbol, slot: Option<UnaryFn>) -> RuntimeResult<Value> {
        let Some(function) = slot else {
            return Err(self.undefined(symbol));
        };

        self.finish(symbol, None, function(self.receiver)?)
    }

    fn root_unary(&self, symbol: OpSymbol, slot: Option<UnaryFn>) -> RuntimeResult<Value> {
        let Some(function) = slot else {
            return Err(self.undefined(symbol));
        };

        function(self.receiver)
    }

    fn assign_slot(&self) -> Option<crate::runtime::SubscriptAssignFn> {
        mapping(&self.ty, |block| &block.assign_subscript)
            .or_else(|| sequence(&self.ty, |block| &block.assign_item))
    }

    fn finish(
        &self,
        symbol: OpSymbol,
        rhs: Option<&Value>,
        result: Value,
    ) -> RuntimeResult<Value> {
        match result.is_not_implemented() {
            false => Ok(result),

            true => Err(RuntimeError::UnsupportedOperands {
                symbol,
                lhs_type: self.receiver.type_name(),
                rhs_type: rhs.map(Value::type_name),
            }),
        }
    }

    #[inline(always)]
    fn undefined(&self, symbol: OpSymbol) -> RuntimeError {
        RuntimeError::UndefinedOperator {
            symbol,
            receiver_type: self.receiver.type_name(),
        }
    }
}

fn number<F: Copy>(
    ty: &TypeDescriptor,
    pick: impl Fn(&NumberSlots) -> &SlotCell<F>,
) -> Option<F> {
    ty.number().and_then(|block| pick(block).get())
}

fn sequence<F: Copy>(
    ty: &TypeDescriptor,
    pick: impl Fn(&SequenceSlots) -> &SlotCell<F>,
) -> Option<F> {
    ty.sequence().and_then(|block| pick(block).get())
}

fn mapping<F: Copy>(
    ty: &TypeDescriptor,
    pick: impl Fn(&MappingSlots) -> &SlotCell<F>,
) -> Option<F> {
    ty.mapping().and_then(|block| pick(block).get())
}
