////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

use compact_str::ToCompactString;

use crate::{
    extend::{trampoline::Trampoline, OpSymbol},
    report::system_panic,
    runtime::{RuntimeError, RuntimeResult, TypeDescriptor},
};

/// The resolved location of an operation's slot cell: the hosting block
/// kind plus the field within it.
///
/// A reference is recomputed on every registration call and never cached:
/// for the dual-eligible symbol families, attaching a higher-precedence
/// block between two registrations changes where the next registration
/// lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotCellRef {
    /// A slot on the type descriptor itself, outside any protocol block.
    Root(RootSlot),

    /// A slot within the numeric protocol block.
    Number(NumberSlot),

    /// A slot within the sequence protocol block.
    Sequence(SequenceSlot),

    /// A slot within the mapping protocol block.
    Mapping(MappingSlot),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootSlot {
    Repr,
    Str,
    Call,
    Hash,
    AttrGet,
    AttrSet,
    Iter,
    Next,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberSlot {
    Add,
    Subtract,
    Multiply,
    Remainder,
    Divmod,
    Power,
    Negative,
    Positive,
    Absolute,
    Truth,
    Invert,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitXor,
    BitOr,
    ToInt,
    ToFloat,
    InplaceAdd,
    InplaceSubtract,
    InplaceMultiply,
    InplaceRemainder,
    InplacePower,
    InplaceShiftLeft,
    InplaceShiftRight,
    InplaceBitAnd,
    InplaceBitXor,
    InplaceBitOr,
    FloorDivide,
    TrueDivide,
    InplaceFloorDivide,
    InplaceTrueDivide,
    Index,
    MatrixMultiply,
    InplaceMatrixMultiply,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceSlot {
    Length,
    Concat,
    Repeat,
    Item,
    AssignItem,
    Contains,
    InplaceConcat,
    InplaceRepeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingSlot {
    Length,
    Subscript,
    AssignSubscript,
    Contains,
}

/// Resolves the dispatch-table cell that `symbol` occupies for the type's
/// current block configuration.
///
/// Resolution by symbol family:
///
/// - Root symbols (repr, str, call, hash, getattr, setattr, iter, next) map
///   to a fixed cell on the descriptor itself and always resolve; no block
///   is required or allocated.
/// - The length/subscript family (len, getitem, setitem/delitem, contains)
///   prefers the mapping block's cell, then the sequence block's.
/// - add/iadd/mul/imul prefer the numeric block's arithmetic cells; on a
///   sequence-only type they land in the concatenation/repetition cells
///   (and their in-place twins) instead.
/// - Every other symbol requires the numeric block.
///
/// Whenever two blocks could host a symbol, the tie-break is fixed: number
/// over sequence, sequence over mapping. A type lacking every eligible
/// block yields [MissingBlock](RuntimeError::MissingBlock).
pub fn resolve(ty: &TypeDescriptor, symbol: OpSymbol) -> RuntimeResult<SlotCellRef> {
    use OpSymbol::*;

    let cell = match symbol {
        Repr => SlotCellRef::Root(RootSlot::Repr),
        Str => SlotCellRef::Root(RootSlot::Str),
        Call => SlotCellRef::Root(RootSlot::Call),
        Hash => SlotCellRef::Root(RootSlot::Hash),
        GetAttr => SlotCellRef::Root(RootSlot::AttrGet),
        SetAttr => SlotCellRef::Root(RootSlot::AttrSet),
        Iter => SlotCellRef::Root(RootSlot::Iter),
        Next => SlotCellRef::Root(RootSlot::Next),

        Len => subscript_family(ty, symbol, MappingSlot::Length, SequenceSlot::Length)?,
        GetItem => subscript_family(ty, symbol, MappingSlot::Subscript, SequenceSlot::Item)?,

        SetItem | DelItem => subscript_family(
            ty,
            symbol,
            MappingSlot::AssignSubscript,
            SequenceSlot::AssignItem,
        )?,

        Contains => subscript_family(ty, symbol, MappingSlot::Contains, SequenceSlot::Contains)?,

        Add => additive_family(ty, symbol, NumberSlot::Add, SequenceSlot::Concat)?,
        IAdd => additive_family(ty, symbol, NumberSlot::InplaceAdd, SequenceSlot::InplaceConcat)?,
        Mul => additive_family(ty, symbol, NumberSlot::Multiply, SequenceSlot::Repeat)?,
        IMul => additive_family(
            ty,
            symbol,
            NumberSlot::InplaceMultiply,
            SequenceSlot::InplaceRepeat,
        )?,

        Sub => number_family(ty, symbol, NumberSlot::Subtract)?,
        Mod => number_family(ty, symbol, NumberSlot::Remainder)?,
        Divmod => number_family(ty, symbol, NumberSlot::Divmod)?,
        Pow => number_family(ty, symbol, NumberSlot::Power)?,
        Neg => number_family(ty, symbol, NumberSlot::Negative)?,
        Pos => number_family(ty, symbol, NumberSlot::Positive)?,
        Abs => number_family(ty, symbol, NumberSlot::Absolute)?,
        Bool => number_family(ty, symbol, NumberSlot::Truth)?,
        Invert => number_family(ty, symbol, NumberSlot::Invert)?,
        Lshift => number_family(ty, symbol, NumberSlot::ShiftLeft)?,
        Rshift => number_family(ty, symbol, NumberSlot::ShiftRight)?,
        And => number_family(ty, symbol, NumberSlot::BitAnd)?,
        Xor => number_family(ty, symbol, NumberSlot::BitXor)?,
        Or => number_family(ty, symbol, NumberSlot::BitOr)?,
        Int => number_family(ty, symbol, NumberSlot::ToInt)?,
        Float => number_family(ty, symbol, NumberSlot::ToFloat)?,

        ISub => number_family(ty, symbol, NumberSlot::InplaceSubtract)?,
        IMod => number_family(ty, symbol, NumberSlot::InplaceRemainder)?,
        IPow => number_family(ty, symbol, NumberSlot::InplacePower)?,
        ILshift => number_family(ty, symbol, NumberSlot::InplaceShiftLeft)?,
        IRshift => number_family(ty, symbol, NumberSlot::InplaceShiftRight)?,
        IAnd => number_family(ty, symbol, NumberSlot::InplaceBitAnd)?,
        IXor => number_family(ty, symbol, NumberSlot::InplaceBitXor)?,
        IOr => number_family(ty, symbol, NumberSlot::InplaceBitOr)?,

        FloorDiv => number_family(ty, symbol, NumberSlot::FloorDivide)?,
        TrueDiv => number_family(ty, symbol, NumberSlot::TrueDivide)?,
        IFloorDiv => number_family(ty, symbol, NumberSlot::InplaceFloorDivide)?,
        ITrueDiv => number_family(ty, symbol, NumberSlot::InplaceTrueDivide)?,

        Index => number_family(ty, symbol, NumberSlot::Index)?,

        MatMul => number_family(ty, symbol, NumberSlot::MatrixMultiply)?,
        IMatMul => number_family(ty, symbol, NumberSlot::InplaceMatrixMultiply)?,
    };

    Ok(cell)
}

fn subscript_family(
    ty: &TypeDescriptor,
    symbol: OpSymbol,
    mapping: MappingSlot,
    sequence: SequenceSlot,
) -> RuntimeResult<SlotCellRef> {
    if ty.has_mapping() {
        return Ok(SlotCellRef::Mapping(mapping));
    }

    if ty.has_sequence() {
        return Ok(SlotCellRef::Sequence(sequence));
    }

    Err(RuntimeError::MissingBlock {
        symbol,
        receiver_type: ty.name().to_compact_string(),
        required: "mapping or sequence",
    })
}

fn additive_family(
    ty: &TypeDescriptor,
    symbol: OpSymbol,
    number: NumberSlot,
    sequence: SequenceSlot,
) -> RuntimeResult<SlotCellRef> {
    if ty.has_number() {
        return Ok(SlotCellRef::Number(number));
    }

    if ty.has_sequence() {
        return Ok(SlotCellRef::Sequence(sequence));
    }

    Err(RuntimeError::MissingBlock {
        symbol,
        receiver_type: ty.name().to_compact_string(),
        required: "number or sequence",
    })
}

fn number_family(
    ty: &TypeDescriptor,
    symbol: OpSymbol,
    number: NumberSlot,
) -> RuntimeResult<SlotCellRef> {
    if ty.has_number() {
        return Ok(SlotCellRef::Number(number));
    }

    Err(RuntimeError::MissingBlock {
        symbol,
        receiver_type: ty.name().to_compact_string(),
        required: "number",
    })
}

/// Writes the trampoline's function pointer into the resolved cell.
///
/// The symbol table guarantees that the resolver and the trampoline
/// registry agree on the calling convention of every symbol; a mismatch
/// here means the table itself is broken.
pub(super) fn install(ty: &TypeDescriptor, cell: SlotCellRef, trampoline: Trampoline) {
    match cell {
        SlotCellRef::Root(slot) => {
            let root = ty.root();

            match (slot, trampoline) {
                (RootSlot::Repr, Trampoline::Unary(function)) => root.repr.set(function),
                (RootSlot::Str, Trampoline::Unary(function)) => root.str.set(function),
                (RootSlot::Call, Trampoline::Invocation(function)) => root.call.set(function),
                (RootSlot::Hash, Trampoline::Sizing(function)) => root.hash.set(function),
                (RootSlot::AttrGet, Trampoline::AttrGet(function)) => root.attr_get.set(function),
                (RootSlot::AttrSet, Trampoline::AttrSet(function)) => root.attr_set.set(function),
                (RootSlot::Iter, Trampoline::Unary(function)) => root.iter.set(function),
                (RootSlot::Next, Trampoline::Unary(function)) => root.next.set(function),

                (slot, trampoline) => {
                    system_panic!("Root slot {:?} convention mismatch: {:?}.", slot, trampoline)
                }
            }
        }

        SlotCellRef::Number(slot) => {
            let Some(block) = ty.number() else {
                system_panic!("Number cell resolved without a number block.");
            };

            match (slot, trampoline) {
                (NumberSlot::Add, Trampoline::Binary(function)) => block.add.set(function),

                (NumberSlot::Subtract, Trampoline::Binary(function)) => {
                    block.subtract.set(function)
                }

                (NumberSlot::Multiply, Trampoline::Binary(function)) => {
                    block.multiply.set(function)
                }

                (NumberSlot::Remainder, Trampoline::Binary(function)) => {
                    block.remainder.set(function)
                }

                (NumberSlot::Divmod, Trampoline::Binary(function)) => block.divmod.set(function),
                (NumberSlot::Power, Trampoline::Ternary(function)) => block.power.set(function),

                (NumberSlot::Negative, Trampoline::Unary(function)) => {
                    block.negative.set(function)
                }

                (NumberSlot::Positive, Trampoline::Unary(function)) => {
                    block.positive.set(function)
                }

                (NumberSlot::Absolute, Trampoline::Unary(function)) => {
                    block.absolute.set(function)
                }

                (NumberSlot::Truth, Trampoline::Predicate(function)) => block.truth.set(function),
                (NumberSlot::Invert, Trampoline::Unary(function)) => block.invert.set(function),

                (NumberSlot::ShiftLeft, Trampoline::Binary(function)) => {
                    block.shift_left.set(function)
                }

                (NumberSlot::ShiftRight, Trampoline::Binary(function)) => {
                    block.shift_right.set(function)
                }

                (NumberSlot::BitAnd, Trampoline::Binary(function)) => block.bit_and.set(function),
                (NumberSlot::BitXor, Trampoline::Binary(function)) => block.bit_xor.set(function),
                (NumberSlot::BitOr, Trampoline::Binary(function)) => block.bit_or.set(function),
                (NumberSlot::ToInt, Trampoline::Unary(function)) => block.to_int.set(function),
                (NumberSlot::ToFloat, Trampoline::Unary(function)) => block.to_float.set(function),

                (NumberSlot::InplaceAdd, Trampoline::Binary(function)) => {
                    block.inplace_add.set(function)
                }

                (NumberSlot::InplaceSubtract, Trampoline::Binary(function)) => {
                    block.inplace_subtract.set(function)
                }

                (NumberSlot::InplaceMultiply, Trampoline::Binary(function)) => {
                    block.inplace_multiply.set(function)
                }

                (NumberSlot::InplaceRemainder, Trampoline::Binary(function)) => {
                    block.inplace_remainder.set(function)
                }

                (NumberSlot::InplacePower, Trampoline::Ternary(function)) => {
                    block.inplace_power.set(function)
                }

                (NumberSlot::InplaceShiftLeft, Trampoline::Binary(function)) => {
                    block.inplace_shift_left.set(function)
                }

                (NumberSlot::InplaceShiftRight, Trampoline::Binary(function)) => {
                    block.inplace_shift_right.set(function)
                }

                (NumberSlot::InplaceBitAnd, Trampoline::Binary(function)) => {
                    block.inplace_bit_and.set(function)
                }

                (NumberSlot::InplaceBitXor, Trampoline::Binary(function)) => {
                    block.inplace_bit_xor.set(function)
                }

                (NumberSlot::InplaceBitOr, Trampoline::Binary(function)) => {
                    block.inplace_bit_or.set(function)
                }

                (NumberSlot::FloorDivide, Trampoline::Binary(function)) => {
                    block.floor_divide.set(function)
                }

                (NumberSlot::TrueDivide, Trampoline::Binary(function)) => {
                    block.true_divide.set(function)
                }

                (NumberSlot::InplaceFloorDivide, Trampoline::Binary(function)) => {
                    block.inplace_floor_divide.set(function)
                }

                (NumberSlot::InplaceTrueDivide, Trampoline::Binary(function)) => {
                    block.inplace_true_divide.set(function)
                }

                (NumberSlot::Index, Trampoline::Binary(function)) => block.index.set(function),

                (NumberSlot::MatrixMultiply, Trampoline::Binary(function)) => {
                    block.matrix_multiply.set(function)
                }

                (NumberSlot::InplaceMatrixMultiply, Trampoline::Binary(function)) => {
                    block.inplace_matrix_multiply.set(function)
                }

                (slot, trampoline) => {
                    system_panic!(
                        "Number slot {:?} convention mismatch: {:?}.",
                        slot,
                        trampoline,
                    )
                }
            }
        }

        SlotCellRef::Sequence(slot) => {
            let Some(block) = ty.sequence() else {
                system_panic!("Sequence cell resolved without a sequence block.");
            };

            match (slot, trampoline) {
                (SequenceSlot::Length, Trampoline::Sizing(function)) => {
                    block.length.set(function)
                }

                (SequenceSlot::Concat, Trampoline::Binary(function)) => {
                    block.concat.set(function)
                }

                (SequenceSlot::Repeat, Trampoline::Binary(function)) => {
                    block.repeat.set(function)
                }

                (SequenceSlot::Item, Trampoline::SubscriptGet(function)) => {
                    block.item.set(function)
                }

                (SequenceSlot::AssignItem, Trampoline::SubscriptAssign(function)) => {
                    block.assign_item.set(function)
                }

                (SequenceSlot::Contains, Trampoline::Membership(function)) => {
                    block.contains.set(function)
                }

                (SequenceSlot::InplaceConcat, Trampoline::Binary(function)) => {
                    block.inplace_concat.set(function)
                }

                (SequenceSlot::InplaceRepeat, Trampoline::Binary(function)) => {
                    block.inplace_repeat.set(function)
                }

                (slot, trampoline) => {
                    system_panic!(
                        "Sequence slot {:?} convention mismatch: {:?}.",
                        slot,
                        trampoline,
                    )
                }
            }
        }

        SlotCellRef::Mapping(slot) => {
            let Some(block) = ty.mapping() else {
                system_panic!("Mapping cell resolved without a mapping block.");
            };

            match (slot, trampoline) {
                (MappingSlot::Length, Trampoline::Sizing(function)) => block.length.set(function),

                (MappingSlot::Subscript, Trampoline::SubscriptGet(function)) => {
                    block.subscript.set(function)
                }

                (MappingSlot::AssignSubscript, Trampoline::SubscriptAssign(function)) => {
                    block.assign_subscript.set(function)
                }

                (MappingSlot::Contains, Trampoline::Membership(function)) => {
                    block.contains.set(function)
                }

                (slot, trampoline) => {
                    system_panic!(
                        "Mapping slot {:?} convention mismatch: {:?}.",
                        slot,
                        trampoline,
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        extend::ensure_protocol_blocks,
        runtime::{ProtocolMask, TypeDescriptor},
    };

    #[test]
    fn test_root_slots_resolve_without_blocks() {
        let ty = TypeDescriptor::new("bare");

        for symbol in [
            OpSymbol::Repr,
            OpSymbol::Str,
            OpSymbol::Call,
            OpSymbol::Hash,
            OpSymbol::GetAttr,
            OpSymbol::SetAttr,
            OpSymbol::Iter,
            OpSymbol::Next,
        ] {
            assert!(matches!(
                resolve(&ty, symbol).unwrap(),
                SlotCellRef::Root(..),
            ));
        }

        assert!(!ty.has_number());
        assert!(!ty.has_sequence());
        assert!(!ty.has_mapping());
    }

    #[test]
    fn test_additive_family_precedence() {
        let ty = TypeDescriptor::new("rope");

        for symbol in [OpSymbol::Add, OpSymbol::IAdd, OpSymbol::Mul, OpSymbol::IMul] {
            assert!(matches!(
                resolve(&ty, symbol).unwrap_err(),
                RuntimeError::MissingBlock { .. },
            ));
        }

        ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

        assert_eq!(
            resolve(&ty, OpSymbol::Add).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::Concat),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::IAdd).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::InplaceConcat),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::Mul).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::Repeat),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::IMul).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::InplaceRepeat),
        );

        // Precedence is re-evaluated per call, not cached.
        ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

        assert_eq!(
            resolve(&ty, OpSymbol::Add).unwrap(),
            SlotCellRef::Number(NumberSlot::Add),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::IMul).unwrap(),
            SlotCellRef::Number(NumberSlot::InplaceMultiply),
        );
    }

    #[test]
    fn test_subscript_family_precedence() {
        let ty = TypeDescriptor::new("registry");

        ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

        assert_eq!(
            resolve(&ty, OpSymbol::Len).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::Length),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::GetItem).unwrap(),
            SlotCellRef::Sequence(SequenceSlot::Item),
        );

        ensure_protocol_blocks(&ty, ProtocolMask::MAPPING);

        assert_eq!(
            resolve(&ty, OpSymbol::Len).unwrap(),
            SlotCellRef::Mapping(MappingSlot::Length),
        );
        assert_eq!(
            resolve(&ty, OpSymbol::Contains).unwrap(),
            SlotCellRef::Mapping(MappingSlot::Contains),
        );

        // Assignment and deletion share one physical cell.
        assert_eq!(
            resolve(&ty, OpSymbol::SetItem).unwrap(),
            resolve(&ty, OpSymbol::DelItem).unwrap(),
        );
    }

    #[test]
    fn test_number_only_symbols() {
        let ty = TypeDescriptor::new("matrix");

        ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

        assert_eq!(
            resolve(&ty, OpSymbol::MatMul).unwrap(),
            SlotCellRef::Number(NumberSlot::MatrixMultiply),
        );

        // A numeric block alone cannot host subscripting.
        assert!(matches!(
            resolve(&ty, OpSymbol::GetItem).unwrap_err(),
            RuntimeError::MissingBlock { .. },
        ));

        // A sequence block alone cannot host subtraction.
        let rope = TypeDescriptor::new("rope");

        ensure_protocol_blocks(&rope, ProtocolMask::SEQUENCE);

        assert!(matches!(
            resolve(&rope, OpSymbol::Sub).unwrap_err(),
            RuntimeError::MissingBlock { .. },
        ));
    }
}
