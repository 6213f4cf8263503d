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
    cell::{Cell, RefCell},
    fmt::{Debug, Display, Formatter},
    ops::{BitOr, BitOrAssign},
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;
use log::debug;
use once_cell::unsync::OnceCell;

use crate::runtime::{RuntimeResult, Value};

/// A unary slot: one operand in, a [Value] (possibly the `NotImplemented`
/// sentinel) out.
pub(crate) type UnaryFn = fn(&Value) -> RuntimeResult<Value>;

/// A binary slot. Whether the installed function consults the right
/// operand's reflected handler is a property of the trampoline, not of the
/// cell.
pub(crate) type BinaryFn = fn(&Value, &Value) -> RuntimeResult<Value>;

/// A ternary slot (power and its in-place variant).
pub(crate) type TernaryFn = fn(&Value, &Value, &Value) -> RuntimeResult<Value>;

/// A truth-testing slot. No sentinel fallback exists for this convention.
pub(crate) type PredicateFn = fn(&Value) -> RuntimeResult<bool>;

/// A sizing slot (length and hashing): coerces the handler result to a
/// native signed size.
pub(crate) type SizingFn = fn(&Value) -> RuntimeResult<i64>;

/// A membership slot: receiver and candidate member in, boolean out.
pub(crate) type MembershipFn = fn(&Value, &Value) -> RuntimeResult<bool>;

/// A subscript-read slot: receiver and key in, item out.
pub(crate) type SubscriptFn = fn(&Value, &Value) -> RuntimeResult<Value>;

/// A subscript-write slot. `Some(value)` assigns; `None` deletes. Item
/// assignment and deletion share one physical cell.
pub(crate) type SubscriptAssignFn = fn(&Value, &Value, Option<&Value>) -> RuntimeResult<()>;

/// An invocation slot: receiver, positional arguments, and keyword
/// arguments, forwarded unchanged.
pub(crate) type InvocationFn =
    fn(&Value, &[Value], &[(CompactString, Value)]) -> RuntimeResult<Value>;

/// An attribute-read slot.
pub(crate) type AttrGetFn = fn(&Value, &str) -> RuntimeResult<Value>;

/// An attribute-write slot. `Some(value)` assigns; `None` deletes.
pub(crate) type AttrSetFn = fn(&Value, &str, Option<&Value>) -> RuntimeResult<()>;

/// One function-pointer-sized entry of a dispatch table.
///
/// A cell is either vacant (the host falls back to its default
/// "operation unsupported" behavior) or holds a function of the cell's
/// exact calling convention. Cells are written through interior mutability
/// so that a registration call never needs to hold a long-lived borrow of
/// the descriptor while arbitrary handler code may re-enter the runtime.
pub(crate) struct SlotCell<F: Copy> {
    inner: Cell<Option<F>>,
}

impl<F: Copy> Default for SlotCell<F> {
    #[inline(always)]
    fn default() -> Self {
        Self {
            inner: Cell::new(None),
        }
    }
}

impl<F: Copy> Debug for SlotCell<F> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.inner.get().is_some() {
            true => formatter.write_str("SlotCell(wired)"),
            false => formatter.write_str("SlotCell(vacant)"),
        }
    }
}

impl<F: Copy> SlotCell<F> {
    #[inline(always)]
    pub(crate) fn get(&self) -> Option<F> {
        self.inner.get()
    }

    #[inline(always)]
    pub(crate) fn set(&self, function: F) {
        self.inner.set(Some(function));
    }

    #[inline(always)]
    pub(crate) fn is_wired(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The dispatch slots that live on the type descriptor itself, outside any
/// protocol block. Always present; never allocated on demand.
#[derive(Debug, Default)]
pub(crate) struct RootSlots {
    pub(crate) repr: SlotCell<UnaryFn>,
    pub(crate) str: SlotCell<UnaryFn>,
    pub(crate) call: SlotCell<InvocationFn>,
    pub(crate) hash: SlotCell<SizingFn>,
    pub(crate) attr_get: SlotCell<AttrGetFn>,
    pub(crate) attr_set: SlotCell<AttrSetFn>,
    pub(crate) iter: SlotCell<UnaryFn>,
    pub(crate) next: SlotCell<UnaryFn>,
}

/// The numeric protocol block: arithmetic, bitwise, and coercion slots.
#[derive(Debug, Default)]
pub(crate) struct NumberSlots {
    pub(crate) add: SlotCell<BinaryFn>,
    pub(crate) subtract: SlotCell<BinaryFn>,
    pub(crate) multiply: SlotCell<BinaryFn>,
    pub(crate) remainder: SlotCell<BinaryFn>,
    pub(crate) divmod: SlotCell<BinaryFn>,
    pub(crate) power: SlotCell<TernaryFn>,
    pub(crate) negative: SlotCell<UnaryFn>,
    pub(crate) positive: SlotCell<UnaryFn>,
    pub(crate) absolute: SlotCell<UnaryFn>,
    pub(crate) truth: SlotCell<PredicateFn>,
    pub(crate) invert: SlotCell<UnaryFn>,
    pub(crate) shift_left: SlotCell<BinaryFn>,
    pub(crate) shift_right: SlotCell<BinaryFn>,
    pub(crate) bit_and: SlotCell<BinaryFn>,
    pub(crate) bit_xor: SlotCell<BinaryFn>,
    pub(crate) bit_or: SlotCell<BinaryFn>,
    pub(crate) to_int: SlotCell<UnaryFn>,
    pub(crate) to_float: SlotCell<UnaryFn>,
    pub(crate) inplace_add: SlotCell<BinaryFn>,
    pub(crate) inplace_subtract: SlotCell<BinaryFn>,
    pub(crate) inplace_multiply: SlotCell<BinaryFn>,
    pub(crate) inplace_remainder: SlotCell<BinaryFn>,
    pub(crate) inplace_power: SlotCell<TernaryFn>,
    pub(crate) inplace_shift_left: SlotCell<BinaryFn>,
    pub(crate) inplace_shift_right: SlotCell<BinaryFn>,
    pub(crate) inplace_bit_and: SlotCell<BinaryFn>,
    pub(crate) inplace_bit_xor: SlotCell<BinaryFn>,
    pub(crate) inplace_bit_or: SlotCell<BinaryFn>,
    pub(crate) floor_divide: SlotCell<BinaryFn>,
    pub(crate) true_divide: SlotCell<BinaryFn>,
    pub(crate) inplace_floor_divide: SlotCell<BinaryFn>,
    pub(crate) inplace_true_divide: SlotCell<BinaryFn>,
    pub(crate) index: SlotCell<BinaryFn>,
    pub(crate) matrix_multiply: SlotCell<BinaryFn>,
    pub(crate) inplace_matrix_multiply: SlotCell<BinaryFn>,
}

/// The sequence protocol block.
#[derive(Debug, Default)]
pub(crate) struct SequenceSlots {
    pub(crate) length: SlotCell<SizingFn>,
    pub(crate) concat: SlotCell<BinaryFn>,
    pub(crate) repeat: SlotCell<BinaryFn>,
    pub(crate) item: SlotCell<SubscriptFn>,
    pub(crate) assign_item: SlotCell<SubscriptAssignFn>,
    pub(crate) contains: SlotCell<MembershipFn>,
    pub(crate) inplace_concat: SlotCell<BinaryFn>,
    pub(crate) inplace_repeat: SlotCell<BinaryFn>,
}

/// The mapping protocol block.
#[derive(Debug, Default)]
pub(crate) struct MappingSlots {
    pub(crate) length: SlotCell<SizingFn>,
    pub(crate) subscript: SlotCell<SubscriptFn>,
    pub(crate) assign_subscript: SlotCell<SubscriptAssignFn>,
    pub(crate) contains: SlotCell<MembershipFn>,
}

/// A bit set over the protocol block kinds a type descriptor may carry.
///
/// ```
/// use slotpatch::runtime::ProtocolMask;
///
/// let mask = ProtocolMask::NUMBER | ProtocolMask::SEQUENCE;
///
/// assert!(mask.contains(ProtocolMask::NUMBER));
/// assert!(!mask.contains(ProtocolMask::MAPPING));
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProtocolMask(u8);

impl ProtocolMask {
    /// The empty mask.
    pub const NOTHING: Self = Self(0);

    /// The numeric protocol block.
    pub const NUMBER: Self = Self(1 << 0);

    /// The sequence protocol block.
    pub const SEQUENCE: Self = Self(1 << 1);

    /// The mapping protocol block.
    pub const MAPPING: Self = Self(1 << 2);

    /// Returns true if every block kind of `other` is present in this mask.
    #[inline(always)]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProtocolMask {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOrAssign for ProtocolMask {
    #[inline(always)]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl Debug for ProtocolMask {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("ProtocolMask(")?;

        let mut first = true;

        for (flag, name) in [
            (Self::NUMBER, "number"),
            (Self::SEQUENCE, "sequence"),
            (Self::MAPPING, "mapping"),
        ] {
            if !self.contains(flag) {
                continue;
            }

            match first {
                true => first = false,
                false => formatter.write_str(" | ")?,
            }

            formatter.write_str(name)?;
        }

        if first {
            formatter.write_str("nothing")?;
        }

        formatter.write_str(")")
    }
}

/// A reference-counted handle over a [TypeDescriptor].
///
/// The handle is deliberately neither [Send] nor [Sync]: registration and
/// slot writes are not internally synchronized, and callers must serialize
/// them per type.
pub type TypeRef = Rc<TypeDescriptor>;

/// An externally-owned record describing a type's behavior: its attached
/// namespace of members and its native dispatch table.
///
/// The descriptor is only ever mutated in place — protocol blocks attached,
/// namespace members defined, individual slot cells overwritten. It is never
/// created or destroyed by the retrofitting engine, and everything written
/// into it lives exactly as long as the descriptor itself.
///
/// The [Display] implementation prints the user-facing name of the type.
pub struct TypeDescriptor {
    name: CompactString,
    namespace: RefCell<AHashMap<CompactString, Value>>,
    root: RootSlots,
    number: OnceCell<Box<NumberSlots>>,
    sequence: OnceCell<Box<SequenceSlots>>,
    mapping: OnceCell<Box<MappingSlots>>,
}

impl Debug for TypeDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("number", &self.number.get().is_some())
            .field("sequence", &self.sequence.get().is_some())
            .field("mapping", &self.mapping.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Display for TypeDescriptor {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.name)
    }
}

impl TypeDescriptor {
    /// Creates a descriptor with the specified user-facing `name`, an empty
    /// namespace, and a fully vacant dispatch table.
    pub fn new(name: impl Into<CompactString>) -> TypeRef {
        Rc::new(Self {
            name: name.into(),
            namespace: RefCell::new(AHashMap::new()),
            root: RootSlots::default(),
            number: OnceCell::new(),
            sequence: OnceCell::new(),
            mapping: OnceCell::new(),
        })
    }

    /// The user-facing name of the type.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defines (or redefines) a named member in the type's attached
    /// namespace.
    ///
    /// Defining a member does not by itself wire any dispatch-table cell;
    /// see [register_operation](crate::extend::register_operation).
    pub fn define(&self, name: impl Into<CompactString>, member: Value) {
        let _ = self.namespace.borrow_mut().insert(name.into(), member);
    }

    /// Looks up a member of the type's attached namespace.
    pub fn member(&self, name: &str) -> Option<Value> {
        self.namespace.borrow().get(name).cloned()
    }

    /// Returns a read-only snapshot of the type's attached namespace. The
    /// member values are reference-counted hand-offs; mutating the returned
    /// map does not affect the descriptor.
    pub fn namespace(&self) -> AHashMap<CompactString, Value> {
        self.namespace.borrow().clone()
    }

    /// Returns true if the type carries a numeric protocol block.
    #[inline(always)]
    pub fn has_number(&self) -> bool {
        self.number.get().is_some()
    }

    /// Returns true if the type carries a sequence protocol block.
    #[inline(always)]
    pub fn has_sequence(&self) -> bool {
        self.sequence.get().is_some()
    }

    /// Returns true if the type carries a mapping protocol block.
    #[inline(always)]
    pub fn has_mapping(&self) -> bool {
        self.mapping.get().is_some()
    }

    #[inline(always)]
    pub(crate) fn root(&self) -> &RootSlots {
        &self.root
    }

    #[inline(always)]
    pub(crate) fn number(&self) -> Option<&NumberSlots> {
        self.number.get().map(Box::as_ref)
    }

    #[inline(always)]
    pub(crate) fn sequence(&self) -> Option<&SequenceSlots> {
        self.sequence.get().map(Box::as_ref)
    }

    #[inline(always)]
    pub(crate) fn mapping(&self) -> Option<&MappingSlots> {
        self.mapping.get().map(Box::as_ref)
    }

    pub(crate) fn ensure_number(&self) -> &NumberSlots {
        self.number.get_or_init(|| {
            debug!("type '{}': number protocol block attached", self.name);

            Box::default()
        })
    }

    pub(crate) fn ensure_sequence(&self) -> &SequenceSlots {
        self.sequence.get_or_init(|| {
            debug!("type '{}': sequence protocol block attached", self.name);

            Box::default()
        })
    }

    pub(crate) fn ensure_mapping(&self) -> &MappingSlots {
        self.mapping.get_or_init(|| {
            debug!("type '{}': mapping protocol block attached", self.name);

            Box::default()
        })
    }
}
