////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

use std::fmt::{Display, Formatter};

use compact_str::CompactString;

use crate::runtime::{RuntimeError, RuntimeResult};

/// A canonical name identifying one dispatchable behavior.
///
/// The set is closed: every symbol the retrofitting engine understands is a
/// variant of this enumeration, and the mapping from a symbol to its slot
/// cell and trampoline is total by construction. Symbols are
/// [parsed](Self::parse) from their dunder spelling (`"__add__"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpSymbol {
    Repr,
    Str,
    Call,
    Hash,
    GetAttr,
    SetAttr,
    Iter,
    Next,

    Len,
    Contains,
    GetItem,
    SetItem,
    DelItem,

    Add,
    Sub,
    Mul,
    Mod,
    Divmod,
    Pow,
    Neg,
    Pos,
    Abs,
    Bool,
    Invert,
    Lshift,
    Rshift,
    And,
    Xor,
    Or,
    Int,
    Float,

    IAdd,
    ISub,
    IMul,
    IMod,
    IPow,
    ILshift,
    IRshift,
    IAnd,
    IXor,
    IOr,

    FloorDiv,
    TrueDiv,
    IFloorDiv,
    ITrueDiv,

    Index,

    MatMul,
    IMatMul,
}

impl Display for OpSymbol {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

impl OpSymbol {
    /// Every symbol of the closed set, in registration-table order.
    pub const ALL: [Self; 48] = [
        Self::Repr,
        Self::Str,
        Self::Call,
        Self::Hash,
        Self::GetAttr,
        Self::SetAttr,
        Self::Iter,
        Self::Next,
        Self::Len,
        Self::Contains,
        Self::GetItem,
        Self::SetItem,
        Self::DelItem,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Mod,
        Self::Divmod,
        Self::Pow,
        Self::Neg,
        Self::Pos,
        Self::Abs,
        Self::Bool,
        Self::Invert,
        Self::Lshift,
        Self::Rshift,
        Self::And,
        Self::Xor,
        Self::Or,
        Self::Int,
        Self::Float,
        Self::IAdd,
        Self::ISub,
        Self::IMul,
        Self::IMod,
        Self::IPow,
        Self::ILshift,
        Self::IRshift,
        Self::IAnd,
        Self::IXor,
        Self::IOr,
        Self::FloorDiv,
        Self::TrueDiv,
        Self::IFloorDiv,
        Self::ITrueDiv,
        Self::Index,
        Self::MatMul,
        Self::IMatMul,
    ];

    /// Parses a symbol from its dunder spelling.
    ///
    /// An unknown name yields [InvalidSymbol](RuntimeError::InvalidSymbol)
    /// carrying the closest known spelling when one is sufficiently similar.
    pub fn parse(name: &str) -> RuntimeResult<Self> {
        let symbol = match name {
            "__repr__" => Self::Repr,
            "__str__" => Self::Str,
            "__call__" => Self::Call,
            "__hash__" => Self::Hash,
            "__getattr__" => Self::GetAttr,
            "__setattr__" => Self::SetAttr,
            "__iter__" => Self::Iter,
            "__next__" => Self::Next,

            "__len__" => Self::Len,
            "__contains__" => Self::Contains,
            "__getitem__" => Self::GetItem,
            "__setitem__" => Self::SetItem,
            "__delitem__" => Self::DelItem,

            "__add__" => Self::Add,
            "__sub__" => Self::Sub,
            "__mul__" => Self::Mul,
            "__mod__" => Self::Mod,
            "__divmod__" => Self::Divmod,
            "__pow__" => Self::Pow,
            "__neg__" => Self::Neg,
            "__pos__" => Self::Pos,
            "__abs__" => Self::Abs,
            "__bool__" => Self::Bool,
            "__invert__" => Self::Invert,
            "__lshift__" => Self::Lshift,
            "__rshift__" => Self::Rshift,
            "__and__" => Self::And,
            "__xor__" => Self::Xor,
            "__or__" => Self::Or,
            "__int__" => Self::Int,
            "__float__" => Self::Float,

            "__iadd__" => Self::IAdd,
            "__isub__" => Self::ISub,
            "__imul__" => Self::IMul,
            "__imod__" => Self::IMod,
            "__ipow__" => Self::IPow,
            "__ilshift__" => Self::ILshift,
            "__irshift__" => Self::IRshift,
            "__iand__" => Self::IAnd,
            "__ixor__" => Self::IXor,
            "__ior__" => Self::IOr,

            "__floordiv__" => Self::FloorDiv,
            "__truediv__" => Self::TrueDiv,
            "__ifloordiv__" => Self::IFloorDiv,
            "__itruediv__" => Self::ITrueDiv,

            "__index__" => Self::Index,

            "__matmul__" => Self::MatMul,
            "__imatmul__" => Self::IMatMul,

            _ => {
                return Err(RuntimeError::InvalidSymbol {
                    name: CompactString::from(name),
                    closest: Self::closest(name),
                });
            }
        };

        Ok(symbol)
    }

    /// The dunder spelling of this symbol. This is also the name of the
    /// handler method the symbol's trampoline looks up on the operand(s).
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Repr => "__repr__",
            Self::Str => "__str__",
            Self::Call => "__call__",
            Self::Hash => "__hash__",
            Self::GetAttr => "__getattr__",
            Self::SetAttr => "__setattr__",
            Self::Iter => "__iter__",
            Self::Next => "__next__",

            Self::Len => "__len__",
            Self::Contains => "__contains__",
            Self::GetItem => "__getitem__",
            Self::SetItem => "__setitem__",
            Self::DelItem => "__delitem__",

            Self::Add => "__add__",
            Self::Sub => "__sub__",
            Self::Mul => "__mul__",
            Self::Mod => "__mod__",
            Self::Divmod => "__divmod__",
            Self::Pow => "__pow__",
            Self::Neg => "__neg__",
            Self::Pos => "__pos__",
            Self::Abs => "__abs__",
            Self::Bool => "__bool__",
            Self::Invert => "__invert__",
            Self::Lshift => "__lshift__",
            Self::Rshift => "__rshift__",
            Self::And => "__and__",
            Self::Xor => "__xor__",
            Self::Or => "__or__",
            Self::Int => "__int__",
            Self::Float => "__float__",

            Self::IAdd => "__iadd__",
            Self::ISub => "__isub__",
            Self::IMul => "__imul__",
            Self::IMod => "__imod__",
            Self::IPow => "__ipow__",
            Self::ILshift => "__ilshift__",
            Self::IRshift => "__irshift__",
            Self::IAnd => "__iand__",
            Self::IXor => "__ixor__",
            Self::IOr => "__ior__",

            Self::FloorDiv => "__floordiv__",
            Self::TrueDiv => "__truediv__",
            Self::IFloorDiv => "__ifloordiv__",
            Self::ITrueDiv => "__itruediv__",

            Self::Index => "__index__",

            Self::MatMul => "__matmul__",
            Self::IMatMul => "__imatmul__",
        }
    }

    fn closest(name: &str) -> Option<&'static str> {
        const THRESHOLD: f64 = 0.8;

        let mut best = None;
        let mut best_score = THRESHOLD;

        for symbol in Self::ALL {
            let score = strsim::jaro_winkler(name, symbol.name());

            if score > best_score {
                best = Some(symbol.name());
                best_score = score;
            }
        }

        best
    }
}
