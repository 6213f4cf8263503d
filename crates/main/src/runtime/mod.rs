////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

//! The host-facing object model.
//!
//! This module stands for the part of the host runtime that the
//! [extend](crate::extend) engine patches and that the patched types are
//! later evaluated through:
//!
//! - [Value] — a cheaply clonable handle over a dynamic value, including
//!   the host's `NotImplemented` sentinel that drives operator fallback
//!   chains.
//! - [TypeDescriptor] — a type's dispatch table: the root slots plus the
//!   lazily-attached Number, Sequence, and Mapping protocol blocks.
//! - [Object] — the evaluator surface: one entry point per operator form,
//!   reading the dispatch-table cells the way the host's own operator
//!   evaluation does.
//! - [RuntimeError] — everything that can go wrong at registration or
//!   evaluation time.
//!
//! The engine itself holds no state; all effects live exactly as long as
//! the [TypeDescriptor] they were applied to.

mod error;
mod object;
mod ty;
mod value;

pub use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    object::Object,
    ty::{ProtocolMask, TypeDescriptor, TypeRef},
    value::{generic_attr_get, generic_attr_set, Keywords, ScriptFn, Value},
};
pub(crate) use crate::runtime::{
    ty::{
        AttrGetFn,
        AttrSetFn,
        BinaryFn,
        InvocationFn,
        MappingSlots,
        MembershipFn,
        NumberSlots,
        PredicateFn,
        SequenceSlots,
        SizingFn,
        SlotCell,
        SubscriptAssignFn,
        SubscriptFn,
        TernaryFn,
        UnaryFn,
    },
};
