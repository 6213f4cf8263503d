////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

//! The retrofitting engine.
//!
//! This module patches the dispatch tables of existing [TypeDescriptor]s:
//! given an operation symbol such as `"__add__"`, it resolves the dispatch
//! cell the symbol occupies on that particular type, and wires a trampoline
//! into the cell that looks up the like-named handler method at call time.
//!
//! The engine never creates types and never stores handlers itself. State
//! lives in two places only: the wired cells of the type's dispatch table,
//! and the handler methods in the type's attached namespace.

mod resolve;
mod symbol;
mod trampoline;

use ahash::AHashMap;
use compact_str::CompactString;
use log::debug;

use crate::{
    extend::trampoline::lookup_trampoline,
    runtime::{ProtocolMask, RuntimeError, RuntimeResult, TypeDescriptor, Value},
};

pub use crate::extend::{
    resolve::{resolve, MappingSlot, NumberSlot, RootSlot, SequenceSlot, SlotCellRef},
    symbol::OpSymbol,
};

/// Attaches the protocol blocks selected by `mask` to the type.
///
/// Allocation is idempotent: a block the type already carries is left
/// untouched, wired cells included. Blocks are never detached.
pub fn ensure_protocol_blocks(ty: &TypeDescriptor, mask: ProtocolMask) {
    if mask.contains(ProtocolMask::NUMBER) {
        let _ = ty.ensure_number();
    }

    if mask.contains(ProtocolMask::SEQUENCE) {
        let _ = ty.ensure_sequence();
    }

    if mask.contains(ProtocolMask::MAPPING) {
        let _ = ty.ensure_mapping();
    }
}

/// Enables an operation on the type: parses `name` as an operation symbol,
/// resolves the dispatch cell it occupies for the type's current block
/// configuration, and wires the symbol's trampoline into the cell.
///
/// Registration is cheap and repeatable. It does not require (or check
/// for) a handler method in the type's namespace: handlers are looked up
/// when the operation is dispatched, so registering first and defining the
/// handler later is a supported order.
///
/// Errors:
///
/// - [InvalidSymbol](RuntimeError::InvalidSymbol) if `name` is not a known
///   operation symbol;
/// - [MissingBlock](RuntimeError::MissingBlock) if every block that could
///   host the symbol is absent from the type.
pub fn register_operation(ty: &TypeDescriptor, name: &str) -> RuntimeResult<()> {
    let symbol = OpSymbol::parse(name)?;
    let cell = resolve::resolve(ty, symbol)?;

    debug!("type '{}': '{}' wired into {:?}", ty.name(), symbol, cell);

    resolve::install(ty, cell, lookup_trampoline(symbol));

    Ok(())
}

/// Returns a read-only snapshot of the type's attached namespace. Member
/// values are reference-counted hand-offs.
pub fn read_attached_namespace(ty: &TypeDescriptor) -> AHashMap<CompactString, Value> {
    ty.namespace()
}

/// Batch extension: attaches every `(name, member)` pair to the type's
/// namespace, and for each name spelled as an operation symbol also
/// registers the operation.
///
/// A name that merely *looks* dunder-shaped but is not a known symbol
/// (`"__version__"`, say) is attached as a plain member; the failed
/// registration attempt is swallowed. Any other registration error — a
/// [MissingBlock](RuntimeError::MissingBlock) above all — aborts the batch
/// and propagates, with the members already processed left in place.
///
/// Block allocation stays the caller's job: pair this with
/// [ensure_protocol_blocks] when the extension introduces protocol
/// operations the type has no block for yet.
pub fn extend_type_with(
    ty: &TypeDescriptor,
    members: impl IntoIterator<Item = (CompactString, Value)>,
) -> RuntimeResult<()> {
    for (name, member) in members {
        match register_operation(ty, &name) {
            Ok(()) => (),
            Err(RuntimeError::InvalidSymbol { .. }) => (),
            Err(error) => return Err(error),
        }

        ty.define(name, member);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ScriptFn, TypeDescriptor};

    #[test]
    fn test_registration_requires_a_hosting_block() {
        let ty = TypeDescriptor::new("tally");

        let error = register_operation(&ty, "__len__").unwrap_err();

        assert!(matches!(error, RuntimeError::MissingBlock { .. }));

        ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

        register_operation(&ty, "__len__").unwrap();
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let ty = TypeDescriptor::new("tally");

        assert!(matches!(
            register_operation(&ty, "frobnicate").unwrap_err(),
            RuntimeError::InvalidSymbol { .. },
        ));
    }

    #[test]
    fn test_extension_batch_swallows_non_symbol_names() {
        let ty = TypeDescriptor::new("tally");

        ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

        extend_type_with(
            &ty,
            [
                (
                    CompactString::from("__len__"),
                    Value::from(ScriptFn::new("__len__", 0, |_receiver, _args| {
                        Ok(Value::from(3))
                    })),
                ),
                (
                    CompactString::from("__version__"),
                    Value::from("1.0"),
                ),
            ],
        )
        .unwrap();

        assert_eq!(ty.member("__version__").unwrap().as_str(), Some("1.0"));
        assert!(ty.member("__len__").is_some());
    }

    #[test]
    fn test_extension_batch_propagates_block_errors() {
        let ty = TypeDescriptor::new("tally");

        let error = extend_type_with(
            &ty,
            [(
                CompactString::from("__sub__"),
                Value::from(ScriptFn::new("__sub__", 1, |_receiver, _args| {
                    Ok(Value::nil())
                })),
            )],
        )
        .unwrap_err();

        assert!(matches!(error, RuntimeError::MissingBlock { .. }));
        assert!(ty.member("__sub__").is_none());
    }
}
