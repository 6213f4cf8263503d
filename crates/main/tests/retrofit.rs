////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

//! End-to-end retrofitting scenarios: allocate blocks, register
//! operations, define handlers, and evaluate through the host surface.

use compact_str::CompactString;

use slotpatch::{
    extend::{ensure_protocol_blocks, extend_type_with, register_operation, OpSymbol},
    runtime::{Object, ProtocolMask, RuntimeError, ScriptFn, TypeDescriptor, Value},
};

#[test]
fn test_len_retrofit_lifecycle() {
    let ty = TypeDescriptor::new("triad");

    // Blockless registration of a sequence-or-mapping operation fails.
    let error = register_operation(&ty, "__len__").unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::MissingBlock {
            symbol: OpSymbol::Len,
            ..
        },
    ));

    ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

    register_operation(&ty, "__len__").unwrap();

    ty.define(
        "__len__",
        Value::from(ScriptFn::new("__len__", 0, |_receiver, _args| {
            Ok(Value::from(3))
        })),
    );

    let value = Value::instance(&ty);

    assert_eq!(Object::of(&value).unwrap().len().unwrap(), 3);
}

#[test]
fn test_number_only_type_hosts_matmul_but_not_getitem() {
    let ty = TypeDescriptor::new("matrix");

    ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

    register_operation(&ty, "__matmul__").unwrap();

    let error = register_operation(&ty, "__getitem__").unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::MissingBlock {
            symbol: OpSymbol::GetItem,
            required: "mapping or sequence",
            ..
        },
    ));
}

#[test]
fn test_unknown_symbol_is_rejected_with_a_suggestion() {
    let ty = TypeDescriptor::new("gadget");

    assert!(matches!(
        register_operation(&ty, "frobnicate").unwrap_err(),
        RuntimeError::InvalidSymbol { .. },
    ));

    // A near-miss gets a closest-symbol suggestion.
    let error = register_operation(&ty, "__ad__").unwrap_err();

    let RuntimeError::InvalidSymbol { closest, .. } = error else {
        panic!("unexpected error: {error:?}");
    };

    assert_eq!(closest, Some("__add__"));
}

#[test]
fn test_reallocation_preserves_wired_cells() {
    let ty = TypeDescriptor::new("tally");

    ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

    register_operation(&ty, "__len__").unwrap();

    ty.define(
        "__len__",
        Value::from(ScriptFn::new("__len__", 0, |_receiver, _args| {
            Ok(Value::from(7))
        })),
    );

    // Re-ensuring the same block (alone or in a wider mask) must not reset
    // the dispatch table.
    ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE | ProtocolMask::NUMBER);

    let value = Value::instance(&ty);

    assert_eq!(Object::of(&value).unwrap().len().unwrap(), 7);
}

#[test]
fn test_binary_evaluation_reaches_reflected_handlers() {
    let meters = TypeDescriptor::new("meters");
    let feet = TypeDescriptor::new("feet");

    ensure_protocol_blocks(&meters, ProtocolMask::NUMBER);
    ensure_protocol_blocks(&feet, ProtocolMask::NUMBER);

    register_operation(&meters, "__add__").unwrap();
    register_operation(&feet, "__add__").unwrap();

    // The left operand declines mixed-unit addition with the sentinel; the
    // right operand's reflected handler picks it up.
    meters.define(
        "__add__",
        Value::from(ScriptFn::new("__add__", 1, |_receiver, args| {
            match args[0].as_int() {
                Some(value) => Ok(Value::from(value + 1)),
                None => Ok(Value::not_implemented()),
            }
        })),
    );

    feet.define(
        "__radd__",
        Value::from(ScriptFn::new("__radd__", 1, |_receiver, _args| {
            Ok(Value::from("converted"))
        })),
    );

    let lhs = Value::instance(&meters);
    let rhs = Value::instance(&feet);

    let object = Object::of(&lhs).unwrap();

    assert_eq!(object.add(&rhs).unwrap().as_str(), Some("converted"));
}

#[test]
fn test_both_operands_declining_surfaces_unsupported_operands() {
    let ty = TypeDescriptor::new("opaque");

    ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

    register_operation(&ty, "__sub__").unwrap();

    let lhs = Value::instance(&ty);
    let rhs = Value::instance(&ty);

    let error = Object::of(&lhs).unwrap().sub(&rhs).unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::UnsupportedOperands {
            symbol: OpSymbol::Sub,
            ..
        },
    ));
}

#[test]
fn test_predicate_and_binary_failure_modes_differ() {
    let ty = TypeDescriptor::new("shade");

    ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

    register_operation(&ty, "__bool__").unwrap();
    register_operation(&ty, "__add__").unwrap();

    let lhs = Value::instance(&ty);
    let rhs = Value::instance(&ty);

    let object = Object::of(&lhs).unwrap();

    // No handlers defined: truth-testing is a hard missing-handler error,
    // while addition falls through the sentinel chain first.
    assert!(matches!(
        object.truth().unwrap_err(),
        RuntimeError::MissingHandler {
            method: "__bool__",
            ..
        },
    ));

    assert!(matches!(
        object.add(&rhs).unwrap_err(),
        RuntimeError::UnsupportedOperands { .. },
    ));
}

#[test]
fn test_membership_retrofit() {
    let ty = TypeDescriptor::new("evens");

    ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE);

    register_operation(&ty, "__contains__").unwrap();

    ty.define(
        "__contains__",
        Value::from(ScriptFn::new("__contains__", 1, |_receiver, args| {
            Ok(Value::from(args[0].as_int().is_some_and(|value| value % 2 == 0)))
        })),
    );

    let value = Value::instance(&ty);
    let object = Object::of(&value).unwrap();

    assert!(object.contains(&Value::from(4)).unwrap());
    assert!(!object.contains(&Value::from(5)).unwrap());
}

#[test]
fn test_subscript_assignment_and_deletion() {
    let ty = TypeDescriptor::new("scratch");

    ensure_protocol_blocks(&ty, ProtocolMask::MAPPING);

    register_operation(&ty, "__setitem__").unwrap();

    ty.define(
        "__setitem__",
        Value::from(ScriptFn::new("__setitem__", 2, |receiver, args| {
            let key = args[0].as_str().unwrap_or_default().to_owned();

            slotpatch::runtime::generic_attr_set(receiver, &key, Some(&args[1]))?;

            Ok(Value::nil())
        })),
    );

    ty.define(
        "__delitem__",
        Value::from(ScriptFn::new("__delitem__", 1, |receiver, args| {
            let key = args[0].as_str().unwrap_or_default().to_owned();

            slotpatch::runtime::generic_attr_set(receiver, &key, None)?;

            Ok(Value::nil())
        })),
    );

    let value = Value::instance(&ty);
    let object = Object::of(&value).unwrap();

    object
        .index_set(&Value::from("answer"), &Value::from(42))
        .unwrap();

    assert_eq!(value.lookup("answer").unwrap().as_int(), Some(42));

    object.index_delete(&Value::from("answer")).unwrap();

    assert!(value.lookup("answer").is_none());
}

#[test]
fn test_power_declines_to_right_operand_rpow() {
    let base_ty = TypeDescriptor::new("base");
    let exp_ty = TypeDescriptor::new("exponent");

    ensure_protocol_blocks(&base_ty, ProtocolMask::NUMBER);

    register_operation(&base_ty, "__pow__").unwrap();

    exp_ty.define(
        "__rpow__",
        Value::from(ScriptFn::new("__rpow__", 1, |_receiver, _args| {
            Ok(Value::from("from rpow"))
        })),
    );

    let base = Value::instance(&base_ty);
    let exponent = Value::instance(&exp_ty);

    let object = Object::of(&base).unwrap();

    assert_eq!(
        object.pow(&exponent, &Value::nil()).unwrap().as_str(),
        Some("from rpow"),
    );
}

#[test]
fn test_calling_hashing_and_string_conversion() {
    let ty = TypeDescriptor::new("beacon");

    register_operation(&ty, "__call__").unwrap();
    register_operation(&ty, "__hash__").unwrap();
    register_operation(&ty, "__repr__").unwrap();

    ty.define(
        "__call__",
        Value::from(ScriptFn::variadic("__call__", |_receiver, args, keywords| {
            Ok(Value::from((args.len() + keywords.len()) as i64))
        })),
    );

    ty.define(
        "__hash__",
        Value::from(ScriptFn::new("__hash__", 0, |_receiver, _args| {
            Ok(Value::from(0xbeac0_i64))
        })),
    );

    ty.define(
        "__repr__",
        Value::from(ScriptFn::new("__repr__", 0, |_receiver, _args| {
            Ok(Value::from("<beacon>"))
        })),
    );

    let value = Value::instance(&ty);
    let object = Object::of(&value).unwrap();

    let keywords = [(CompactString::from("mode"), Value::from("slow"))];

    assert_eq!(
        object
            .invoke(&[Value::from(1), Value::from(2)], &keywords)
            .unwrap()
            .as_int(),
        Some(3),
    );

    assert_eq!(object.hash().unwrap(), 0xbeac0);
    assert_eq!(object.repr().unwrap().as_str(), Some("<beacon>"));
}

#[test]
fn test_iteration_protocol() {
    let ty = TypeDescriptor::new("countdown");

    register_operation(&ty, "__iter__").unwrap();
    register_operation(&ty, "__next__").unwrap();

    ty.define(
        "__iter__",
        Value::from(ScriptFn::new("__iter__", 0, |receiver, _args| {
            slotpatch::runtime::generic_attr_set(receiver, "remaining", Some(&Value::from(2)))?;

            Ok(receiver.clone())
        })),
    );

    ty.define(
        "__next__",
        Value::from(ScriptFn::new("__next__", 0, |receiver, _args| {
            let remaining = receiver
                .lookup("remaining")
                .and_then(|value| value.as_int())
                .unwrap_or(0);

            if remaining == 0 {
                return Ok(Value::nil());
            }

            slotpatch::runtime::generic_attr_set(
                receiver,
                "remaining",
                Some(&Value::from(remaining - 1)),
            )?;

            Ok(Value::from(remaining))
        })),
    );

    let value = Value::instance(&ty);
    let object = Object::of(&value).unwrap();

    let iterator = object.iterate().unwrap();
    let iterator = Object::of(&iterator).unwrap();

    assert_eq!(iterator.next().unwrap().as_int(), Some(2));
    assert_eq!(iterator.next().unwrap().as_int(), Some(1));
    assert!(iterator.next().unwrap().is_nil());
}

#[test]
fn test_extend_type_with_end_to_end() {
    let ty = TypeDescriptor::new("bundle");

    ensure_protocol_blocks(&ty, ProtocolMask::SEQUENCE | ProtocolMask::NUMBER);

    extend_type_with(
        &ty,
        [
            (
                CompactString::from("__len__"),
                Value::from(ScriptFn::new("__len__", 0, |_receiver, _args| {
                    Ok(Value::from(4))
                })),
            ),
            (
                CompactString::from("__add__"),
                Value::from(ScriptFn::new("__add__", 1, |_receiver, args| {
                    Ok(args[0].clone())
                })),
            ),
            // Dunder-shaped but not an operation symbol: attached as a
            // plain member.
            (CompactString::from("__author__"), Value::from("nobody")),
        ],
    )
    .unwrap();

    let value = Value::instance(&ty);
    let other = Value::instance(&ty);

    let object = Object::of(&value).unwrap();

    assert_eq!(object.len().unwrap(), 4);
    assert_eq!(object.add(&other).unwrap(), other);
    assert_eq!(ty.member("__author__").unwrap().as_str(), Some("nobody"));
}

#[test]
fn test_registration_before_handler_definition() {
    let ty = TypeDescriptor::new("latent");

    ensure_protocol_blocks(&ty, ProtocolMask::NUMBER);

    register_operation(&ty, "__neg__").unwrap();

    let value = Value::instance(&ty);
    let object = Object::of(&value).unwrap();

    // Wired but handler-less: the trampoline declines, and the host
    // reports the operand as unsupported.
    assert!(matches!(
        object.neg().unwrap_err(),
        RuntimeError::UnsupportedOperands {
            symbol: OpSymbol::Neg,
            rhs_type: None,
            ..
        },
    ));

    // Defining the handler afterwards completes the retrofit with no
    // further registration.
    ty.define(
        "__neg__",
        Value::from(ScriptFn::new("__neg__", 0, |_receiver, _args| {
            Ok(Value::from(-5))
        })),
    );

    assert_eq!(object.neg().unwrap().as_int(), Some(-5));
}
