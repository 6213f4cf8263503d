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
    error::Error as StdError,
    fmt::{Display, Formatter},
    result::Result as StdResult,
};

use compact_str::CompactString;

use crate::extend::OpSymbol;

/// A result of a runtime API call, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// Represents any error that may occur while registering an operation on a
/// type descriptor or while evaluating a patched operation.
///
/// Note that the host's `NotImplemented` sentinel is *not* an error: it is a
/// cooperative protocol signal consumed by the reflected-fallback discipline
/// of binary operators. A RuntimeError is only raised once a fallback chain
/// is exhausted ([UnsupportedOperands](RuntimeError::UnsupportedOperands)),
/// or for the operation families that have no fallback at all
/// ([MissingHandler](RuntimeError::MissingHandler)).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The registration API received a name outside the closed set of
    /// operation symbols. A caller error; never retryable.
    InvalidSymbol {
        /// The name as the caller spelled it.
        name: CompactString,

        /// The closest known operation symbol, if any spelling is
        /// sufficiently similar.
        closest: Option<&'static str>,
    },

    /// The operation symbol is valid, but the type lacks the protocol
    /// block(s) that could host its slot cell. The caller must allocate the
    /// block first (see [ensure_protocol_blocks](crate::extend::ensure_protocol_blocks)).
    MissingBlock {
        /// The operation being registered.
        symbol: OpSymbol,

        /// The name of the type descriptor being patched.
        receiver_type: CompactString,

        /// A description of the block kinds that could host the slot.
        required: &'static str,
    },

    /// The evaluator was asked to perform an operation on a type whose
    /// dispatch table has no slot wired for it.
    UndefinedOperator {
        /// The operation being evaluated.
        symbol: OpSymbol,

        /// The name of the receiver's type.
        receiver_type: CompactString,
    },

    /// Every side of an operator fallback chain declined the operand
    /// combination with the `NotImplemented` sentinel.
    UnsupportedOperands {
        /// The operation being evaluated.
        symbol: OpSymbol,

        /// The name of the left-hand operand's type.
        lhs_type: CompactString,

        /// The name of the right-hand operand's type. Omitted for unary
        /// forms.
        rhs_type: Option<CompactString>,
    },

    /// A trampoline of a family with no silent fallback (truth-testing,
    /// sizing, membership, hashing, iteration, string conversion,
    /// subscripting, calling) found no handler method on the receiver.
    MissingHandler {
        /// The name of the receiver's type.
        receiver_type: CompactString,

        /// The name of the missing handler method.
        method: &'static str,
    },

    /// A handler lookup produced a value that is not callable.
    NotCallable {
        /// The name of the value's type.
        receiver_type: CompactString,
    },

    /// A handler was invoked with a number of positional arguments that does
    /// not match its declared arity.
    ArityMismatch {
        /// The name of the handler function.
        function: CompactString,

        /// The number of parameters the handler declares.
        parameters: usize,

        /// The number of arguments that were passed.
        arguments: usize,
    },

    /// A handler result could not be coerced into the type its slot's
    /// calling convention requires.
    TypeMismatch {
        /// A description of the expected data.
        expected: &'static str,

        /// The name of the actual value's type.
        actual: CompactString,
    },

    /// A numeric handler result does not fit the native type its slot's
    /// calling convention requires.
    NumberCast {
        /// The value that failed to convert.
        value: f64,

        /// The name of the native target type.
        to: &'static str,
    },

    /// An attribute access named a field the receiver does not have.
    UnknownField {
        /// The name of the receiver's type.
        receiver_type: CompactString,

        /// The name of the field.
        field: CompactString,
    },
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSymbol { name, closest } => match closest {
                Some(closest) => formatter.write_fmt(format_args!(
                    "invalid operation symbol '{name}' (did you mean '{closest}'?)",
                )),

                None => {
                    formatter.write_fmt(format_args!("invalid operation symbol '{name}'"))
                }
            },

            Self::MissingBlock {
                symbol,
                receiver_type,
                required,
            } => formatter.write_fmt(format_args!(
                "could not find a slot for '{symbol}' on type '{receiver_type}': \
                the type has no {required} protocol block",
            )),

            Self::UndefinedOperator {
                symbol,
                receiver_type,
            } => formatter.write_fmt(format_args!(
                "type '{receiver_type}' does not support the '{symbol}' operation",
            )),

            Self::UnsupportedOperands {
                symbol,
                lhs_type,
                rhs_type,
            } => match rhs_type {
                Some(rhs_type) => formatter.write_fmt(format_args!(
                    "'{symbol}' is not supported between '{lhs_type}' and '{rhs_type}'",
                )),

                None => formatter.write_fmt(format_args!(
                    "'{symbol}' is not supported for '{lhs_type}'",
                )),
            },

            Self::MissingHandler {
                receiver_type,
                method,
            } => formatter.write_fmt(format_args!(
                "type '{receiver_type}' does not implement the '{method}' method",
            )),

            Self::NotCallable { receiver_type } => formatter.write_fmt(format_args!(
                "a value of type '{receiver_type}' is not callable",
            )),

            Self::ArityMismatch {
                function,
                parameters,
                arguments,
            } => formatter.write_fmt(format_args!(
                "'{function}' takes {parameters} argument(s), but {arguments} provided",
            )),

            Self::TypeMismatch { expected, actual } => formatter.write_fmt(format_args!(
                "expected {expected}, but a value of type '{actual}' provided",
            )),

            Self::NumberCast { value, to } => {
                formatter.write_fmt(format_args!("cannot cast {value} to {to}"))
            }

            Self::UnknownField {
                receiver_type,
                field,
            } => formatter.write_fmt(format_args!(
                "type '{receiver_type}' has no attribute '{field}'",
            )),
        }
    }
}

impl StdError for RuntimeError {}
