////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

//! Slotpatch retrofits protocol behavior onto the type descriptors of a
//! dynamic-object runtime.
//!
//! The host runtime evaluates operator syntax (`a + b`, `a[i]`, `len(a)`,
//! calls, hashing, iteration, string conversion) through per-type dispatch
//! tables of native function pointers. Types declared without those slot
//! functions normally cannot participate in operator syntax at all.
//! Slotpatch closes that gap: it writes engine-owned *trampolines* into the
//! dispatch-table cells, and each trampoline, when the host later invokes it,
//! looks up a same-named handler method on the operand(s) and forwards the
//! call under the exact calling convention of its slot.
//!
//! The crate splits into two layers:
//!
//! - [runtime] — the host-facing object model: [values](runtime::Value),
//!   [type descriptors](runtime::TypeDescriptor) with their lazily-attached
//!   protocol blocks, the [evaluator surface](runtime::Object), and
//!   [runtime errors](runtime::RuntimeError).
//!
//! - [extend] — the retrofitting engine: the closed
//!   [operation symbol](extend::OpSymbol) vocabulary, the slot
//!   [resolver](extend::resolve), the trampoline registry, and the
//!   [registration entry points](extend::register_operation).
//!
//! Registration mutates externally-owned type descriptors in place and is
//! not internally synchronized. The descriptor handles are deliberately
//! neither [Send] nor [Sync]; callers that share a runtime across threads
//! must serialize registration per type.

mod report;

pub mod extend;
pub mod runtime;
