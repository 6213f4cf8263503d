////////////////////////////////////////////////////////////////////////////////
// This file is part of "Slotpatch", a protocol retrofitting engine for       //
// dynamic-object runtimes.                                                   //
//                                                                            //
// This work is distributed under the terms of the MIT license.               //
// See the LICENSE file in the root of the repository for details.            //
//                                                                            //
// Copyright (c) 2026 the Slotpatch authors.                                  //
////////////////////////////////////////////////////////////////////////////////

macro_rules! system_panic {
    ($message:expr $(,)?) => {
        panic!(
            "Slotpatch internal error. This is a bug.\n{}\nFile: {}.\nLine: {}.",
            $message,
            file!(),
            line!(),
        )
    };

    ($message:expr, $($args:tt)*) => {
        system_panic!(format!($message, $($args)*))
    };
}

pub(crate) use system_panic;
