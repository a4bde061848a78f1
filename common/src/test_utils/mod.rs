// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod fake_scheduler;

/// Asserts the value at the end of a variant match.
#[macro_export]
macro_rules! assert_variant {
    ($test:expr, $variant:pat $( if $guard:expr )? => $e:expr) => {
        match $test {
            $variant $( if $guard )? => $e,
            _ => panic!("unexpected variant of: {}", stringify!($test)),
        }
    };
    ($test:expr, $variant:pat $( if $guard:expr )?) => {
        $crate::assert_variant!($test, $variant $( if $guard )? => {})
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn assert_variant_passes_and_maps() {
        let value: Result<u8, ()> = Ok(4);
        let inner = assert_variant!(value, Ok(x) if x > 2 => x);
        assert_eq!(inner, 4);
    }

    #[test]
    #[should_panic(expected = "unexpected variant")]
    fn assert_variant_panics_on_mismatch() {
        let value: Result<u8, ()> = Err(());
        assert_variant!(value, Ok(_));
    }
}
