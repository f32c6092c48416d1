// Licensed under the Apache-2.0 license

//! On-target checks that report their progress over the serial console.

pub mod rtc_test;
