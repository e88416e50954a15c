//! Line-level parsing: device log lines, `key=value` bodies and the wrapping
//! timestamp counter.
//!
//! Everything here is synchronous and allocation-light; the engine calls it
//! once per inbound line.

pub mod fields;
pub mod line;
pub mod timestamp;

pub use fields::{parse_adc_sample, parse_irq, parse_number, round_to};
pub use line::{ParsedLine, is_continuation, parse_line, parse_timestamp};
pub use timestamp::TimestampReconstructor;
