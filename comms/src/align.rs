// Receive buffers made of these types start at an 8 byte boundary, so the
// `f64` payloads inside a frame can be reinterpreted in place.
pub trait Align8: bytemuck::Pod {}

impl Align8 for u64 {}
impl Align8 for i64 {}
impl Align8 for u128 {}
impl Align8 for i128 {}
impl Align8 for f64 {}
