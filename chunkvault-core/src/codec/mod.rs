use crate::error::Result;

/// One incremental stage of the transform pipeline.
///
/// `update` returns whatever output the input made available; `finish`
/// flushes anything the stage still buffers and may only be called once.
pub trait Transform {
    fn stage(&self) -> &'static str;
    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>>;
    fn finish(&mut self) -> Result<Vec<u8>>;
}

pub mod deflate;
