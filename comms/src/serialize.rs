use std::io;

pub trait Serialize<'a> {
    /// Writes the owned part of the frame into `buf`.
    ///
    /// # Returns
    /// An optional trailing slice that is written after `buf` without being copied.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
