//! File name hash shared by the image builder and the runtime
//!
//! The hash is taken over the path relative to the image root, separators
//! included and without a trailing terminator. Different names may collide;
//! lookup returns the first index entry with a matching hash, so an image
//! builder must keep colliding names out of the same image (or order them
//! deliberately).

/// Hash a name: shift left one bit, then add the byte, both in 16 bits
pub fn name_hash(name: &[u8]) -> u16 {
    name.iter()
        .fold(0u16, |acc, &b| (acc << 1).wrapping_add(u16::from(b)))
}
