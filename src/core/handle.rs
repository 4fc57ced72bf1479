//! Opaque open-file handles
//!
//! A handle packs `token << 24 | disk_id << 16 | slot`. The token rolls on
//! every successful open so a handle kept after close does not match the
//! next file opened in the same slot.

/// Token values stay below this bound and wrap to zero on reaching it
pub const TOKEN_LIMIT: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub fn new(token: u8, disk_id: u8, slot: u16) -> Self {
        Handle((u32::from(token) << 24) | (u32::from(disk_id) << 16) | u32::from(slot))
    }

    /// Wrap a raw value received from a host
    pub fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn token(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn disk_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn slot(self) -> u16 {
        self.0 as u16
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> u32 {
        handle.raw()
    }
}

/// Rolling handle token shared by every open on a filesystem instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleToken(u8);

impl HandleToken {
    pub fn new() -> Self {
        HandleToken(0)
    }

    pub fn current(self) -> u8 {
        self.0
    }

    /// Move to the next token, wrapping before `TOKEN_LIMIT`
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
        if self.0 == TOKEN_LIMIT {
            self.0 = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let handle = Handle::new(0xAB, 0x02, 0x0003);
        assert_eq!(handle.raw(), 0xAB02_0003);
        assert_eq!(handle.token(), 0xAB);
        assert_eq!(handle.disk_id(), 0x02);
        assert_eq!(handle.slot(), 3);
        assert_eq!(Handle::from_raw(0xAB02_0003), handle);
    }

    #[test]
    fn test_token_wraps_before_limit() {
        let mut token = HandleToken::new();
        for _ in 0..254 {
            token.advance();
        }
        assert_eq!(token.current(), 254);
        token.advance();
        assert_eq!(token.current(), 0);
    }

    #[test]
    fn test_tokens_distinguish_same_slot() {
        let first = Handle::new(4, 0, 1);
        let second = Handle::new(5, 0, 1);
        assert_eq!(first.slot(), second.slot());
        assert_ne!(first, second);
    }
}
