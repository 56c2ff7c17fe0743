// Appendable/readable byte buffer carried by every remote packet.
//
// A `Packet` is a flat little-endian byte buffer plus a read cursor and a
// destination address table. Writers append fields in declaration order with
// no padding; readers consume them in the same order. Nothing is tagged, so
// the sender and receiver of a packet kind must agree on the exact field list.
// Keeping both halves of each packet kind in one `match` arm pair in
// `message.rs` is what holds that contract together.
//
// Encoding rules:
// - scalars: raw little-endian, `bool` as one byte (nonzero reads as true);
// - strings: u32 byte length, then UTF-8 bytes;
// - vectors: u32 element count, then elements;
// - blobs: u32 byte length, then bytes.
//
// The address table is out-of-band. Senders fill it for unicast/multicast
// delivery (an empty table means broadcast); transports fill slot 0 with the
// source address on receipt.

use std::net::SocketAddr;

use crate::error::DecodeError;

/// Minimum size of a well-formed packet: type byte plus u16 origin.
pub const MIN_PACKET_SIZE: usize = 3;

/// Fixed-size little-endian wire scalar.
pub trait Wire: Sized {
    const SIZE: usize;

    fn put(self, buf: &mut Vec<u8>);

    /// Decode from exactly `SIZE` bytes.
    fn take(bytes: &[u8]) -> Self;
}

macro_rules! wire_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Wire for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put(self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                fn take(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

wire_le!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Wire for bool {
    const SIZE: usize = 1;

    fn put(self, buf: &mut Vec<u8>) {
        buf.push(u8::from(self));
    }

    fn take(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct Packet {
    buf: Vec<u8>,
    cursor: usize,
    addresses: Vec<SocketAddr>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap bytes received from the wire, recording where they came from.
    pub fn from_wire(bytes: Vec<u8>, source: SocketAddr) -> Self {
        Self {
            buf: bytes,
            cursor: 0,
            addresses: vec![source],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes,
            cursor: 0,
            addresses: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    pub fn write<T: Wire>(&mut self, value: T) {
        value.put(&mut self.buf);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write_len(text.len());
        self.buf.extend_from_slice(text.as_bytes());
    }

    pub fn write_vec<T: Wire + Copy>(&mut self, items: &[T]) {
        self.write_len(items.len());
        for item in items {
            item.put(&mut self.buf);
        }
    }

    pub fn write_blob(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    fn write_len(&mut self, len: usize) {
        // Packets are datagram-sized; a length past u32 is a caller bug.
        self.write(u32::try_from(len).unwrap_or(u32::MAX));
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    pub fn read<T: Wire>(&mut self) -> Result<T, DecodeError> {
        let bytes = self.take_bytes(T::SIZE)?;
        Ok(T::take(bytes))
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len(1)?;
        let bytes = self.take_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_vec<T: Wire>(&mut self) -> Result<Vec<T>, DecodeError> {
        let count = self.read_len(T::SIZE)?;
        (0..count).map(|_| self.read()).collect()
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len(1)?;
        Ok(self.take_bytes(len)?.to_vec())
    }

    /// Read a u32 length prefix and check that `len * elem_size` bytes remain,
    /// so a corrupt prefix cannot trigger a huge allocation.
    fn read_len(&mut self, elem_size: usize) -> Result<usize, DecodeError> {
        let len = self.read::<u32>()? as usize;
        let needed = len.saturating_mul(elem_size);
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    fn take_bytes(&mut self, len: usize) -> Result<&[u8], DecodeError> {
        let remaining = self.remaining();
        let end = self.cursor + len;
        let bytes = self.buf.get(self.cursor..end).ok_or(DecodeError::Truncated {
            needed: len,
            remaining,
        })?;
        self.cursor = end;
        Ok(bytes)
    }

    /// Type byte, without consuming it.
    pub fn peek_type(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// Origin field (bytes 1..3), without consuming it.
    pub fn peek_origin(&self) -> Option<u16> {
        self.buf.get(1..3).map(u16::take)
    }

    /// Next unread byte, without consuming it.
    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.buf
            .get(self.cursor)
            .copied()
            .ok_or(DecodeError::Truncated {
                needed: 1,
                remaining: 0,
            })
    }

    // -----------------------------------------------------------------------
    // Buffer access
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn unread(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    /// Move the read cursor back to the start of the buffer.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Drop all bytes and addresses.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.cursor = 0;
        self.addresses.clear();
    }

    // -----------------------------------------------------------------------
    // Address table
    // -----------------------------------------------------------------------

    pub fn add_address(&mut self, address: SocketAddr) {
        self.addresses.push(address);
    }

    pub fn address(&self, index: usize) -> Option<SocketAddr> {
        self.addresses.get(index).copied()
    }

    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn clear_address_table(&mut self) {
        self.addresses.clear();
    }
}

/// Two packets are equal when their unread payloads match; cursors and
/// address tables are ignored.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.unread() == other.unread()
    }
}

impl Eq for Packet {}
