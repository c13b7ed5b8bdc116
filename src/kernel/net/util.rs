#[inline]
pub fn read_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

#[inline]
pub fn write_u16(data: &mut [u8], value: u16) {
    data[..2].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

#[inline]
pub fn write_u32(data: &mut [u8], value: u32) {
    data[..4].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn read_u64(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    u64::from_be_bytes(bytes)
}

#[inline]
pub fn write_u64(data: &mut [u8], value: u64) {
    data[..8].copy_from_slice(&value.to_be_bytes());
}

/// Running one's-complement sum (RFC 1071).
///
/// Pieces may be added in any order as long as every piece but the last
/// has even length; the pseudo header and the UDP segment satisfy this.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum(u32);

impl Checksum {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn add_bytes(&mut self, data: &[u8]) -> &mut Self {
        let mut chunks = data.chunks_exact(2);
        for word in &mut chunks {
            self.0 += u16::from_be_bytes([word[0], word[1]]) as u32;
            self.fold();
        }
        if let [last] = chunks.remainder() {
            self.0 += (*last as u32) << 8;
            self.fold();
        }
        self
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.0 += value as u32;
        self.fold();
        self
    }

    fn fold(&mut self) {
        while (self.0 >> 16) != 0 {
            self.0 = (self.0 & 0xffff) + (self.0 >> 16);
        }
    }

    /// Folded sum, not inverted. A region that carries a correct checksum sums to 0xffff.
    pub fn sum(&self) -> u16 {
        self.0 as u16
    }

    pub fn finish(&self) -> u16 {
        !self.sum()
    }
}

// internet checksum (RFC1071)
pub fn checksum(data: &[u8]) -> u16 {
    Checksum::new().add_bytes(data).finish()
}

pub fn verify_checksum(data: &[u8]) -> bool {
    checksum(data) == 0
}
