use core::fmt;

/// A four-character chunk identifier, stored in file byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Container magic.
    pub const DXBC: FourCC = FourCC(*b"DXBC");
    /// Resource definitions.
    pub const RDEF: FourCC = FourCC(*b"RDEF");
    /// Alternate resource definition ID emitted by some toolchains.
    pub const RD11: FourCC = FourCC(*b"RD11");
    /// SM4 shader bytecode.
    pub const SHDR: FourCC = FourCC(*b"SHDR");
    /// SM5 shader bytecode.
    pub const SHEX: FourCC = FourCC(*b"SHEX");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(&self.0) {
            Ok(s) if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') => f.write_str(s),
            _ => write!(
                f,
                "0x{:02x}{:02x}{:02x}{:02x}",
                self.0[0], self.0[1], self.0[2], self.0[3]
            ),
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}
