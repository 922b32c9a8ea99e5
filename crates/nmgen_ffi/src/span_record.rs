use std::fmt;

use nmgen::{AreaType, Span};

/// A span copied out across the boundary, packed into a single 32-bit word.
///
/// | bits     | field  |
/// |----------|--------|
/// | `0..13`  | `smin` |
/// | `13..26` | `smax` |
/// | `26..32` | `area` |
///
/// This is the layout C compilers give `struct { unsigned smin : 13; unsigned smax : 13; unsigned area : 6; }`
/// on little-endian targets, spelled out explicitly so it does not depend on bit-field rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SpanRecord(u32);

impl SpanRecord {
    const HEIGHT_MASK: u32 = (1 << Span::HEIGHT_BITS) - 1;
    const AREA_MASK: u32 = (1 << AreaType::BITS) - 1;
    const SMAX_SHIFT: u32 = Span::HEIGHT_BITS;
    const AREA_SHIFT: u32 = 2 * Span::HEIGHT_BITS;

    /// Packs a record. Values wider than their field are truncated to its low bits.
    #[inline]
    pub fn new(smin: u16, smax: u16, area: AreaType) -> Self {
        Self(
            (smin as u32 & Self::HEIGHT_MASK)
                | (smax as u32 & Self::HEIGHT_MASK) << Self::SMAX_SHIFT
                | (area.0 as u32 & Self::AREA_MASK) << Self::AREA_SHIFT,
        )
    }

    /// Reinterprets a raw word as a record.
    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw packed word.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Height of the floor.
    #[inline]
    pub fn smin(self) -> u16 {
        (self.0 & Self::HEIGHT_MASK) as u16
    }

    /// Height of the ceiling.
    #[inline]
    pub fn smax(self) -> u16 {
        ((self.0 >> Self::SMAX_SHIFT) & Self::HEIGHT_MASK) as u16
    }

    /// Area type ID.
    #[inline]
    pub fn area(self) -> AreaType {
        AreaType(((self.0 >> Self::AREA_SHIFT) & Self::AREA_MASK) as u8)
    }
}

impl From<&Span> for SpanRecord {
    fn from(span: &Span) -> Self {
        Self::new(span.min(), span.max(), span.area())
    }
}

impl fmt::Debug for SpanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanRecord")
            .field("smin", &self.smin())
            .field("smax", &self.smax())
            .field("area", &self.area().0)
            .finish()
    }
}
