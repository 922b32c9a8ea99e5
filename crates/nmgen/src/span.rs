use std::ops::{Deref, DerefMut};

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// A key for a [`Span`] in [`Spans`].
    pub struct SpanKey;
}

/// Storage for all spans of a [`Heightfield`](crate::Heightfield).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Spans(SlotMap<SpanKey, Span>);

impl Deref for Spans {
    type Target = SlotMap<SpanKey, Span>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Spans {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Spans {
    const DEFAULT_CAPACITY: usize = 1024;
}

impl Default for Spans {
    fn default() -> Self {
        Self(SlotMap::with_capacity_and_key(Self::DEFAULT_CAPACITY))
    }
}

pub(crate) struct SpanBuilder {
    pub(crate) min: u16,
    pub(crate) max: u16,
    pub(crate) area: AreaType,
    pub(crate) next: Option<SpanKey>,
}

impl SpanBuilder {
    pub(crate) fn build(self) -> Span {
        let mut span = Span {
            min: 0,
            max: 0,
            area: AreaType::NOT_WALKABLE,
            next: self.next,
        };
        span.set_min(self.min);
        span.set_max(self.max);
        span.set_area(self.area);
        span
    }
}

impl From<SpanBuilder> for Span {
    fn from(builder: SpanBuilder) -> Self {
        builder.build()
    }
}

/// Corresponds to <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Recast/Include/Recast.h#L294>
///
/// A half-open vertical interval `[min, max)` of solid voxels within a column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Height of the floor. Limited to [`Span::MAX_HEIGHT`].
    min: u16,
    /// Height of the ceiling. Limited to [`Span::MAX_HEIGHT`].
    max: u16,
    /// Area type ID. Limited to 6 bits.
    area: AreaType,
    /// The key of the next-higher span in the column
    next: Option<SpanKey>,
}

impl Span {
    /// The number of bits the original packed representation uses for `min` and `max`.
    pub const HEIGHT_BITS: u32 = 13;
    /// The largest value `min` and `max` can hold.
    pub const MAX_HEIGHT: u16 = (1 << Self::HEIGHT_BITS) - 1;

    /// Height of the floor.
    #[inline]
    pub fn min(&self) -> u16 {
        self.min
    }

    #[inline]
    pub(crate) fn set_min(&mut self, min: u16) {
        self.min = min.min(Self::MAX_HEIGHT);
    }

    /// Height of the ceiling.
    #[inline]
    pub fn max(&self) -> u16 {
        self.max
    }

    #[inline]
    pub(crate) fn set_max(&mut self, max: u16) {
        self.max = max.min(Self::MAX_HEIGHT);
    }

    /// Area type ID.
    #[inline]
    pub fn area(&self) -> AreaType {
        self.area
    }

    #[inline]
    pub(crate) fn set_area(&mut self, area: impl Into<AreaType>) {
        self.area = area.into().truncated();
    }

    /// The key of the next-higher span in the column.
    #[inline]
    pub fn next(&self) -> Option<SpanKey> {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: impl Into<Option<SpanKey>>) {
        self.next = next.into();
    }
}

/// The area type of a span. Spans with [`AreaType::NOT_WALKABLE`] count as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct AreaType(pub u8);

impl Deref for AreaType {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for AreaType {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<u8> for AreaType {
    fn from(value: u8) -> Self {
        AreaType(value)
    }
}

impl AreaType {
    /// The number of bits a span stores for its area.
    pub const BITS: u32 = 6;
    /// The area type 0. Triangles with this area type are not walkable.
    pub const NOT_WALKABLE: Self = Self(0);
    /// Default area type for walkable triangles. The highest area a span can store.
    pub const DEFAULT_WALKABLE: Self = Self((1 << Self::BITS) - 1);

    /// Returns `true` unless this is [`AreaType::NOT_WALKABLE`].
    #[inline]
    pub fn is_walkable(&self) -> bool {
        *self != Self::NOT_WALKABLE
    }

    /// Keeps only the low [`AreaType::BITS`] bits, which is what a span can hold.
    #[inline]
    pub fn truncated(self) -> Self {
        Self(self.0 & Self::DEFAULT_WALKABLE.0)
    }
}
