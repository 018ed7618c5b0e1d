use std::fmt;

/// Identifier of an indirect object: object number plus generation number.
///
/// Ordering is object-number major. `0 0` is the direct-object sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    number: u32,
    generation: u16,
}

impl Reference {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    /// The `0 0` sentinel used by direct objects.
    pub const fn direct() -> Self {
        Self::new(0, 0)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn is_indirect(&self) -> bool {
        !(self.number == 0 && self.generation == 0)
    }

    /// Same generation, object number shifted by `offset`; `None` past
    /// `u32::MAX`.
    pub(crate) fn offset_by(&self, offset: u32) -> Option<Self> {
        let number = self.number.checked_add(offset)?;
        Some(Self::new(number, self.generation))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

impl From<(u32, u16)> for Reference {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}
