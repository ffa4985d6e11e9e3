//! ProRes type definitions

/// Chroma subsampling format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    /// 4:2:2 chroma subsampling
    Yuv422,
    /// 4:4:4 chroma sampling (no subsampling)
    Yuv444,
}

impl ChromaFormat {
    /// Returns the chroma plane width divisor as a shift
    pub fn chroma_h_shift(&self) -> u32 {
        match self {
            ChromaFormat::Yuv422 => 1,
            ChromaFormat::Yuv444 => 0,
        }
    }

    /// Returns the chroma plane height divisor (always 0 for ProRes)
    pub fn chroma_v_shift(&self) -> u32 {
        0
    }
}

/// Interlace mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlaceMode {
    /// Progressive scan
    Progressive,
    /// Interlaced, top field first
    TopFieldFirst,
    /// Interlaced, bottom field first
    BottomFieldFirst,
}

impl InterlaceMode {
    /// Returns true for either interlaced variant
    pub fn is_interlaced(&self) -> bool {
        !matches!(self, InterlaceMode::Progressive)
    }

    /// Height in pixels of the decoded field for this mode.
    ///
    /// Progressive frames decode at full height. Interlaced frames decode a
    /// single field; the first field carries the extra row when the frame
    /// height is odd and the frame is top-field-first.
    pub(crate) fn decoded_height(&self, frame_height: usize, field: FieldOrder) -> usize {
        match self {
            InterlaceMode::Progressive => frame_height,
            InterlaceMode::TopFieldFirst => match field {
                FieldOrder::First => frame_height.div_ceil(2),
                FieldOrder::Second => frame_height / 2,
            },
            InterlaceMode::BottomFieldFirst => match field {
                FieldOrder::First => frame_height / 2,
                FieldOrder::Second => frame_height.div_ceil(2),
            },
        }
    }
}

/// Which field of an interlaced frame to decode.
///
/// The public entry points always decode the first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldOrder {
    First,
    #[allow(dead_code)]
    Second,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroma_shifts() {
        assert_eq!(ChromaFormat::Yuv422.chroma_h_shift(), 1);
        assert_eq!(ChromaFormat::Yuv444.chroma_h_shift(), 0);
        assert_eq!(ChromaFormat::Yuv422.chroma_v_shift(), 0);
        assert_eq!(ChromaFormat::Yuv444.chroma_v_shift(), 0);
    }

    #[test]
    fn test_is_interlaced() {
        assert!(!InterlaceMode::Progressive.is_interlaced());
        assert!(InterlaceMode::TopFieldFirst.is_interlaced());
        assert!(InterlaceMode::BottomFieldFirst.is_interlaced());
    }

    #[test]
    fn test_decoded_height() {
        assert_eq!(InterlaceMode::Progressive.decoded_height(1080, FieldOrder::First), 1080);
        assert_eq!(InterlaceMode::TopFieldFirst.decoded_height(1080, FieldOrder::First), 540);
        assert_eq!(InterlaceMode::BottomFieldFirst.decoded_height(1080, FieldOrder::First), 540);

        // odd heights put the extra row in the top field
        assert_eq!(InterlaceMode::TopFieldFirst.decoded_height(1081, FieldOrder::First), 541);
        assert_eq!(InterlaceMode::TopFieldFirst.decoded_height(1081, FieldOrder::Second), 540);
        assert_eq!(InterlaceMode::BottomFieldFirst.decoded_height(1081, FieldOrder::First), 540);
        assert_eq!(InterlaceMode::BottomFieldFirst.decoded_height(1081, FieldOrder::Second), 541);
    }
}
