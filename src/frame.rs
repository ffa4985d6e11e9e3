//! Frame header parsing and decoded picture buffers

use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder};
use log::warn;

use crate::error::{ProResError, Result};
use crate::tables::{BLOCK_SIZE, DEFAULT_QUANT_MATRIX, MACROBLOCK_SIZE};
use crate::types::{ChromaFormat, InterlaceMode};

/// ProRes frame header
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Frame header size in bytes; the picture region starts here
    pub header_size: usize,
    /// Codec version
    pub version: u16,
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Chroma format (4:2:2 or 4:4:4)
    pub chroma_format: ChromaFormat,
    /// Interlace mode
    pub interlace_mode: InterlaceMode,
    /// Alpha channel info (nonzero means an alpha channel is coded)
    pub alpha_info: u8,
    /// Luma quantization matrix, custom or default
    pub luma_quant_matrix: [i8; 64],
    /// Chroma quantization matrix; falls back to the luma matrix
    pub chroma_quant_matrix: [i8; 64],
}

impl FrameHeader {
    /// Smallest frame header the format defines
    pub const MIN_HEADER_SIZE: usize = 28;
    /// Upper bound to keep bad size fields from requesting huge reads
    pub const MAX_HEADER_SIZE: usize = 1024;

    /// Parse a frame header from the start of a frame blob.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(ProResError::MalformedHeader(
                "frame shorter than its header size field".into(),
            ));
        }
        let header_size = BigEndian::read_u16(&data[0..2]) as usize;
        if header_size < Self::MIN_HEADER_SIZE {
            return Err(ProResError::MalformedHeader(format!(
                "frame header size {} below minimum {}",
                header_size,
                Self::MIN_HEADER_SIZE
            )));
        }
        if header_size > Self::MAX_HEADER_SIZE {
            return Err(ProResError::MalformedHeader(format!(
                "frame header size {} above maximum {}",
                header_size,
                Self::MAX_HEADER_SIZE
            )));
        }
        let buf = data.get(..header_size).ok_or_else(|| {
            ProResError::MalformedHeader("truncated frame header".into())
        })?;

        let version = BigEndian::read_u16(&buf[2..4]);
        let width = BigEndian::read_u16(&buf[8..10]) as usize;
        let height = BigEndian::read_u16(&buf[10..12]) as usize;
        if width == 0 || height == 0 {
            return Err(ProResError::MalformedHeader("zero frame dimensions".into()));
        }

        let flags = buf[12];
        let chroma_format = if flags & 0xc0 == 0xc0 {
            ChromaFormat::Yuv444
        } else {
            ChromaFormat::Yuv422
        };
        let interlace_mode = match (flags >> 2) & 0x03 {
            0 => InterlaceMode::Progressive,
            1 => InterlaceMode::TopFieldFirst,
            2 => InterlaceMode::BottomFieldFirst,
            _ => {
                warn!("unrecognized interlace flags {flags:#04x}, decoding as progressive");
                InterlaceMode::Progressive
            }
        };

        let alpha_info = buf[17] & 0x0f;
        let matrix_flags = buf[19];

        let mut offset = 20;
        let luma_quant_matrix = if matrix_flags & 0x02 != 0 {
            let matrix = read_quant_matrix(buf, offset)?;
            offset += 64;
            matrix
        } else {
            DEFAULT_QUANT_MATRIX
        };
        let chroma_quant_matrix = if matrix_flags & 0x01 != 0 {
            read_quant_matrix(buf, offset)?
        } else {
            luma_quant_matrix
        };

        Ok(FrameHeader {
            header_size,
            version,
            width,
            height,
            chroma_format,
            interlace_mode,
            alpha_info,
            luma_quant_matrix,
            chroma_quant_matrix,
        })
    }

    /// Whether an alpha channel is coded in this frame
    pub fn has_alpha(&self) -> bool {
        self.alpha_info != 0
    }
}

fn read_quant_matrix(buf: &[u8], offset: usize) -> Result<[i8; 64]> {
    let bytes = buf.get(offset..offset + 64).ok_or_else(|| {
        ProResError::MalformedHeader("quantization matrix past the frame header".into())
    })?;
    let mut matrix = [0i8; 64];
    for (dst, &src) in matrix.iter_mut().zip(bytes) {
        *dst = src as i8;
    }
    Ok(matrix)
}

/// Decoded picture with planar 8-bit Y'CbCr output.
///
/// Planes are padded to whole macroblocks; `width` and `height` are the
/// declared frame bounds, so rows are read through the stride.
#[derive(Debug, Clone)]
pub struct Picture {
    /// Visible width in pixels
    pub width: usize,
    /// Visible height in pixels
    pub height: usize,
    /// Chroma format
    pub chroma_format: ChromaFormat,
    /// Luma plane, `y_stride` bytes per row
    pub y_plane: Vec<u8>,
    /// Blue-difference chroma plane, `chroma_stride` bytes per row
    pub cb_plane: Vec<u8>,
    /// Red-difference chroma plane, `chroma_stride` bytes per row
    pub cr_plane: Vec<u8>,
    /// Luma row stride in bytes
    pub y_stride: usize,
    /// Chroma row stride in bytes
    pub chroma_stride: usize,
}

impl Picture {
    pub(crate) fn new(width: usize, height: usize, chroma_format: ChromaFormat) -> Self {
        let padded_width = width.div_ceil(MACROBLOCK_SIZE) * MACROBLOCK_SIZE;
        let padded_height = height.div_ceil(MACROBLOCK_SIZE) * MACROBLOCK_SIZE;
        let chroma_width = padded_width >> chroma_format.chroma_h_shift();

        Picture {
            width,
            height,
            chroma_format,
            y_plane: vec![0; padded_width * padded_height],
            cb_plane: vec![0; chroma_width * padded_height],
            cr_plane: vec![0; chroma_width * padded_height],
            y_stride: padded_width,
            chroma_stride: chroma_width,
        }
    }

    /// Plane dimensions rounded up to whole macroblocks
    pub fn padded_dimensions(&self) -> (usize, usize) {
        (self.y_stride, self.y_plane.len() / self.y_stride)
    }

    /// Visible chroma width in pixels
    pub fn chroma_width(&self) -> usize {
        let shift = self.chroma_format.chroma_h_shift();
        (self.width + (1 << shift) - 1) >> shift
    }

    /// One visible luma row
    pub fn y_row(&self, row: usize) -> &[u8] {
        &self.y_plane[row * self.y_stride..][..self.width]
    }

    /// One visible Cb row
    pub fn cb_row(&self, row: usize) -> &[u8] {
        &self.cb_plane[row * self.chroma_stride..][..self.chroma_width()]
    }

    /// One visible Cr row
    pub fn cr_row(&self, row: usize) -> &[u8] {
        &self.cr_plane[row * self.chroma_stride..][..self.chroma_width()]
    }

    pub(crate) fn sink(&mut self) -> PictureSink<'_> {
        PictureSink {
            y: PlaneSink {
                ptr: self.y_plane.as_mut_ptr(),
                len: self.y_plane.len(),
                stride: self.y_stride,
            },
            cb: PlaneSink {
                ptr: self.cb_plane.as_mut_ptr(),
                len: self.cb_plane.len(),
                stride: self.chroma_stride,
            },
            cr: PlaneSink {
                ptr: self.cr_plane.as_mut_ptr(),
                len: self.cr_plane.len(),
                stride: self.chroma_stride,
            },
            _picture: PhantomData,
        }
    }
}

/// Raw write handle to one output plane, shared by the slice workers.
pub(crate) struct PlaneSink {
    ptr: *mut u8,
    len: usize,
    pub(crate) stride: usize,
}

impl PlaneSink {
    /// Write one block row of samples at a byte offset into the plane.
    pub(crate) fn write_row(&self, offset: usize, pixels: &[u8; BLOCK_SIZE]) {
        assert!(offset + BLOCK_SIZE <= self.len);
        // Slice rectangles tile the padded picture exactly once, so rows
        // written through this handle never alias between workers.
        unsafe {
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), self.ptr.add(offset), BLOCK_SIZE);
        }
    }
}

/// Write handles for all three planes of a picture being decoded.
pub(crate) struct PictureSink<'a> {
    pub(crate) y: PlaneSink,
    pub(crate) cb: PlaneSink,
    pub(crate) cr: PlaneSink,
    _picture: PhantomData<&'a mut Picture>,
}

unsafe impl Send for PictureSink<'_> {}
unsafe impl Sync for PictureSink<'_> {}
