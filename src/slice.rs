//! ProRes slice decoding and the dequantize/IDCT/output block pipeline

use byteorder::{BigEndian, ByteOrder};

use crate::bitstream::BitReader;
use crate::codebook::{decode_ac_coefficients, decode_dc_coefficients};
use crate::error::{ProResError, Result};
use crate::frame::{FrameHeader, PictureSink, PlaneSink};
use crate::idct::idct_8x8;
use crate::tables::{
    BLOCKS_PER_MACROBLOCK, BLOCK_SIZE, MACROBLOCK_SIZE, MAX_BLOCKS_PER_SLICE,
};
use crate::types::ChromaFormat;

/// Slice header information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    /// Slice header size in bytes
    pub header_size: usize,
    /// Quantization index for this slice
    pub quantization_index: u8,
    /// Luma channel byte length
    pub luma_data_size: usize,
    /// Cb channel byte length; Cr takes the remainder of the slice
    pub chroma_u_data_size: usize,
}

impl SliceHeader {
    /// Parse a slice header from the start of a slice payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &bits = data.first().ok_or(ProResError::BitstreamUnderflow)?;
        if bits < 48 {
            return Err(ProResError::MalformedHeader(format!(
                "slice header size {bits} below minimum 48 bits"
            )));
        }
        if bits % 8 != 0 {
            return Err(ProResError::MalformedHeader(
                "slice header size not byte aligned".into(),
            ));
        }
        let header_size = bits as usize / 8;
        let buf = data
            .get(..header_size)
            .ok_or(ProResError::BitstreamUnderflow)?;

        Ok(SliceHeader {
            header_size,
            quantization_index: buf[1],
            luma_data_size: BigEndian::read_u16(&buf[2..4]) as usize,
            chroma_u_data_size: BigEndian::read_u16(&buf[4..6]) as usize,
        })
    }
}

/// Quantization scale for a slice quantization index: the identity below
/// 128, then four steps per index.
pub fn quantization_scale(index: u8) -> i32 {
    if index >= 129 {
        128 + 4 * (i32::from(index) - 128)
    } else {
        i32::from(index)
    }
}

/// Clamp a reconstructed sample to the 10-bit range.
#[inline]
pub fn clamp_10bit(n: i32) -> u16 {
    n.clamp(0, 1023) as u16
}

/// Target rectangle of one slice, in pixels relative to the padded picture.
/// Always whole macroblocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SliceRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
}

/// Decodes slices one at a time, reusing one coefficient scratch across
/// slices and channels.
pub(crate) struct SliceDecoder {
    coefficients: Box<[[i16; 64]; MAX_BLOCKS_PER_SLICE]>,
}

impl SliceDecoder {
    pub fn new() -> Self {
        SliceDecoder {
            coefficients: Box::new([[0; 64]; MAX_BLOCKS_PER_SLICE]),
        }
    }

    /// Decode one slice into its rectangle of the output planes.
    pub fn decode_slice(
        &mut self,
        data: &[u8],
        frame_header: &FrameHeader,
        sink: &PictureSink<'_>,
        rect: SliceRect,
        scan_order: &[usize; 64],
    ) -> Result<()> {
        let header = SliceHeader::parse(data)?;
        let payload = &data[header.header_size..];
        let qscale = quantization_scale(header.quantization_index);

        let mut scaled_luma = [0i32; 64];
        for (dst, &q) in scaled_luma.iter_mut().zip(&frame_header.luma_quant_matrix) {
            *dst = i32::from(q) * qscale;
        }

        let luma_data = payload
            .get(..header.luma_data_size)
            .ok_or(ProResError::BitstreamUnderflow)?;
        self.decode_channel(luma_data, &sink.y, rect, scan_order, &scaled_luma, false, false)?;
        let payload = &payload[header.luma_data_size..];

        let mut scaled_chroma = [0i32; 64];
        for (dst, &q) in scaled_chroma.iter_mut().zip(&frame_header.chroma_quant_matrix) {
            *dst = i32::from(q) * qscale;
        }
        let subsampled = frame_header.chroma_format == ChromaFormat::Yuv422;

        let chroma_u_data = payload
            .get(..header.chroma_u_data_size)
            .ok_or(ProResError::BitstreamUnderflow)?;
        self.decode_channel(chroma_u_data, &sink.cb, rect, scan_order, &scaled_chroma, subsampled, true)?;
        let chroma_v_data = &payload[header.chroma_u_data_size..];
        self.decode_channel(chroma_v_data, &sink.cr, rect, scan_order, &scaled_chroma, subsampled, true)?;

        Ok(())
    }

    /// Decode one channel of a slice and emit its blocks into the plane.
    fn decode_channel(
        &mut self,
        data: &[u8],
        plane: &PlaneSink,
        rect: SliceRect,
        scan_order: &[usize; 64],
        scaled_matrix: &[i32; 64],
        subsampled: bool,
        chroma: bool,
    ) -> Result<()> {
        let slice_mb_width = rect.width / MACROBLOCK_SIZE;
        let mut blocks_per_slice = BLOCKS_PER_MACROBLOCK * slice_mb_width;
        if subsampled {
            blocks_per_slice >>= 1;
        }
        if blocks_per_slice > MAX_BLOCKS_PER_SLICE {
            return Err(ProResError::Unsupported(format!(
                "{blocks_per_slice} coefficient blocks in one slice channel"
            )));
        }
        if blocks_per_slice == 0 {
            return Err(ProResError::MalformedHeader("empty slice rectangle".into()));
        }

        // All positions the AC loop skips must read back as zero.
        let coefficients = &mut self.coefficients[..blocks_per_slice];
        for block in coefficients.iter_mut() {
            *block = [0; 64];
        }

        let mut bs = BitReader::new(data);
        decode_dc_coefficients(&mut bs, coefficients, blocks_per_slice)?;
        decode_ac_coefficients(&mut bs, coefficients, blocks_per_slice, scan_order)?;

        for mb in 0..slice_mb_width {
            let mb_x = rect.x + mb * MACROBLOCK_SIZE;
            if chroma && subsampled {
                // two blocks per macroblock, stacked in the half-width plane
                let x = mb_x >> 1;
                let blocks = &self.coefficients[mb * 2..];
                emit_block(plane, x, rect.y, &blocks[0], scaled_matrix);
                emit_block(plane, x, rect.y + BLOCK_SIZE, &blocks[1], scaled_matrix);
            } else {
                let blocks = &self.coefficients[mb * BLOCKS_PER_MACROBLOCK..];
                emit_block(plane, mb_x, rect.y, &blocks[0], scaled_matrix);
                emit_block(plane, mb_x + BLOCK_SIZE, rect.y, &blocks[1], scaled_matrix);
                emit_block(plane, mb_x, rect.y + BLOCK_SIZE, &blocks[2], scaled_matrix);
                emit_block(plane, mb_x + BLOCK_SIZE, rect.y + BLOCK_SIZE, &blocks[3], scaled_matrix);
            }
        }
        Ok(())
    }
}

/// Dequantize one block, transform it, and write the narrowed 8-bit
/// samples into the destination plane.
fn emit_block(
    plane: &PlaneSink,
    x: usize,
    y: usize,
    quantized: &[i16; 64],
    scaled_matrix: &[i32; 64],
) {
    let mut dequantized = [0i32; 64];
    dequantized[0] = 4096 + (i32::from(quantized[0]).wrapping_mul(scaled_matrix[0]) >> 2);
    for i in 1..64 {
        dequantized[i] = i32::from(quantized[i]).wrapping_mul(scaled_matrix[i]) >> 2;
    }

    idct_8x8(&mut dequantized);

    for row in 0..BLOCK_SIZE {
        let mut pixels = [0u8; BLOCK_SIZE];
        for (px, &value) in pixels
            .iter_mut()
            .zip(&dequantized[row * BLOCK_SIZE..(row + 1) * BLOCK_SIZE])
        {
            *px = (clamp_10bit(value) >> 2) as u8;
        }
        plane.write_row((y + row) * plane.stride + x, &pixels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Picture;
    use crate::tables::PROGRESSIVE_SCAN_ORDER;
    use crate::types::InterlaceMode;

    #[test]
    fn test_slice_header_parse() {
        let data = [48, 17, 0x01, 0x00, 0x00, 0x80, 0xaa];
        let header = SliceHeader::parse(&data).unwrap();

        assert_eq!(header.header_size, 6);
        assert_eq!(header.quantization_index, 17);
        assert_eq!(header.luma_data_size, 256);
        assert_eq!(header.chroma_u_data_size, 128);
    }

    #[test]
    fn test_slice_header_rejects_bad_sizes() {
        assert!(matches!(
            SliceHeader::parse(&[40, 0, 0, 0, 0, 0]),
            Err(ProResError::MalformedHeader(_))
        ));
        assert!(matches!(
            SliceHeader::parse(&[49, 0, 0, 0, 0, 0, 0]),
            Err(ProResError::MalformedHeader(_))
        ));
        assert!(matches!(
            SliceHeader::parse(&[]),
            Err(ProResError::BitstreamUnderflow)
        ));
        // header claims more bytes than the slice holds
        assert!(matches!(
            SliceHeader::parse(&[56, 0, 0, 0, 0, 0]),
            Err(ProResError::BitstreamUnderflow)
        ));
    }

    #[test]
    fn test_quantization_scale() {
        assert_eq!(quantization_scale(1), 1);
        assert_eq!(quantization_scale(64), 64);
        assert_eq!(quantization_scale(127), 127);
        assert_eq!(quantization_scale(128), 128);
        assert_eq!(quantization_scale(129), 132);
        assert_eq!(quantization_scale(224), 512);
    }

    #[test]
    fn test_clamp_10bit() {
        assert_eq!(clamp_10bit(i32::MIN), 0);
        assert_eq!(clamp_10bit(-1), 0);
        assert_eq!(clamp_10bit(0), 0);
        assert_eq!(clamp_10bit(511), 511);
        assert_eq!(clamp_10bit(1023), 1023);
        assert_eq!(clamp_10bit(1024), 1023);
        assert_eq!(clamp_10bit(i32::MAX), 1023);
    }

    fn test_frame_header() -> FrameHeader {
        FrameHeader {
            header_size: 28,
            version: 0,
            width: 16,
            height: 16,
            chroma_format: ChromaFormat::Yuv422,
            interlace_mode: InterlaceMode::Progressive,
            alpha_info: 0,
            luma_quant_matrix: [4; 64],
            chroma_quant_matrix: [4; 64],
        }
    }

    /// Channel data coding DC zero in every block, followed by a zero tail.
    fn dc_zero_channel(block_count: usize) -> Vec<u8> {
        let mut w = crate::bitstream::BitWriter::new();
        w.write_bits(0b100000, 6);
        if block_count > 1 {
            w.write_bits(0b1000, 4);
        }
        for _ in 2..block_count {
            w.write_bit(true);
        }
        w.align_to_byte();
        w.into_data()
    }

    #[test]
    fn test_decode_slice_flat() {
        let header = test_frame_header();
        let mut picture = Picture::new(16, 16, ChromaFormat::Yuv422);

        let luma = dc_zero_channel(4);
        let chroma = dc_zero_channel(2);
        let mut data = vec![48, 4];
        data.extend((luma.len() as u16).to_be_bytes());
        data.extend((chroma.len() as u16).to_be_bytes());
        data.extend(&luma);
        data.extend(&chroma);
        data.extend(&chroma);

        let sink = picture.sink();
        let mut decoder = SliceDecoder::new();
        decoder
            .decode_slice(
                &data,
                &header,
                &sink,
                SliceRect { x: 0, y: 0, width: 16 },
                &PROGRESSIVE_SCAN_ORDER,
            )
            .unwrap();
        drop(sink);

        assert!(picture.y_plane.iter().all(|&p| p == 128));
        assert!(picture.cb_plane.iter().all(|&p| p == 128));
        assert!(picture.cr_plane.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_decode_slice_truncated_luma() {
        let header = test_frame_header();
        let mut picture = Picture::new(16, 16, ChromaFormat::Yuv422);

        let mut luma = dc_zero_channel(4);
        luma.pop();
        let chroma = dc_zero_channel(2);
        let mut data = vec![48, 4];
        data.extend((luma.len() as u16).to_be_bytes());
        data.extend((chroma.len() as u16).to_be_bytes());
        data.extend(&luma);
        data.extend(&chroma);
        data.extend(&chroma);

        let sink = picture.sink();
        let mut decoder = SliceDecoder::new();
        let result = decoder.decode_slice(
            &data,
            &header,
            &sink,
            SliceRect { x: 0, y: 0, width: 16 },
            &PROGRESSIVE_SCAN_ORDER,
        );
        assert!(matches!(result, Err(ProResError::BitstreamUnderflow)));
    }

    #[test]
    fn test_decode_channel_rejects_wide_slice() {
        let header = test_frame_header();
        let mut picture = Picture::new(256, 16, ChromaFormat::Yuv422);
        let sink = picture.sink();
        let mut decoder = SliceDecoder::new();

        let result = decoder.decode_slice(
            &[48, 4, 0, 1, 0, 1, 0, 0],
            &header,
            &sink,
            SliceRect { x: 0, y: 0, width: 256 },
            &PROGRESSIVE_SCAN_ORDER,
        );
        assert!(matches!(result, Err(ProResError::Unsupported(_))));
    }
}
