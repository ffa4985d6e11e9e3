//! Picture assembly: picture header parsing, slice tiling, and the slice
//! worker pool.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use byteorder::{BigEndian, ByteOrder};
use log::debug;
use parking_lot::Mutex;

use crate::error::{ProResError, Result};
use crate::frame::{FrameHeader, Picture};
use crate::slice::{SliceDecoder, SliceRect};
use crate::tables::{INTERLACED_SCAN_ORDER, MACROBLOCK_SIZE, PROGRESSIVE_SCAN_ORDER};
use crate::types::{FieldOrder, InterlaceMode};

/// Number of slice workers a decoder runs by default
pub const DEFAULT_NUM_WORKERS: usize = 8;

/// ProRes decoder configuration
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Number of parallel slice workers
    pub num_workers: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

/// ProRes picture header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureHeader {
    /// Picture header size in bytes; the slice index table starts here
    pub header_size: usize,
    /// Number of slices in the picture
    pub slice_count: usize,
    /// log2 of the slice width in macroblocks
    pub slice_width_factor: u8,
    /// log2 of the slice height in macroblocks
    pub slice_height_factor: u8,
}

impl PictureHeader {
    /// Parse a picture header from the start of the picture region.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &bits = data.first().ok_or_else(|| {
            ProResError::MalformedHeader("missing picture header".into())
        })?;
        if bits < 64 {
            return Err(ProResError::MalformedHeader(format!(
                "picture header size {bits} below minimum 64 bits"
            )));
        }
        if bits % 8 != 0 {
            return Err(ProResError::MalformedHeader(
                "picture header size not byte aligned".into(),
            ));
        }
        let header_size = bits as usize / 8;
        let buf = data.get(..header_size).ok_or_else(|| {
            ProResError::MalformedHeader("truncated picture header".into())
        })?;

        Ok(PictureHeader {
            header_size,
            slice_count: BigEndian::read_u16(&buf[5..7]) as usize,
            slice_width_factor: buf[7] >> 4,
            slice_height_factor: buf[7] & 0x0f,
        })
    }

    /// Nominal slice width in macroblocks
    pub fn slice_width_mb(&self) -> usize {
        1 << self.slice_width_factor
    }

    /// Slice height in macroblocks
    pub fn slice_height_mb(&self) -> usize {
        1 << self.slice_height_factor
    }
}

/// One queued slice decode
struct SliceJob {
    data_start: usize,
    data_len: usize,
    rect: SliceRect,
}

/// Walk the slice index table left to right, top to bottom, assigning each
/// slice its byte range and rectangle. Right-edge slices halve until they
/// fit the frame width.
fn layout_slices(
    data_len: usize,
    index_table: &[u8],
    header: &PictureHeader,
    frame_width: usize,
    padded_height: usize,
) -> Result<Vec<SliceJob>> {
    if header.slice_count == 0 {
        return Err(ProResError::MalformedHeader("picture with no slices".into()));
    }

    let slice_height = header.slice_height_mb() * MACROBLOCK_SIZE;
    let mut jobs = Vec::with_capacity(header.slice_count);
    let mut offset = header.header_size + index_table.len();
    let mut x = 0;
    let mut y = 0;

    for i in 0..header.slice_count {
        let slice_len = BigEndian::read_u16(&index_table[2 * i..]) as usize;
        if offset + slice_len > data_len {
            return Err(ProResError::BitstreamUnderflow);
        }
        if y >= padded_height {
            return Err(ProResError::MalformedHeader(
                "slice table extends past the picture".into(),
            ));
        }

        let mut slice_width = header.slice_width_mb() * MACROBLOCK_SIZE;
        while slice_width > MACROBLOCK_SIZE && x + slice_width > frame_width {
            slice_width >>= 1;
        }

        jobs.push(SliceJob {
            data_start: offset,
            data_len: slice_len,
            rect: SliceRect {
                x,
                y,
                width: slice_width,
            },
        });

        offset += slice_len;
        x += slice_width;
        if x >= frame_width {
            x = 0;
            y += slice_height;
        }
    }
    Ok(jobs)
}

/// ProRes video decoder
///
/// Decodes single frames into planar 8-bit Y'CbCr. Slices are decoded
/// concurrently by a fixed pool of workers; the decoder itself holds no
/// per-frame state and can be shared freely.
///
/// # Example
///
/// ```no_run
/// use prores_decode::ProResDecoder;
///
/// let data = std::fs::read("frame.prores").unwrap();
/// let decoder = ProResDecoder::new();
/// let picture = decoder.decode_frame(&data).unwrap();
///
/// println!("decoded {}x{} {:?}", picture.width, picture.height, picture.chroma_format);
/// ```
#[derive(Debug, Default)]
pub struct ProResDecoder {
    config: DecoderConfig,
}

impl ProResDecoder {
    /// Create a decoder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a custom configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        ProResDecoder { config }
    }

    /// Get the decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a single frame into a planar Y'CbCr picture.
    ///
    /// Interlaced frames decode their first field and report half height.
    pub fn decode_frame(&self, data: &[u8]) -> Result<Picture> {
        let header = FrameHeader::parse(data)?;
        self.decode_picture(&data[header.header_size..], &header, FieldOrder::First)
    }

    /// Parse only the frame header without decoding the picture.
    pub fn decode_header(&self, data: &[u8]) -> Result<FrameHeader> {
        FrameHeader::parse(data)
    }

    fn decode_picture(
        &self,
        data: &[u8],
        frame_header: &FrameHeader,
        field_order: FieldOrder,
    ) -> Result<Picture> {
        if frame_header.has_alpha() {
            return Err(ProResError::Unsupported("alpha channels".into()));
        }

        let scan_order: &'static [usize; 64] = match frame_header.interlace_mode {
            InterlaceMode::Progressive => &PROGRESSIVE_SCAN_ORDER,
            _ => &INTERLACED_SCAN_ORDER,
        };
        let height = frame_header
            .interlace_mode
            .decoded_height(frame_header.height, field_order);

        let header = PictureHeader::parse(data)?;
        let table_end = header.header_size + 2 * header.slice_count;
        let index_table = data.get(header.header_size..table_end).ok_or_else(|| {
            ProResError::MalformedHeader("truncated slice index table".into())
        })?;

        debug!(
            "decoding {}x{} {:?} picture, {} slices",
            frame_header.width, height, frame_header.chroma_format, header.slice_count
        );

        let mut picture = Picture::new(frame_header.width, height, frame_header.chroma_format);
        let (_, padded_height) = picture.padded_dimensions();
        let jobs = layout_slices(
            data.len(),
            index_table,
            &header,
            frame_header.width,
            padded_height,
        )?;

        let sink = picture.sink();
        let num_workers = self.config.num_workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Option<SliceJob>>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (error_tx, error_rx) = mpsc::sync_channel::<ProResError>(1);

        thread::scope(|scope| {
            for _ in 0..num_workers {
                let job_rx = Arc::clone(&job_rx);
                let error_tx = error_tx.clone();
                let sink = &sink;
                scope.spawn(move || {
                    let mut decoder = SliceDecoder::new();
                    loop {
                        let job = job_rx.lock().recv();
                        let Ok(Some(job)) = job else { break };
                        let slice_data = &data[job.data_start..job.data_start + job.data_len];
                        if let Err(err) =
                            decoder.decode_slice(slice_data, frame_header, sink, job.rect, scan_order)
                        {
                            // first error wins, the rest are dropped
                            let _ = error_tx.try_send(err);
                        }
                    }
                });
            }

            for job in jobs {
                let _ = job_tx.send(Some(job));
            }
            for _ in 0..num_workers {
                let _ = job_tx.send(None);
            }
        });

        if let Ok(err) = error_rx.try_recv() {
            return Err(err);
        }
        Ok(picture)
    }
}

/// Decode a single frame with the default configuration.
pub fn decode_frame(data: &[u8]) -> Result<Picture> {
    ProResDecoder::new().decode_frame(data)
}

/// Read a file holding one raw frame and decode it.
pub fn decode_frame_file(path: impl AsRef<std::path::Path>) -> Result<Picture> {
    let data = std::fs::read(path)?;
    decode_frame(&data)
}
