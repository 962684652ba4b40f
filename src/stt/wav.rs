//! In-memory WAV framing for raw 16-bit PCM.
//!
//! No transcoding: the PCM bytes are copied verbatim after a 44-byte RIFF
//! header built from the caller's channel count and frame rate.

/// Sample width in bytes. Incoming audio is 16-bit linear PCM.
pub const SAMPLE_WIDTH: u16 = 2;

const HEADER_LEN: usize = 44;

/// Wrap little-endian 16-bit PCM `pcm` in a WAV container.
pub fn encode_pcm_wav(pcm: &[u8], channels: u16, sample_rate: u32) -> Vec<u8> {
    let data_size = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let riff_size = data_size.saturating_add(36); // header is 44 bytes, minus RIFF id + size
    let block_align = channels * SAMPLE_WIDTH;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut buf = Vec::with_capacity(HEADER_LEN + pcm.len());

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&riff_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&(SAMPLE_WIDTH * 8).to_le_bytes());

    // data sub-chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend_from_slice(pcm);

    buf
}
