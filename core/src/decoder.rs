//! Streaming Robot36 demodulator
//!
//! Audio arrives in arbitrary chunks at any sample rate. Each chunk is
//! resampled to [`DECODER_SAMPLE_RATE`] and queued; the state machine then
//! advances as far as the queued audio allows and suspends otherwise, so no
//! call ever blocks waiting for input.
//!
//! ```text
//! Idle -> Leader1 -> Break -> Leader2 -> Vis -> Ready -> Lines (x240)
//!   ^                                      |
//!   +------------- unknown VIS code -------+
//! ```

use std::fmt;

use log::{debug, info, trace, warn};

use crate::buffer::SampleBuffer;
use crate::color::ycbcr_to_argb;
use crate::frequency::{estimate_frequency, freq_to_value};
use crate::goertzel::{goertzel, tone_share};
use crate::image::ImageBuffer;
use crate::resample::resample_into;
use crate::session::Progress;
use crate::{
    ms_to_samples, CHROMA_MS, CHROMA_WIDTH, DECODER_SAMPLE_RATE, DEFAULT_INPUT_SAMPLE_RATE,
    IMAGE_HEIGHT, IMAGE_WIDTH, LEADER_FREQ, LUMA_MS, MIN_ANALYSIS_WINDOW, PORCH_FREQ, PORCH_MS,
    ROBOT36_ALT_VIS_CODE, ROBOT36_VIS_CODE, SCAN_WINDOW_MS, SEPARATOR_FREQ, SEPARATOR_MS,
    SEPARATOR_TOLERANCE_HZ, SHORT_PORCH_US, SLIDE_MS, SYNC_FREQ, SYNC_MS, TONE_THRESHOLD,
    VIS_BIT_MS, VIS_ONE_FREQ, VIS_ZERO_FREQ, WIDE_SEPARATOR_US,
};

/// Analysis window for one group of narrow columns
const GROUP_WINDOW: usize = 2 * MIN_ANALYSIS_WINDOW;

/// Estimates averaged on each side of a group centre
const PHASE_OFFSETS: isize = 4;

/// Distance between averaged group windows, in samples
const PHASE_STEP: isize = 6;

/// Resolution of the sync edge search, in samples
const EDGE_SEARCH_STEP: usize = 4;

/// Protocol position of the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderState {
    /// Scanning for the first leader tone
    Idle,
    /// Inside the first 1900 Hz leader, waiting for the break
    Leader1,
    /// Waiting for the second leader after the 1200 Hz break
    Break,
    /// Inside the second leader, waiting for the VIS start bit
    Leader2,
    /// Collecting the eight VIS bits and the stop bit
    Vis,
    /// Header accepted, first scan line not yet decoded
    Ready,
    /// Decoding scan lines
    Lines,
}

impl DecoderState {
    /// Host-facing name; both leader states report `"Leader"`
    pub fn name(&self) -> &'static str {
        match self {
            DecoderState::Idle => "Idle",
            DecoderState::Leader1 | DecoderState::Leader2 => "Leader",
            DecoderState::Break => "Break",
            DecoderState::Vis => "Vis",
            DecoderState::Ready => "Ready",
            DecoderState::Lines => "Image",
        }
    }
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arrangement of the separator and the porch that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLayout {
    /// 4 ms separator, 3 ms porch
    Standard,
    /// 4.5 ms separator, 1.5 ms porch; announced by a bare 0x08 VIS byte
    ShortPorch,
}

impl LineLayout {
    /// Layout announced by an accepted VIS byte
    fn for_vis(byte: u8) -> Self {
        if byte == ROBOT36_ALT_VIS_CODE {
            LineLayout::ShortPorch
        } else {
            LineLayout::Standard
        }
    }
}

/// Segment lengths in samples at the decoder rate
#[derive(Debug, Clone, Copy)]
struct Timing {
    scan: usize,
    slide: usize,
    bit: usize,
    sync: usize,
    porch: usize,
    luma: usize,
    separator: usize,
    back_porch: usize,
    chroma: usize,
}

impl Timing {
    fn new(sample_rate: u32) -> Self {
        Self {
            scan: ms_to_samples(sample_rate, SCAN_WINDOW_MS),
            slide: ms_to_samples(sample_rate, SLIDE_MS),
            bit: ms_to_samples(sample_rate, VIS_BIT_MS),
            sync: ms_to_samples(sample_rate, SYNC_MS),
            porch: ms_to_samples(sample_rate, PORCH_MS),
            luma: ms_to_samples(sample_rate, LUMA_MS),
            separator: ms_to_samples(sample_rate, SEPARATOR_MS),
            back_porch: ms_to_samples(sample_rate, PORCH_MS),
            chroma: ms_to_samples(sample_rate, CHROMA_MS),
        }
    }

    fn with_layout(self, layout: LineLayout, sample_rate: u32) -> Self {
        let micros = |us: u32| (sample_rate as usize * us as usize) / 1_000_000;
        match layout {
            LineLayout::Standard => Self {
                separator: ms_to_samples(sample_rate, SEPARATOR_MS),
                back_porch: ms_to_samples(sample_rate, PORCH_MS),
                ..self
            },
            LineLayout::ShortPorch => Self {
                separator: micros(WIDE_SEPARATOR_US),
                back_porch: micros(SHORT_PORCH_US),
                ..self
            },
        }
    }

    /// Sync through chroma, one complete scan line
    fn line(&self) -> usize {
        self.sync + self.porch + self.luma + self.separator + self.back_porch + self.chroma
    }

    fn pixel(&self) -> usize {
        (self.luma / IMAGE_WIDTH).max(1)
    }
}

/// Resumable Robot36 decoder context
///
/// Owns the queued audio, the 320x240 output frame and the chroma history.
/// Not internally synchronised; share it across threads through
/// [`DecodeSession`](crate::session::DecodeSession).
pub struct Robot36Decoder {
    input_rate: u32,
    sample_rate: u32,
    timing: Timing,
    layout: LineLayout,
    buffer: SampleBuffer,
    image: ImageBuffer,
    line: usize,
    state: DecoderState,
    completed: bool,
    last_cb: [u8; CHROMA_WIDTH],
    last_cr: [u8; CHROMA_WIDTH],
    vis_bits: u8,
    vis_count: u8,
}

impl Robot36Decoder {
    /// Create a decoder for audio at `input_rate` Hz (0 selects 48 kHz)
    pub fn new(input_rate: u32) -> Self {
        let input_rate = if input_rate > 0 {
            input_rate
        } else {
            DEFAULT_INPUT_SAMPLE_RATE
        };
        let timing = Timing::new(DECODER_SAMPLE_RATE);

        Self {
            input_rate,
            sample_rate: DECODER_SAMPLE_RATE,
            timing,
            layout: LineLayout::Standard,
            buffer: SampleBuffer::with_capacity(timing.line() * 2),
            image: ImageBuffer::new(),
            line: 0,
            state: DecoderState::Idle,
            completed: false,
            last_cb: [128; CHROMA_WIDTH],
            last_cr: [128; CHROMA_WIDTH],
            vis_bits: 0,
            vis_count: 0,
        }
    }

    /// Queue a chunk of audio and advance as far as it allows
    ///
    /// `rate_hint` is the sample rate of this chunk; 0 means the rate given
    /// at construction. Empty chunks and feeds after completion are ignored.
    pub fn feed(&mut self, samples: &[f32], rate_hint: u32) {
        if self.completed || samples.is_empty() {
            return;
        }

        let rate = if rate_hint > 0 { rate_hint } else { self.input_rate };
        resample_into(samples, rate, self.sample_rate, &mut self.buffer);
        self.process();
    }

    /// Snapshot of the decode so far
    pub fn progress(&self) -> Progress {
        Progress {
            line: self.line,
            pixels: self.image.pixels().to_vec(),
            state: self.state,
            completed: self.completed,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Line layout announced by the last accepted VIS byte
    pub fn layout(&self) -> LineLayout {
        self.layout
    }

    /// Samples queued at the decoder rate and not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn process(&mut self) {
        while !self.completed {
            let advanced = match self.state {
                DecoderState::Idle => self.scan_for_leader(),
                DecoderState::Leader1 => self.wait_for_break(),
                DecoderState::Break => self.wait_for_second_leader(),
                DecoderState::Leader2 => self.wait_for_start_bit(),
                DecoderState::Vis => self.read_vis(),
                DecoderState::Ready | DecoderState::Lines => self.decode_line(),
            };
            if !advanced {
                break;
            }
        }
    }

    fn enter(&mut self, state: DecoderState) {
        debug!(
            "Decoder {:?} -> {:?} ({} samples queued)",
            self.state,
            state,
            self.buffer.len()
        );
        self.state = state;
    }

    /// Normalised magnitude of `freq` over the first `len` queued samples
    fn magnitude(&mut self, len: usize, freq: f32) -> f32 {
        let sample_rate = self.sample_rate as f32;
        goertzel(&self.buffer.as_slice()[..len], freq, sample_rate)
    }

    /// Whether `freq` carries more than [`TONE_THRESHOLD`] of the signal in
    /// the first `len` queued samples, independent of input level
    fn tone_present(&mut self, len: usize, freq: f32) -> bool {
        let sample_rate = self.sample_rate as f32;
        tone_share(&self.buffer.as_slice()[..len], freq, sample_rate) > TONE_THRESHOLD
    }

    fn scan_for_leader(&mut self) -> bool {
        let len = self.timing.scan;
        if self.buffer.len() < len {
            return false;
        }

        let leader = self.magnitude(len, LEADER_FREQ);
        let sync = self.magnitude(len, SYNC_FREQ);
        if leader > sync {
            self.buffer.consume(len);
            self.enter(DecoderState::Leader1);
        } else {
            self.buffer.consume(self.timing.slide);
        }
        true
    }

    fn wait_for_break(&mut self) -> bool {
        let len = self.timing.slide;
        if self.buffer.len() < len {
            return false;
        }

        let sync = self.tone_present(len, SYNC_FREQ);
        self.buffer.consume(len);
        if sync {
            self.enter(DecoderState::Break);
        }
        true
    }

    fn wait_for_second_leader(&mut self) -> bool {
        let len = self.timing.scan;
        if self.buffer.len() < len {
            return false;
        }

        if self.tone_present(len, LEADER_FREQ) {
            self.buffer.consume(len);
            self.enter(DecoderState::Leader2);
        } else {
            self.buffer.consume(self.timing.slide);
        }
        true
    }

    /// Detect the 1200 Hz start bit and consume through its end
    ///
    /// The detection window is not aligned with the start bit, so the
    /// fraction of the window holding 1200 Hz locates the edge. When the rest
    /// of the window is leader the start bit ends one bit after that edge;
    /// when it is already VIS data the start bit ends at the edge itself.
    fn wait_for_start_bit(&mut self) -> bool {
        let bit = self.timing.bit;
        if self.buffer.len() < bit * 2 {
            return false;
        }

        if !self.tone_present(bit, SYNC_FREQ) {
            self.buffer.consume(bit);
            return true;
        }

        let start = self.magnitude(bit, SYNC_FREQ);
        let leader = self.magnitude(bit, LEADER_FREQ);
        let data = self
            .magnitude(bit, VIS_ONE_FREQ)
            .max(self.magnitude(bit, VIS_ZERO_FREQ));

        let skip = if leader >= data {
            let fraction = (start / (start + leader)).clamp(0.0, 1.0);
            ((2.0 - fraction) * bit as f32).round() as usize
        } else {
            let fraction = (start / (start + data)).clamp(0.0, 1.0);
            (fraction * bit as f32).round() as usize
        };

        self.buffer.consume(skip);
        self.vis_bits = 0;
        self.vis_count = 0;
        self.enter(DecoderState::Vis);
        true
    }

    fn read_vis(&mut self) -> bool {
        let bit = self.timing.bit;

        while self.vis_count < 8 && self.buffer.len() >= bit {
            let one = self.magnitude(bit, VIS_ONE_FREQ);
            let zero = self.magnitude(bit, VIS_ZERO_FREQ);
            if one > zero {
                self.vis_bits |= 1 << self.vis_count;
            }
            self.vis_count += 1;
            self.buffer.consume(bit);
        }

        // Stop bit
        if self.vis_count < 8 || self.buffer.len() < bit {
            return false;
        }
        self.buffer.consume(bit);

        if is_robot36_vis(self.vis_bits) {
            self.layout = LineLayout::for_vis(self.vis_bits);
            self.timing = self.timing.with_layout(self.layout, self.sample_rate);
            info!(
                "VIS byte 0x{:02X} accepted, {:?} line layout",
                self.vis_bits, self.layout
            );
            self.enter(DecoderState::Ready);
        } else {
            warn!(
                "Rejected VIS byte 0x{:02X}, returning to leader search",
                self.vis_bits
            );
            self.line = 0;
            self.enter(DecoderState::Idle);
        }
        true
    }

    fn decode_line(&mut self) -> bool {
        let timing = self.timing;
        let line_len = timing.line();
        if self.buffer.len() < line_len {
            return false;
        }

        let sample_rate = self.sample_rate as f32;
        let samples = self.buffer.as_slice();

        let Some(sync_at) = find_sync(samples, timing.sync, sample_rate) else {
            trace!("No sync in {} queued samples", samples.len());
            self.buffer.consume(timing.pixel());
            return false;
        };
        // Room for the edge search plus the rest of the line
        if sync_at + line_len + timing.sync > samples.len() {
            return false;
        }

        let edge = find_sync_end(samples, sync_at, timing.sync, timing.porch, sample_rate);
        let line_end = edge + line_len - timing.sync;
        if line_end > samples.len() {
            return false;
        }

        let luma_at = edge + timing.porch;
        let separator_at = luma_at + timing.luma;
        let chroma_at = separator_at + timing.separator + timing.back_porch;

        let luma = segment_values(&samples[luma_at..separator_at], IMAGE_WIDTH, sample_rate);
        let separator = estimate_frequency(
            &samples[separator_at..separator_at + timing.separator],
            sample_rate,
        );
        let chroma = segment_values(
            &samples[chroma_at..chroma_at + timing.chroma],
            CHROMA_WIDTH,
            sample_rate,
        );

        if self.state == DecoderState::Ready {
            self.enter(DecoderState::Lines);
        }

        let carries_cr = carries_red_chroma(separator, self.line);
        self.render_line(&luma, &chroma, carries_cr);
        self.buffer.consume(line_end);
        self.line += 1;

        if self.line >= IMAGE_HEIGHT {
            self.completed = true;
            self.buffer.clear();
            info!("Image complete: {} lines decoded", self.line);
        }
        true
    }

    fn render_line(&mut self, luma: &[u8], chroma: &[u8], carries_cr: bool) {
        let history = if carries_cr {
            &mut self.last_cr
        } else {
            &mut self.last_cb
        };
        history.copy_from_slice(chroma);

        let row = self.image.row_mut(self.line);
        for (x, (pixel, &y)) in row.iter_mut().zip(luma).enumerate() {
            let c = (x / 2).min(CHROMA_WIDTH - 1);
            *pixel = ycbcr_to_argb(y, self.last_cb[c], self.last_cr[c]);
        }
    }
}

impl Default for Robot36Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SAMPLE_RATE)
    }
}

/// A received VIS byte selects Robot36 when it is 0x28 with an even parity
/// eighth bit, or 0x08 with or without its parity bit
fn is_robot36_vis(byte: u8) -> bool {
    match byte & 0x7F {
        ROBOT36_VIS_CODE => byte.count_ones() % 2 == 0,
        ROBOT36_ALT_VIS_CODE => true,
        _ => false,
    }
}

/// First offset, in steps of a third of the window, where 1200 Hz dominates 1500 Hz
fn find_sync(samples: &[f32], window: usize, sample_rate: f32) -> Option<usize> {
    let step = if window > 3 { window / 3 } else { 1 };

    (0..)
        .step_by(step)
        .take_while(|&i| i + window <= samples.len())
        .find(|&i| {
            let w = &samples[i..i + window];
            goertzel(w, SYNC_FREQ, sample_rate) > goertzel(w, PORCH_FREQ, sample_rate)
        })
}

/// Sample index where the sync pulse found at `sync_at` hands over to the porch
///
/// Candidate edges are scored by how much 1200 Hz dominates the sync-length
/// window before them and 1500 Hz dominates the porch-length window after
/// them. The sync may have started before the queue head, so the window
/// before an early candidate is shortened rather than rejected.
fn find_sync_end(
    samples: &[f32],
    sync_at: usize,
    sync_len: usize,
    porch_len: usize,
    sample_rate: f32,
) -> usize {
    let step = if sync_len > 3 { sync_len / 3 } else { 1 };
    let first = sync_at + sync_len - step;
    let last = (sync_at + 2 * sync_len).min(samples.len().saturating_sub(porch_len));

    let score = |edge: usize| {
        let sync = &samples[edge.saturating_sub(sync_len)..edge];
        let porch = &samples[edge..edge + porch_len];
        goertzel(sync, SYNC_FREQ, sample_rate) - goertzel(sync, PORCH_FREQ, sample_rate)
            + goertzel(porch, PORCH_FREQ, sample_rate)
            - goertzel(porch, SYNC_FREQ, sample_rate)
    };

    let mut best = (sync_at + sync_len, f32::MIN);
    for edge in (first..=last).step_by(EDGE_SEARCH_STEP) {
        let s = score(edge);
        if s > best.1 {
            best = (edge, s);
        }
    }
    best.0
}

/// Even lines carry Cr; a separator near 1900 Hz leaves the line index to decide
fn carries_red_chroma(separator_freq: f32, line: usize) -> bool {
    if (separator_freq - SEPARATOR_FREQ).abs() <= SEPARATOR_TOLERANCE_HZ {
        line % 2 == 0
    } else {
        separator_freq < SEPARATOR_FREQ
    }
}

fn segment_values(segment: &[f32], columns: usize, sample_rate: f32) -> Vec<u8> {
    column_frequencies(segment, columns, sample_rate)
        .into_iter()
        .map(freq_to_value)
        .collect()
}

/// Estimated tone frequency of each of `columns` equal spans of `segment`
///
/// Spans shorter than [`MIN_ANALYSIS_WINDOW`] are grouped into strides of
/// columns. Each group estimate is the mean over [`GROUP_WINDOW`]s stepped
/// [`PHASE_STEP`] samples apart around the group centre, and per-column
/// values are interpolated between group centres.
fn column_frequencies(segment: &[f32], columns: usize, sample_rate: f32) -> Vec<f32> {
    let span = segment.len();
    if columns == 0 || span == 0 {
        return vec![0.0; columns];
    }

    let bound = |x: usize| x * span / columns;
    let per_column = span / columns;

    if per_column >= MIN_ANALYSIS_WINDOW {
        return (0..columns)
            .map(|x| estimate_frequency(&segment[bound(x)..bound(x + 1)], sample_rate))
            .collect();
    }

    let stride = MIN_ANALYSIS_WINDOW.div_ceil(per_column.max(1));

    let mut centres = Vec::with_capacity(columns / stride + 1);
    let mut estimates = Vec::with_capacity(columns / stride + 1);
    for first in (0..columns).step_by(stride) {
        let last = (first + stride).min(columns);
        let (start, end) = (bound(first), bound(last));

        let len = (end - start).max(GROUP_WINDOW).min(span);
        let centred = ((start + end) / 2) as isize - (len / 2) as isize;
        let latest = (span - len) as isize;

        // Windows at the segment edges are clamped inwards
        let total: f32 = (-PHASE_OFFSETS..=PHASE_OFFSETS)
            .map(|k| {
                let from = (centred + k * PHASE_STEP).clamp(0, latest) as usize;
                estimate_frequency(&segment[from..from + len], sample_rate)
            })
            .sum();

        estimates.push(total / (2 * PHASE_OFFSETS + 1) as f32);
        centres.push((first + last) as f32 / 2.0);
    }

    (0..columns)
        .map(|x| interpolate(&centres, &estimates, x as f32 + 0.5))
        .collect()
}

/// Piecewise-linear lookup, held constant beyond the first and last points
fn interpolate(positions: &[f32], values: &[f32], at: f32) -> f32 {
    let above = positions.partition_point(|&p| p <= at);
    match above {
        0 => values[0],
        n if n == positions.len() => values[n - 1],
        n => {
            let (x0, x1) = (positions[n - 1], positions[n]);
            let t = (at - x0) / (x1 - x0);
            values[n - 1] + (values[n] - values[n - 1]) * t
        }
    }
}
