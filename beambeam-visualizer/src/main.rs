use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use beambeam_common::{load_snapshots, BunchSnapshot, CentroidSample, Snapshot};
use clap::Parser;
use env_logger::Builder;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin, .msgpack or .json)
    #[arg(short, long)]
    input: PathBuf,

    /// Output animation file path (.gif)
    #[arg(short, long, default_value = "beam_beam.gif")]
    output: PathBuf,

    /// Width of the output animation in pixels
    #[arg(long, default_value_t = 1400)]
    width: u32,

    /// Height of the output animation in pixels
    #[arg(long, default_value_t = 1000)]
    height: u32,

    /// Frames per second for the output animation
    #[arg(long, default_value_t = 20)]
    fps: u32,

    /// Render every Nth snapshot
    #[arg(long, default_value_t = 1)]
    stride: usize,

    /// Background color name (black, white, gray)
    #[arg(long, default_value = "white")]
    bg_color: String,

    /// Chunk size for parallel processing
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,

    /// TrueType/OpenType font for panel titles and the step counter.
    /// Without it the frames carry no text.
    #[arg(long)]
    font: Option<PathBuf>,
}

// Color definitions for named colors (RGBA format)
const COLOR_MAP: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("gray", [128, 128, 128, 255]),
];

const ELECTRON: Rgba<u8> = Rgba([40, 70, 230, 255]);
const POSITRON: Rgba<u8> = Rgba([225, 40, 40, 255]);
const OVERLAP: Rgba<u8> = Rgba([150, 60, 170, 255]);
const GUIDE: Rgba<u8> = Rgba([170, 170, 170, 255]);

// Axis limits of the four panels
const SCATTER_Z: (f64, f64) = (-60.0, 60.0);
const VERTICAL: (f64, f64) = (-10.0, 10.0);
const HIST_BINS: usize = 40;
const HIST_COUNT: (f64, f64) = (0.0, 200.0);
const PHASE_VY: (f64, f64) = (-0.5, 0.5);
const CENTROID_Y: (f64, f64) = (-2.0, 2.0);

const TITLE_SCALE: f32 = 16.0;
const LABEL_SCALE: f32 = 14.0;

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta}) {msg}";

// Struct to represent a rendered animation frame
struct RenderedFrame {
    index: usize,
    image: RgbaImage,
}

/// Pixel rectangle of one plot with its data ranges.
#[derive(Debug, Clone, Copy)]
struct Panel {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Panel {
    /// Maps a data point to pixels; `None` when it falls outside the axes.
    fn to_px(&self, x: f64, y: f64) -> Option<(f32, f32)> {
        let fx = (x - self.x_range.0) / (self.x_range.1 - self.x_range.0);
        let fy = (y - self.y_range.0) / (self.y_range.1 - self.y_range.0);
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        let px = self.left as f64 + fx * (self.width - 1) as f64;
        // Flip Y (data origin is bottom-left)
        let py = self.top as f64 + (1.0 - fy) * (self.height - 1) as f64;
        Some((px as f32, py as f32))
    }

    /// Like `to_px`, but clamps to the panel edge instead of rejecting.
    fn to_px_clamped(&self, x: f64, y: f64) -> (f32, f32) {
        let x = x.clamp(self.x_range.0, self.x_range.1);
        let y = y.clamp(self.y_range.0, self.y_range.1);
        self.to_px(x, y).unwrap_or((self.left as f32, self.top as f32))
    }

    fn frame(&self) -> Rect {
        Rect::at(self.left, self.top).of_size(self.width, self.height)
    }
}

/// Splits the canvas into the 2x2 grid of plots.
fn layout(width: u32, height: u32) -> [Panel; 4] {
    let margin = 30i32;
    let cell_w = width as i32 / 2;
    let cell_h = height as i32 / 2;
    let w = (cell_w - 2 * margin).max(10) as u32;
    let h = (cell_h - 2 * margin).max(10) as u32;
    let at = |col: i32, row: i32, x_range, y_range| Panel {
        left: col * cell_w + margin,
        top: row * cell_h + margin,
        width: w,
        height: h,
        x_range,
        y_range,
    };
    [
        at(0, 0, SCATTER_Z, VERTICAL),
        at(1, 0, VERTICAL, HIST_COUNT),
        at(0, 1, VERTICAL, PHASE_VY),
        at(1, 1, (0.0, 1.0), CENTROID_Y),
    ]
}

/// Parse a color name to RGBA values
fn parse_color(color_name: &str) -> [u8; 4] {
    for &(name, color) in COLOR_MAP {
        if name.eq_ignore_ascii_case(color_name) {
            return color;
        }
    }
    // Default to white if color not found
    warn!("Color '{}' not recognized, using white.", color_name);
    [255, 255, 255, 255]
}

fn draw_dashed_line(image: &mut RgbaImage, start: (f32, f32), end: (f32, f32), color: Rgba<u8>) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1.0 {
        return;
    }
    let dash = 6.0;
    let mut t = 0.0;
    while t < length {
        let t_end = (t + dash).min(length);
        let a = (start.0 + dx * t / length, start.1 + dy * t / length);
        let b = (start.0 + dx * t_end / length, start.1 + dy * t_end / length);
        draw_line_segment_mut(image, a, b, color);
        t += 2.0 * dash;
    }
}

/// Frame and dashed zero axes of a panel.
fn draw_axes(image: &mut RgbaImage, panel: &Panel, axis_color: Rgba<u8>) {
    draw_hollow_rect_mut(image, panel.frame(), axis_color);
    if let (Some(a), Some(b)) = (panel.to_px(panel.x_range.0, 0.0), panel.to_px(panel.x_range.1, 0.0)) {
        draw_dashed_line(image, a, b, GUIDE);
    }
    if let (Some(a), Some(b)) = (panel.to_px(0.0, panel.y_range.0), panel.to_px(0.0, panel.y_range.1)) {
        draw_dashed_line(image, a, b, GUIDE);
    }
}

fn draw_scatter(image: &mut RgbaImage, panel: &Panel, points: &[(f64, f64)], radius: i32, color: Rgba<u8>) {
    for &(x, y) in points {
        if let Some((px, py)) = panel.to_px(x, y) {
            draw_filled_circle_mut(image, (px.round() as i32, py.round() as i32), radius, color);
        }
    }
}

fn draw_histogram(image: &mut RgbaImage, panel: &Panel, electrons: &BunchSnapshot, positrons: &BunchSnapshot) {
    let (lo, hi) = panel.x_range;
    let counts_e = electrons.vertical_histogram(HIST_BINS, lo, hi);
    let counts_p = positrons.vertical_histogram(HIST_BINS, lo, hi);
    let bin_width = (hi - lo) / HIST_BINS as f64;

    for (bin, (&ce, &cp)) in counts_e.iter().zip(&counts_p).enumerate() {
        let x0 = lo + bin as f64 * bin_width;
        let x1 = x0 + bin_width;
        let shared = ce.min(cp);
        // Where both bunches populate a bin the common part is drawn mixed.
        let layers = [
            (0, shared, OVERLAP),
            (shared, ce, ELECTRON),
            (shared, cp, POSITRON),
        ];
        for (from, to, color) in layers {
            if to <= from {
                continue;
            }
            let (left, top) = panel.to_px_clamped(x0, to as f64);
            let (right, bottom) = panel.to_px_clamped(x1, from as f64);
            let w = (right - left).round().max(1.0) as u32;
            let h = (bottom - top).round() as u32;
            if h > 0 {
                draw_filled_rect_mut(image, Rect::at(left.round() as i32, top.round() as i32).of_size(w, h), color);
            }
        }
    }
}

fn draw_centroid_history(image: &mut RgbaImage, panel: &Panel, history: &[CentroidSample], steps_per_collision: u32) {
    let span = steps_per_collision.max(1) as f64;
    let to_x = |step: u32| step as f64 / span;
    for pair in history.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let segments = [
            (a.electron_centroid, b.electron_centroid, ELECTRON),
            (a.positron_centroid, b.positron_centroid, POSITRON),
        ];
        for (ya, yb, color) in segments {
            let start = panel.to_px_clamped(to_x(a.step), ya);
            let end = panel.to_px_clamped(to_x(b.step), yb);
            draw_line_segment_mut(image, start, end, color);
        }
    }
}

/// Thin bar above the scatter panel showing progress through the current collision.
fn draw_cycle_bar(image: &mut RgbaImage, panel: &Panel, snapshot: &Snapshot) {
    let fraction = snapshot.step_in_cycle as f64 / snapshot.steps_per_collision.max(1) as f64;
    let width = ((panel.width as f64) * fraction).round() as u32;
    if width > 0 && panel.top >= 8 {
        draw_filled_rect_mut(image, Rect::at(panel.left, panel.top - 8).of_size(width, 4), GUIDE);
    }
}

/// Reads a font file for the frame labels.
fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read font file '{}'", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("Invalid font file '{}': {}", path.display(), e))
}

/// Panel titles, the step counter and the run parameters.
fn draw_labels(
    image: &mut RgbaImage,
    font: &FontVec,
    panels: &[Panel; 4],
    snapshot: &Snapshot,
    text_color: Rgba<u8>,
) {
    let [scatter, hist, phase, centroid] = panels;
    let title = PxScale::from(TITLE_SCALE);
    let label = PxScale::from(LABEL_SCALE);

    let hist_title = format!(
        "Vertical Distribution (rms {:.2} / {:.2})",
        snapshot.electrons.rms_size(),
        snapshot.positrons.rms_size()
    );
    let titles = [
        (scatter, "Beam-Beam Collision"),
        (hist, hist_title.as_str()),
        (phase, "Phase Space (Central Slice)"),
        (centroid, "Bunch Centroid Evolution"),
    ];
    for (panel, text) in titles {
        // Above the cycle bar
        draw_text_mut(image, text_color, panel.left, panel.top - 28, title, font, text);
    }

    let counter = format!(
        "Collision #{}, Step: {}/{}",
        snapshot.collision, snapshot.step_in_cycle, snapshot.steps_per_collision
    );
    draw_text_mut(image, text_color, scatter.left + 6, scatter.top + 6, label, font, &counter);

    let params = format!("DY_KICK = {}  Y_OFFSET = {}", snapshot.kick_coefficient, snapshot.vertical_separation);
    let (text_w, _) = text_size(label, font, &params);
    let right = scatter.left + scatter.width as i32 - 6;
    draw_text_mut(image, text_color, right - text_w as i32, scatter.top + 6, label, font, &params);
}

/// Draw one snapshot frame
fn draw_frame(
    snapshot: &Snapshot,
    history: &[CentroidSample],
    frame_index: usize,
    width: u32,
    height: u32,
    bg_color: [u8; 4],
    font: Option<&FontVec>,
) -> RenderedFrame {
    let mut image: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba(bg_color));

    // Choose axis color based on background luminance
    let bg_luminance = 0.299 * bg_color[0] as f32 + 0.587 * bg_color[1] as f32 + 0.114 * bg_color[2] as f32;
    let axis_color = if bg_luminance > 128.0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) };

    let panels = layout(width, height);
    let [scatter, hist, phase, centroid] = panels;
    for panel in [&scatter, &hist, &phase, &centroid] {
        draw_axes(&mut image, panel, axis_color);
    }

    draw_cycle_bar(&mut image, &scatter, snapshot);
    draw_scatter(&mut image, &scatter, &snapshot.electrons.points(), 1, ELECTRON);
    draw_scatter(&mut image, &scatter, &snapshot.positrons.points(), 1, POSITRON);

    draw_histogram(&mut image, &hist, &snapshot.electrons, &snapshot.positrons);

    let central_slice = snapshot.electrons.slice_count / 2;
    draw_scatter(&mut image, &phase, &snapshot.electrons.phase_space(central_slice), 3, ELECTRON);
    draw_scatter(&mut image, &phase, &snapshot.positrons.phase_space(central_slice), 3, POSITRON);

    draw_centroid_history(&mut image, &centroid, history, snapshot.steps_per_collision);

    if let Some(font) = font {
        draw_labels(&mut image, font, &panels, snapshot, axis_color);
    }

    RenderedFrame {
        index: frame_index,
        image,
    }
}

fn centroid_points(snapshots: &[Snapshot]) -> Vec<CentroidSample> {
    snapshots.iter().map(CentroidSample::from).collect()
}

/// Centroid history of the collision containing `index`, up to and including it.
/// The history restarts at every collision.
fn history_until(points: &[CentroidSample], index: usize) -> &[CentroidSample] {
    let collision = points[index].collision;
    let start = points[..=index]
        .iter()
        .rposition(|p| p.collision != collision)
        .map_or(0, |i| i + 1);
    &points[start..=index]
}

fn main() -> Result<()> {
    // Initialize logger
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    let start_time = Instant::now();
    info!("Starting Beam-Beam Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output animation: {}", args.output.display());
    info!("Animation dimensions: {}x{} @ {} fps", args.width, args.height, args.fps);

    if args.width < 200 || args.height < 200 {
        anyhow::bail!("Output must be at least 200x200 pixels, got {}x{}.", args.width, args.height);
    }
    if args.fps == 0 || args.stride == 0 || args.chunk_size == 0 {
        anyhow::bail!("fps, stride and chunk-size must all be greater than 0.");
    }
    let bg_color = parse_color(&args.bg_color);
    let font = match &args.font {
        Some(path) => {
            info!("Using font: {}", path.display());
            Some(load_font(path)?)
        }
        None => {
            info!("No font given, frames are rendered without text.");
            None
        }
    };

    let snapshots = load_snapshots(&args.input)?;
    if snapshots.is_empty() {
        anyhow::bail!("No snapshots found in {}", args.input.display());
    }
    info!("Found {} snapshots in the file", snapshots.len());

    let first = &snapshots[0];
    info!("First snapshot details:");
    info!("  Collision #{} step {}/{}", first.collision, first.step_in_cycle, first.steps_per_collision);
    info!(
        "  Bunch shape: {} slices x {} particles",
        first.electrons.slice_count, first.electrons.particles_per_slice
    );
    info!(
        "  Vertical rms size: {:.4} / {:.4}",
        first.electrons.rms_size(),
        first.positrons.rms_size()
    );

    let points = centroid_points(&snapshots);
    let selected: Vec<usize> = (0..snapshots.len()).step_by(args.stride).collect();
    info!("Rendering {} frames (stride {})...", selected.len(), args.stride);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create output file '{}'", args.output.display()))?;
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), 10);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(1000, args.fps);

    let progress_bar = ProgressBar::new(selected.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)?
            .progress_chars("#>-"),
    );

    for chunk in selected.chunks(args.chunk_size) {
        // Render in parallel, encode in order
        let mut frames: Vec<RenderedFrame> = chunk
            .par_iter()
            .map(|&idx| {
                let frame = draw_frame(
                    &snapshots[idx],
                    history_until(&points, idx),
                    idx,
                    args.width,
                    args.height,
                    bg_color,
                    font.as_ref(),
                );
                progress_bar.inc(1);
                frame
            })
            .collect();
        frames.sort_by_key(|f| f.index);

        for frame in frames {
            encoder
                .encode_frame(image::Frame::from_parts(frame.image, 0, 0, delay))
                .with_context(|| format!("Failed to encode frame {}", frame.index))?;
        }
    }
    progress_bar.finish_with_message("Rendering complete");

    info!(
        "Animation with {} frames written in {:.2} s",
        selected.len(),
        start_time.elapsed().as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}
