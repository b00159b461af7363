use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{
    CoordinateSystem, GlyphRasterConfig, HorizontalAlign, Layout, LayoutSettings, TextStyle,
    WrapStyle,
};
use fontdue::Font;
use parking_lot::Mutex;
use tiny_skia::{Color, Pixmap};

use crate::director::StateHandle;
use crate::phase::{difficulty_label, Phase, PresentationState};
use crate::schema::{QuizContent, ReelManifest, Resolution};
use crate::surface::{FrameSample, RenderSurface};

// Palette lifted from the reel's house style.
const TEXT_WHITE: [u8; 4] = [0xff, 0xff, 0xff, 0xff];
const TEXT_BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xff];
const SHADOW_BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xff];
const CARD_WHITE: [u8; 4] = [0xff, 0xff, 0xff, 0xcc];
const CARD_GOLD: [u8; 4] = [0xff, 0xc1, 0x07, 0xff];
const CARD_GOLD_BORDER: [u8; 4] = [0xff, 0xd7, 0x00, 0xff];

const DIFFICULTY_COLORS: [[u8; 4]; 4] = [
    [0x4c, 0xaf, 0x50, 0xff], // Simple
    [0xff, 0xc1, 0x07, 0xff], // Medium
    [0xff, 0x57, 0x22, 0xff], // Expert
    [0x9c, 0x27, 0xb0, 0xff], // Genius
];

/// Live render surface for the quiz presentation: composites the current
/// `PresentationState` over a pre-scrimmed backdrop on every sample.
///
/// All coordinates below are authored against the 540-wide reference layout
/// and scaled uniformly to the configured resolution.
pub struct QuizSurface {
    content: QuizContent,
    state: StateHandle,
    resolution: Resolution,
    backdrop: Pixmap,
    painter: Mutex<TextPainter>,
    scale: f32,
}

impl QuizSurface {
    pub fn new(manifest: &ReelManifest, content: QuizContent, state: StateHandle) -> Result<Self> {
        let resolution = manifest.resolution;
        let backdrop = build_backdrop(Path::new(&content.background_image), resolution)?;
        let painter = TextPainter::new(&manifest.font)?;
        Ok(Self {
            content,
            state,
            resolution,
            backdrop,
            painter: Mutex::new(painter),
            scale: resolution.width as f32 / 540.0,
        })
    }

    fn px(&self, reference: f32) -> f32 {
        reference * self.scale
    }

    fn draw_state(&self, pixmap: &mut Pixmap, state: &PresentationState) -> Result<()> {
        let width = self.resolution.width;
        let height = self.resolution.height;
        let mut painter = self.painter.lock();

        // Topic, top-right.
        painter.draw_block(
            pixmap.data_mut(),
            width,
            height,
            &TextBlock {
                text: &self.content.topic,
                size: self.px(40.0),
                color: TEXT_WHITE,
                shadow: Some(self.px(3.0)),
                x: self.px(240.0),
                y: self.px(30.0),
                max_width: self.px(270.0),
                align: HorizontalAlign::Right,
            },
        );

        let is_outro = state.phase == Phase::Outro;
        let mut content_top = self.px(330.0);
        if !is_outro {
            let main_question = self.content.main_question.to_uppercase();
            let block = TextBlock {
                text: &main_question,
                size: self.px(44.0),
                color: TEXT_WHITE,
                shadow: Some(self.px(4.0)),
                x: self.px(30.0),
                y: self.px(210.0),
                max_width: self.px(480.0),
                align: HorizontalAlign::Center,
            };
            let main_bottom = block.y + painter.measure_height(&block);
            content_top = content_top.max(main_bottom + self.px(10.0));
            painter.draw_block(pixmap.data_mut(), width, height, &block);
        }

        if !state.banner_text.is_empty() {
            let size = if is_outro { self.px(54.0) } else { self.px(108.0) };
            let block = TextBlock {
                text: state.banner_text,
                size,
                color: TEXT_WHITE,
                shadow: Some(self.px(4.0)),
                x: self.px(20.0),
                y: 0.0,
                max_width: self.px(500.0),
                align: HorizontalAlign::Center,
            };
            let banner_height = painter.measure_height(&block);
            let centered = TextBlock {
                y: (height as f32 - banner_height) / 2.0,
                ..block
            };
            painter.draw_block(pixmap.data_mut(), width, height, &centered);
            return Ok(());
        }

        if state.question_index < 0 {
            return Ok(());
        }
        let index = state.question_index as usize;

        let card_x = self.px(27.0);
        let card_width = self.px(486.0);
        let text_pad = self.px(25.0);

        if !state.revealed {
            // Question card.
            let question = &self.content.questions[index];
            let block = TextBlock {
                text: question,
                size: self.px(44.0),
                color: TEXT_BLACK,
                shadow: None,
                x: card_x + text_pad,
                y: content_top + text_pad,
                max_width: card_width - 2.0 * text_pad,
                align: HorizontalAlign::Center,
            };
            let text_height = painter.measure_height(&block);
            fill_rect(
                pixmap,
                card_x,
                content_top,
                card_width,
                text_height + 2.0 * text_pad,
                CARD_WHITE,
            );
            painter.draw_block(pixmap.data_mut(), width, height, &block);

            // Difficulty badge under the card.
            let label = difficulty_label(index);
            let badge = TextBlock {
                text: label,
                size: self.px(24.0),
                color: TEXT_WHITE,
                shadow: None,
                x: self.px(195.0),
                y: content_top + text_height + 2.0 * text_pad + self.px(10.0),
                max_width: self.px(150.0),
                align: HorizontalAlign::Center,
            };
            let badge_height = painter.measure_height(&badge);
            fill_rect(
                pixmap,
                badge.x - self.px(6.0),
                badge.y - self.px(6.0),
                badge.max_width + self.px(12.0),
                badge_height + self.px(12.0),
                DIFFICULTY_COLORS[index / 2],
            );
            painter.draw_block(pixmap.data_mut(), width, height, &badge);

            // Countdown digit.
            let countdown = state.countdown.to_string();
            painter.draw_block(
                pixmap.data_mut(),
                width,
                height,
                &TextBlock {
                    text: &countdown,
                    size: self.px(144.0),
                    color: TEXT_WHITE,
                    shadow: Some(self.px(4.0)),
                    x: self.px(30.0),
                    y: badge.y + badge_height + self.px(30.0),
                    max_width: self.px(480.0),
                    align: HorizontalAlign::Center,
                },
            );
        } else {
            // Answer card, gold.
            let answer = &self.content.answers[index];
            let block = TextBlock {
                text: answer,
                size: self.px(44.0),
                color: TEXT_BLACK,
                shadow: None,
                x: card_x + text_pad,
                y: content_top + text_pad,
                max_width: card_width - 2.0 * text_pad,
                align: HorizontalAlign::Center,
            };
            let text_height = painter.measure_height(&block);
            let card_height = text_height + 2.0 * text_pad;
            let border = self.px(3.0);
            fill_rect(
                pixmap,
                card_x - border,
                content_top - border,
                card_width + 2.0 * border,
                card_height + 2.0 * border,
                CARD_GOLD_BORDER,
            );
            fill_rect(pixmap, card_x, content_top, card_width, card_height, CARD_GOLD);
            painter.draw_block(pixmap.data_mut(), width, height, &block);
        }

        Ok(())
    }
}

impl RenderSurface for QuizSurface {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn sample(&self) -> Result<FrameSample> {
        let snapshot = self.state.lock().clone();
        let mut pixmap = self.backdrop.clone();
        self.draw_state(&mut pixmap, &snapshot)?;
        Ok(FrameSample {
            width: self.resolution.width,
            height: self.resolution.height,
            rgba: pixmap.take(),
        })
    }
}

/// Cover-scales the background image to the reel resolution and applies the
/// 30% black scrim, once; every sample starts from a clone of this.
fn build_backdrop(image_path: &Path, resolution: Resolution) -> Result<Pixmap> {
    let image = image::open(image_path)
        .with_context(|| format!("failed to load background image {}", image_path.display()))?;
    let scaled = image
        .resize_to_fill(
            resolution.width,
            resolution.height,
            image::imageops::FilterType::Triangle,
        )
        .into_rgba8();

    let mut pixmap = Pixmap::new(resolution.width, resolution.height)
        .ok_or_else(|| anyhow!("invalid reel resolution"))?;
    let data = pixmap.data_mut();
    for (index, pixel) in scaled.pixels().enumerate() {
        let base = index * 4;
        // 30% black overlay, output fully opaque.
        data[base] = (u16::from(pixel[0]) * 7 / 10) as u8;
        data[base + 1] = (u16::from(pixel[1]) * 7 / 10) as u8;
        data[base + 2] = (u16::from(pixel[2]) * 7 / 10) as u8;
        data[base + 3] = 255;
    }
    Ok(pixmap)
}

fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, width: f32, height: f32, color: [u8; 4]) {
    let Some(rect) = tiny_skia::Rect::from_xywh(x, y, width, height) else {
        return;
    };
    let mut paint = tiny_skia::Paint::default();
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], color[3]));
    pixmap.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);
}

struct TextBlock<'a> {
    text: &'a str,
    size: f32,
    color: [u8; 4],
    /// Drop-shadow offset in pixels, if any.
    shadow: Option<f32>,
    x: f32,
    y: f32,
    max_width: f32,
    align: HorizontalAlign,
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

struct TextPainter {
    font: Font,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    fn new(font_path: &Path) -> Result<Self> {
        let font_bytes = fs::read(font_path)
            .with_context(|| format!("failed to read font {}", font_path.display()))?;
        let font = Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font {}: {error}", font_path.display()))?;
        Ok(Self {
            font,
            glyph_cache: HashMap::new(),
        })
    }

    fn layout_for(&self, block: &TextBlock<'_>, x: f32, y: f32) -> Layout {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y,
            max_width: Some(block.max_width),
            max_height: None,
            horizontal_align: block.align,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.2,
            wrap_style: WrapStyle::Word,
            wrap_hard_breaks: true,
        });
        layout.append(&[&self.font], &TextStyle::new(block.text, block.size, 0));
        layout
    }

    fn measure_height(&self, block: &TextBlock<'_>) -> f32 {
        self.layout_for(block, 0.0, 0.0).height()
    }

    fn draw_block(&mut self, frame: &mut [u8], width: u32, height: u32, block: &TextBlock<'_>) {
        if let Some(offset) = block.shadow {
            self.draw_at(frame, width, height, block, offset, offset, SHADOW_BLACK);
        }
        self.draw_at(frame, width, height, block, 0.0, 0.0, block.color);
    }

    fn draw_at(
        &mut self,
        frame: &mut [u8],
        width: u32,
        height: u32,
        block: &TextBlock<'_>,
        dx: f32,
        dy: f32,
        color: [u8; 4],
    ) {
        let layout = self.layout_for(block, block.x + dx, block.y + dy);
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = self.font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });

            blend_glyph(
                frame,
                width,
                height,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                color,
            );
        }
    }
}

fn blend_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = ((py as u32 * frame_width + px as u32) * 4) as usize;
            blend_pixel(frame, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

fn blend_pixel(frame: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }

    let inv_alpha = 255_u16.saturating_sub(alpha);

    for channel in 0..3 {
        let dst = u16::from(frame[idx + channel]);
        let src_c = u16::from(src[channel]);
        frame[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    frame[idx + 3] = 255;
}
