use super::Engine2d;
use crate::{
    gpu::vram::Vram,
    utils::OwnedBytesCellPtr,
};

/// Scanline pixel: `color` is either raw BGR555 or, when `attr` bit 2 is
/// set, an unpacked 6-bit-per-channel color with 5-bit alpha in the top
/// byte. `attr` orders candidates (lower wins) and carries the blend
/// state:
///
/// bit 0: blend-top eligible, bit 1: forced blend (translucent OBJ / 3D),
/// bit 2: color already unpacked, bit 8: blend-bottom eligible, bits
/// 12-15: bitmap-OBJ alpha, bits 16-23: OBJ index, bits 24-27: layer,
/// bits 28-31: priority.
#[derive(Clone, Copy)]
pub(crate) struct Pixel {
    pub color: u32,
    pub attr: u32,
}

impl Default for Pixel {
    fn default() -> Self {
        Pixel {
            color: 0,
            attr: 0x80 << 24,
        }
    }
}

#[inline]
const fn rgb6(r: u32, g: u32, b: u32, a: u32) -> u32 {
    r | g << 8 | b << 16 | a << 24
}

#[inline]
pub(crate) fn unpack_bgr555(color: u16) -> u32 {
    let r = (color as u32 & 0x1F) << 1;
    let g = (color as u32 >> 5 & 0x1F) << 1;
    let b = (color as u32 >> 10 & 0x1F) << 1;
    rgb6(r, g, b, 0x1F)
}

#[inline]
pub(crate) fn pack_to_bgr888(color: u32) -> u32 {
    let r = (color & 0x3F) * 259 + 33 >> 6;
    let g = (color >> 8 & 0x3F) * 259 + 33 >> 6;
    let b = (color >> 16 & 0x3F) * 259 + 33 >> 6;
    b << 16 | g << 8 | r
}

struct Layers<'a> {
    vram: &'a Vram,
    palette: &'a OwnedBytesCellPtr<0x800>,
    oam: &'a OwnedBytesCellPtr<0x800>,
    line_3d: &'a [u32; 256],
}

impl Layers<'_> {
    fn palette_base(&self, is_a: bool) -> usize {
        if is_a {
            0
        } else {
            0x400
        }
    }

    fn bg_color(&self, engine: &Engine2d, color_num: u32) -> u16 {
        self.palette
            .read_le(self.palette_base(engine.is_a) + 2 * color_num as usize)
    }

    fn bg_color_16(&self, engine: &Engine2d, palette_num: u32, color_num: u32) -> u16 {
        self.palette.read_le(
            self.palette_base(engine.is_a) + ((palette_num << 5) + (color_num << 1)) as usize,
        )
    }

    fn bg_color_256_ext(
        &self,
        engine: &Engine2d,
        slot: u32,
        palette_num: u32,
        color_num: u32,
    ) -> u16 {
        let offset = (slot << 13) + (palette_num << 9) + (color_num << 1);
        if engine.is_a {
            self.vram.read_a_bg_extpal(offset)
        } else {
            self.vram.read_b_bg_extpal(offset)
        }
    }

    fn obj_color(&self, engine: &Engine2d, color_num: u32) -> u16 {
        self.palette
            .read_le(self.palette_base(engine.is_a) + 0x200 + 2 * color_num as usize)
    }

    fn obj_color_16(&self, engine: &Engine2d, palette_num: u32, color_num: u32) -> u16 {
        self.palette.read_le(
            self.palette_base(engine.is_a)
                + 0x200
                + ((palette_num << 5) + (color_num << 1)) as usize,
        )
    }

    fn obj_color_256_ext(&self, engine: &Engine2d, palette_num: u32, color_num: u32) -> u16 {
        let offset = (palette_num << 9) + (color_num << 1);
        if engine.is_a {
            self.vram.read_a_obj_extpal(offset)
        } else {
            self.vram.read_b_obj_extpal(offset)
        }
    }

    fn bg_data<T: crate::utils::MemValue>(&self, engine: &Engine2d, offset: u32) -> T {
        if engine.is_a {
            self.vram.read_a_bg(offset)
        } else {
            self.vram.read_b_bg(offset)
        }
    }

    fn obj_data<T: crate::utils::MemValue>(&self, engine: &Engine2d, offset: u32) -> T {
        if engine.is_a {
            self.vram.read_a_obj(offset)
        } else {
            self.vram.read_b_obj(offset)
        }
    }

    fn oam_halfword(&self, engine: &Engine2d, offset: u32) -> u16 {
        self.oam
            .read_le(self.palette_base(engine.is_a) + (offset & 0x3FE) as usize)
    }
}

#[inline]
fn layer_in_window(engine: &Engine2d, layer: u32, x: usize) -> bool {
    engine.window_bits_line[x] & 1 << layer != 0
}

pub(in super::super) fn render_scanline(
    engine: &mut Engine2d,
    y: u32,
    enabled: bool,
    vram: &Vram,
    palette: &OwnedBytesCellPtr<0x800>,
    oam: &OwnedBytesCellPtr<0x800>,
    line_3d: &[u32; 256],
    fb_line: &mut [u32],
) {
    engine.update_line_regs(y);

    let layers = Layers {
        vram,
        palette,
        oam,
        line_3d,
    };

    if enabled {
        render_output_line(engine, y, &layers);
        for (out, &color) in fb_line.iter_mut().zip(engine.output_line.iter()) {
            *out = pack_to_bgr888(color);
        }
    } else {
        fb_line.fill(0x00FF_FFFF);
    }

    engine.advance_line_regs();
}

fn render_output_line(engine: &mut Engine2d, y: u32, layers: &Layers) {
    render_gfx_line(engine, y, layers);

    match engine.control.display_mode() {
        0 => engine.output_line.fill(rgb6(0x3F, 0x3F, 0x3F, 0x1F)),
        1 => engine.output_line = engine.gfx_line,
        2 => {
            // VRAM display, engine A only
            let base = 0x2_0000 * engine.control.vram_block() as u32 + 512 * y;
            for (x, out) in engine.output_line.iter_mut().enumerate() {
                *out = unpack_bgr555(layers.vram.read_lcdc(base + 2 * x as u32));
            }
        }
        _ => {
            // Main-memory FIFO display is not wired up
            engine.output_line.fill(rgb6(0, 0, 0, 0x1F));
        }
    }

    if engine.capture_active {
        capture_display(engine, y, layers);
    }

    apply_master_brightness(engine);
}

fn render_gfx_line(engine: &mut Engine2d, y: u32, layers: &Layers) {
    let mut obj_window_line = [false; 256];
    engine.obj_line.fill(Pixel::default());
    for i in 0..4 {
        engine.bg_line[i].fill(Pixel {
            color: 0,
            attr: (0x80 + 4 + i as u32) << 24,
        });
    }

    if engine.control.objs_enabled() {
        render_obj_line(engine, y, layers, &mut obj_window_line);
    }

    set_active_window(engine, &obj_window_line);

    if engine.control.objs_enabled() && engine.control.0 & 0xE000 != 0 {
        for x in 0..256 {
            if !layer_in_window(engine, 4, x) {
                engine.obj_line[x].attr = 0x80 << 24 | 1 << 31;
            }
        }
    }

    let render_3d = engine.is_a && engine.control.bg0_3d();
    let mode = engine.control.bg_mode();

    if engine.control.bg0_enabled() && mode != 6 {
        if render_3d {
            render_3d_line(engine, layers);
        } else {
            render_text_bg_line(engine, 0, y, layers);
        }
    }
    if engine.control.bg1_enabled() && mode != 6 {
        render_text_bg_line(engine, 1, y, layers);
    }
    if engine.control.bg2_enabled() {
        match mode {
            0 | 1 | 3 => render_text_bg_line(engine, 2, y, layers),
            2 | 4 => render_affine_bg_line(engine, 2, layers),
            5 => render_extended_bg_line(engine, 2, layers),
            6 => {
                if engine.is_a {
                    render_large_bitmap_bg_line(engine, layers);
                }
            }
            _ => {}
        }
    }
    if engine.control.bg3_enabled() && mode != 6 {
        match mode {
            0 => render_text_bg_line(engine, 3, y, layers),
            1 | 2 => render_affine_bg_line(engine, 3, layers),
            _ => render_extended_bg_line(engine, 3, layers),
        }
    }
    if mode == 6 && engine.is_a && engine.control.bg0_enabled() {
        render_3d_line(engine, layers);
    }

    merge_lines(engine, layers);
}

fn set_active_window(engine: &mut Engine2d, obj_window_line: &[bool; 256]) {
    let win0 = engine.control.win0_enabled();
    let win1 = engine.control.win1_enabled();
    let obj_win = engine.control.obj_win_enabled();
    if !(win0 || win1 || obj_win) {
        engine.window_bits_line.fill(0x3F);
        return;
    }

    let bits = [
        engine.win_in as u8,
        (engine.win_in >> 8) as u8,
        (engine.win_out >> 8) as u8,
        engine.win_out as u8,
    ];

    let mut active = [3u8; 256];
    if obj_win {
        for (slot, &in_obj) in active.iter_mut().zip(obj_window_line.iter()) {
            if in_obj {
                *slot = 2;
            }
        }
    }
    for w in (0..2).rev() {
        let enabled = if w == 0 { win0 } else { win1 };
        if !enabled || !engine.window_y_in_range[w] {
            continue;
        }
        let start = (engine.win_h[w] >> 8) as usize;
        let mut end = (engine.win_h[w] & 0xFF) as usize;
        if start > end || (end == 0 && start != 0) {
            end = 256;
        }
        for slot in &mut active[start..end] {
            *slot = w as u8;
        }
    }

    for (out, &w) in engine.window_bits_line.iter_mut().zip(active.iter()) {
        *out = bits[w as usize] & 0x3F;
    }
}

// ---------------------------------------------------------------- text BGs

struct Background {
    id: usize,
    attr: u32,
    size_bits: u32,
    slot: u32,
    mosaic_h: i32,
    screen_base: u32,
    char_base: u32,
    w: u32,
    h: u32,
    x: u32,
    y: u32,
    screen: u32,
    se_x: u32,
    se_y: u32,
    ref_x: i32,
    ref_y: i32,
    pa: i32,
    pc: i32,
    color_256: bool,
    ext_palettes: bool,
    wrap: bool,
}

fn setup_bg(engine: &Engine2d, id: usize) -> Background {
    let control = engine.bg_control[id];
    let mosaic = control.mosaic();
    Background {
        id,
        attr: (control.priority() as u32) << 28
            | (id as u32 + 4) << 24
            | (engine.blend_control.0 as u32 >> id & 0x101),
        size_bits: control.size() as u32,
        slot: id as u32 | if control.ext_pal_slot_or_wrap() { 2 } else { 0 },
        mosaic_h: if mosaic {
            engine.mosaic as i32 & 0xF
        } else {
            0
        },
        screen_base: ((control.screen_base() as u32) << 11)
            + ((engine.control.screen_base() as u32) << 16),
        char_base: ((control.char_base() as u32) << 14)
            + ((engine.control.char_base() as u32) << 16),
        w: 0,
        h: 0,
        x: 0,
        y: 0,
        screen: 0,
        se_x: 0,
        se_y: 0,
        ref_x: 0,
        ref_y: 0,
        pa: 0,
        pc: 0,
        color_256: control.use_256_colors(),
        ext_palettes: engine.control.bg_ext_pal_enabled(),
        wrap: control.ext_pal_slot_or_wrap(),
    }
}

fn setup_affine_bg(engine: &Engine2d, id: usize) -> Background {
    let mut bg = setup_bg(engine, id);
    bg.ref_x = engine.bg_ref_x[id - 2];
    bg.ref_y = engine.bg_ref_y[id - 2];
    bg.pa = engine.bg_pa[id - 2] as i32;
    bg.pc = engine.bg_pc[id - 2] as i32;
    bg
}

fn write_bg_pixel(engine: &mut Engine2d, id: usize, x: usize, color: u32, attr: u32) {
    engine.bg_line[id][x] = Pixel { color, attr };
}

fn fetch_text_tile(
    engine: &Engine2d,
    layers: &Layers,
    bg: &mut Background,
    wide: bool,
) -> (u64, u32) {
    let se_offset = bg.screen_base + (bg.screen << 11) + (bg.se_y << 6) + (bg.se_x << 1);
    let se = layers.bg_data::<u16>(engine, se_offset) as u32;
    let py = if se & 1 << 11 != 0 {
        7 - (bg.y & 7)
    } else {
        bg.y & 7
    };
    let char_idx = se & 0x3FF;

    let row = if wide {
        let mut row = layers.bg_data::<u64>(engine, bg.char_base + (char_idx << 6) + (py << 3));
        if se & 1 << 10 != 0 {
            row = row.swap_bytes();
        }
        row
    } else {
        let mut row =
            layers.bg_data::<u32>(engine, bg.char_base + (char_idx << 5) + (py << 2));
        if se & 1 << 10 != 0 {
            row = row.swap_bytes();
            row = (row & 0x0F0F_0F0F) << 4 | (row & 0xF0F0_F0F0) >> 4;
        }
        row as u64
    };

    (row, se >> 12)
}

fn text_bg_step(bg: &mut Background) {
    bg.se_x += 1;
    if bg.se_x >= 32 {
        bg.se_x = 0;
        if bg.w > 256 {
            bg.screen ^= 1;
        }
    }
}

fn render_text_bg_line(engine: &mut Engine2d, id: usize, y: u32, layers: &Layers) {
    let mut bg = setup_bg(engine, id);
    bg.w = 256 << (bg.size_bits & 1);
    bg.h = 256 << (bg.size_bits >> 1);
    let mosaic_offset = if bg.mosaic_h != 0 {
        engine.mosaic_countup as u32
    } else {
        0
    };
    bg.x = engine.bg_h_offset[id] as u32 & (bg.w - 1);
    bg.y = (engine.bg_v_offset[id] as u32 + y).wrapping_sub(mosaic_offset) & (bg.h - 1);
    bg.screen = ((bg.y >> 8 << 1) + (bg.x >> 8)) >> (if bg.size_bits == 2 { 1 } else { 0 });
    bg.se_x = (bg.x & 255) >> 3;
    bg.se_y = (bg.y & 255) >> 3;

    let wide = bg.color_256;
    let mosaic_w = bg.mosaic_h as u32 + 1;

    if bg.mosaic_h == 0 {
        let mut x = 0usize;
        let mut px = bg.x & 7;
        while x < 256 {
            let (mut row, palette_num) = fetch_text_tile(engine, layers, &mut bg, wide);
            row >>= px * if wide { 8 } else { 4 };
            while px < 8 && x < 256 {
                let color_num = if wide { row & 0xFF } else { row & 0xF } as u32;
                if color_num != 0 && layer_in_window(engine, bg.id as u32, x) {
                    let color = if wide && bg.ext_palettes {
                        layers.bg_color_256_ext(engine, bg.slot, palette_num, color_num)
                    } else if wide {
                        layers.bg_color(engine, color_num)
                    } else {
                        layers.bg_color_16(engine, palette_num, color_num)
                    };
                    write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
                }
                row >>= if wide { 8 } else { 4 };
                px += 1;
                x += 1;
            }
            text_bg_step(&mut bg);
            px = 0;
        }
    } else {
        // Horizontal mosaic: sample once per block, repeat across it
        let mut x = 0usize;
        let mut px = bg.x & 7;
        while x < 256 {
            let (mut row, palette_num) = fetch_text_tile(engine, layers, &mut bg, wide);
            row >>= px * if wide { 8 } else { 4 };
            let color_num = if wide { row & 0xFF } else { row & 0xF } as u32;
            if color_num != 0 {
                let color = if wide && bg.ext_palettes {
                    layers.bg_color_256_ext(engine, bg.slot, palette_num, color_num)
                } else if wide {
                    layers.bg_color(engine, color_num)
                } else {
                    layers.bg_color_16(engine, palette_num, color_num)
                };
                for _ in 0..mosaic_w {
                    if x >= 256 {
                        break;
                    }
                    if layer_in_window(engine, bg.id as u32, x) {
                        write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
                    }
                    x += 1;
                }
            } else {
                x += mosaic_w as usize;
            }
            // Advance the sample position by one block
            let new_px = px + mosaic_w;
            for _ in 0..(new_px >> 3) {
                text_bg_step(&mut bg);
            }
            px = new_px & 7;
        }
    }
}

// -------------------------------------------------------------- affine BGs

fn affine_in_bounds(bg: &mut Background) -> bool {
    bg.x = (bg.ref_x >> 8) as u32;
    bg.y = (bg.ref_y >> 8) as u32;
    if bg.wrap {
        bg.x &= bg.w - 1;
        bg.y &= bg.h - 1;
        true
    } else {
        (bg.x as i32) >= 0 && bg.x < bg.w && (bg.y as i32) >= 0 && bg.y < bg.h
    }
}

fn affine_step(bg: &mut Background, x: usize) {
    if bg.mosaic_h == 0 {
        bg.ref_x += bg.pa;
        bg.ref_y += bg.pc;
    } else if x as i32 % (bg.mosaic_h + 1) == 0 {
        bg.ref_x += (bg.mosaic_h + 1) * bg.pa;
        bg.ref_y += (bg.mosaic_h + 1) * bg.pc;
    }
}

fn render_affine_bg_line(engine: &mut Engine2d, id: usize, layers: &Layers) {
    let mut bg = setup_affine_bg(engine, id);
    bg.w = 128 << bg.size_bits;
    bg.h = bg.w;

    for x in 0..256usize {
        if layer_in_window(engine, bg.id as u32, x) && affine_in_bounds(&mut bg) {
            let se_offset = bg.screen_base + (bg.w >> 3) * (bg.y >> 3) + (bg.x >> 3);
            let se = layers.bg_data::<u8>(engine, se_offset) as u32;
            let color_num = layers.bg_data::<u8>(
                engine,
                bg.char_base + (se << 6) + ((bg.y & 7) << 3) + (bg.x & 7),
            ) as u32;
            if color_num != 0 {
                let color = layers.bg_color(engine, color_num);
                write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
            }
        }
        affine_step(&mut bg, x);
    }
}

fn render_extended_bg_line(engine: &mut Engine2d, id: usize, layers: &Layers) {
    if !engine.bg_control[id].use_256_colors() {
        render_ext_text_bg_line(engine, id, layers);
    } else {
        let direct_color = engine.bg_control[id].char_base() & 1 != 0;
        render_ext_bitmap_bg_line(engine, id, direct_color, layers);
    }
}

fn render_ext_text_bg_line(engine: &mut Engine2d, id: usize, layers: &Layers) {
    let mut bg = setup_affine_bg(engine, id);
    bg.w = 128 << bg.size_bits;
    bg.h = bg.w;

    for x in 0..256usize {
        if layer_in_window(engine, bg.id as u32, x) && affine_in_bounds(&mut bg) {
            let se_offset = bg.screen_base + (bg.w >> 3 << 1) * (bg.y >> 3) + ((bg.x >> 3) << 1);
            let se = layers.bg_data::<u16>(engine, se_offset) as u32;
            let py = if se & 1 << 11 != 0 {
                7 - (bg.y & 7)
            } else {
                bg.y & 7
            };
            let px = if se & 1 << 10 != 0 {
                7 - (bg.x & 7)
            } else {
                bg.x & 7
            };
            let char_idx = se & 0x3FF;
            let color_num =
                layers.bg_data::<u8>(engine, bg.char_base + (char_idx << 6) + (py << 3) + px)
                    as u32;
            if color_num != 0 {
                let color = if bg.ext_palettes {
                    layers.bg_color_256_ext(engine, bg.slot, se >> 12, color_num)
                } else {
                    layers.bg_color(engine, color_num)
                };
                write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
            }
        }
        affine_step(&mut bg, x);
    }
}

fn render_ext_bitmap_bg_line(
    engine: &mut Engine2d,
    id: usize,
    direct_color: bool,
    layers: &Layers,
) {
    let mut bg = setup_affine_bg(engine, id);
    bg.screen_base = (engine.bg_control[id].screen_base() as u32) << 14;
    const WIDTHS: [u32; 4] = [128, 256, 512, 512];
    const HEIGHTS: [u32; 4] = [128, 256, 256, 512];
    bg.w = WIDTHS[bg.size_bits as usize];
    bg.h = HEIGHTS[bg.size_bits as usize];

    for x in 0..256usize {
        if layer_in_window(engine, bg.id as u32, x) && affine_in_bounds(&mut bg) {
            if direct_color {
                let offset = bg.screen_base + (bg.w * bg.y << 1) + (bg.x << 1);
                let color = layers.bg_data::<u16>(engine, offset);
                if color & 1 << 15 != 0 {
                    write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
                }
            } else {
                let offset = bg.screen_base + bg.w * bg.y + bg.x;
                let color_num = layers.bg_data::<u8>(engine, offset) as u32;
                if color_num != 0 {
                    let color = layers.bg_color(engine, color_num);
                    write_bg_pixel(engine, bg.id, x, color as u32, bg.attr);
                }
            }
        }
        affine_step(&mut bg, x);
    }
}

fn render_large_bitmap_bg_line(engine: &mut Engine2d, layers: &Layers) {
    let mut bg = setup_affine_bg(engine, 2);
    (bg.w, bg.h) = match bg.size_bits {
        0 => (512, 1024),
        1 => (1024, 512),
        // The remaining encodings aren't valid; treat them as the small one
        _ => (512, 1024),
    };

    for x in 0..256usize {
        if layer_in_window(engine, 2, x) && affine_in_bounds(&mut bg) {
            let color_num = layers.vram.read_a_bg::<u8>(bg.w * bg.y + bg.x) as u32;
            if color_num != 0 {
                let color = layers.bg_color(engine, color_num);
                write_bg_pixel(engine, 2, x, color as u32, bg.attr);
            }
        }
        affine_step(&mut bg, x);
    }
}

fn render_3d_line(engine: &mut Engine2d, layers: &Layers) {
    let priority = engine.bg_control[0].priority() as u32;
    let attr = priority << 28 | 4 << 24 | (engine.blend_control.0 as u32 & 0x101) | 0x6;
    let offset = ((engine.bg_h_offset[0] << 7) as i16 >> 7) as i32;

    let (mut x, start, end) = if offset < 0 {
        (0i32, (-offset) as usize, 256usize)
    } else {
        (offset, 0, 256 - offset as usize)
    };

    for out_x in start..end {
        if layer_in_window(engine, 0, x as usize) {
            let color = layers.line_3d[x as usize];
            if color >> 24 != 0 {
                write_bg_pixel(engine, 0, out_x, color, attr);
            }
        }
        x += 1;
    }
}

// ------------------------------------------------------------------- OBJs

const OBJ_WIDTHS: [[u32; 4]; 4] = [
    [8, 16, 32, 64],
    [16, 32, 32, 64],
    [8, 8, 16, 32],
    [0, 0, 0, 0],
];
const OBJ_HEIGHTS: [[u32; 4]; 4] = [
    [8, 16, 32, 64],
    [8, 8, 16, 32],
    [16, 32, 32, 64],
    [0, 0, 0, 0],
];

struct Sprite {
    id: u32,
    attr0: u32,
    attr1: u32,
    attr2: u32,
    mode: u32,
    attr: u32,
    w: u32,
    h: u32,
    char_idx: u32,
    y: u32,
    x: u32,
    x_start: u32,
    x_end: u32,
    palette_num: u32,
    tile_offset: u32,
    ref_x: i32,
    ref_y: i32,
    pa: i32,
    pc: i32,
    map_1d: bool,
    hflip: bool,
}

fn write_obj_pixel(engine: &mut Engine2d, x: usize, color: u32, attr: u32) {
    if attr < engine.obj_line[x].attr {
        engine.obj_line[x] = Pixel { color, attr };
    }
}

fn render_obj_line(
    engine: &mut Engine2d,
    y: u32,
    layers: &Layers,
    obj_window_line: &mut [bool; 256],
) {
    for id in 0..128u32 {
        let oam_offset = id << 3;
        let attr0 = layers.oam_halfword(engine, oam_offset) as u32;
        if attr0 >> 8 & 3 == 2 {
            continue;
        }
        let mut obj = Sprite {
            id,
            attr0,
            attr1: layers.oam_halfword(engine, oam_offset + 2) as u32,
            attr2: layers.oam_halfword(engine, oam_offset + 4) as u32,
            mode: attr0 >> 10 & 3,
            attr: 0,
            w: 0,
            h: 0,
            char_idx: 0,
            y: 0,
            x: 0,
            x_start: 0,
            x_end: 0,
            palette_num: 0,
            tile_offset: 0,
            ref_x: 0,
            ref_y: 0,
            pa: 0,
            pc: 0,
            map_1d: false,
            hflip: false,
        };
        let affine = attr0 & 1 << 8 != 0;
        let bitmap = obj.mode == 3;
        obj.map_1d = if bitmap {
            engine.control.bitmap_obj_mapping_1d()
        } else {
            engine.control.tile_obj_mapping_1d()
        };

        if affine && bitmap {
            render_affine_bitmap_sprite(engine, &mut obj, y, layers);
        } else if affine {
            render_affine_sprite(engine, &mut obj, y, layers, obj_window_line);
        } else if bitmap {
            render_bitmap_sprite(engine, &mut obj, y, layers);
        } else {
            render_normal_sprite(engine, &mut obj, y, layers, obj_window_line);
        }
    }
}

fn setup_sprite(obj: &mut Sprite) {
    let shape = (obj.attr0 >> 14 & 3) as usize;
    let size = (obj.attr1 >> 14 & 3) as usize;
    obj.w = OBJ_WIDTHS[shape][size];
    obj.h = OBJ_HEIGHTS[shape][size];
    obj.char_idx = obj.attr2 & 0x3FF;
}

fn setup_sprite_bounds(obj: &mut Sprite, y: u32, box_w: u32, box_h: u32) -> bool {
    if box_w == 0 {
        return false;
    }
    obj.y = y.wrapping_sub(obj.attr0 & 0xFF) & 0xFF;
    if obj.y >= box_h {
        return false;
    }
    let x_coord = obj.attr1 & 0x1FF;
    if x_coord < 256 {
        obj.x = 0;
        obj.x_start = x_coord;
        obj.x_end = (x_coord + box_w).min(256);
    } else {
        obj.x = 512 - x_coord;
        if obj.x >= box_w {
            return false;
        }
        obj.x_start = 0;
        obj.x_end = box_w - obj.x;
    }
    true
}

fn setup_non_affine_sprite(obj: &mut Sprite, y: u32) -> bool {
    setup_sprite(obj);
    if !setup_sprite_bounds(obj, y, obj.w, obj.h) {
        return false;
    }
    if obj.attr1 & 1 << 13 != 0 {
        obj.y = obj.h - 1 - obj.y;
    }
    obj.hflip = obj.attr1 & 1 << 12 != 0;
    if obj.hflip {
        obj.x = obj.w - 1 - obj.x;
    }
    true
}

fn setup_affine_sprite(engine: &Engine2d, obj: &mut Sprite, y: u32, layers: &Layers) -> bool {
    setup_sprite(obj);
    let mut box_w = obj.w;
    let mut box_h = obj.h;
    if obj.attr0 & 1 << 9 != 0 {
        box_w <<= 1;
        box_h <<= 1;
    }
    if !setup_sprite_bounds(obj, y, box_w, box_h) {
        return false;
    }

    let affine_base = ((obj.attr1 >> 9 & 0x1F) << 5) + 6;
    let pa = layers.oam_halfword(engine, affine_base) as i16 as i32;
    let pb = layers.oam_halfword(engine, affine_base + 8) as i16 as i32;
    let pc = layers.oam_halfword(engine, affine_base + 16) as i16 as i32;
    let pd = layers.oam_halfword(engine, affine_base + 24) as i16 as i32;
    obj.ref_x = (obj.y as i32 - (box_h >> 1) as i32) * pb
        + (obj.x as i32 - (box_w >> 1) as i32) * pa
        + ((obj.w >> 1) << 8) as i32;
    obj.ref_y = (obj.y as i32 - (box_h >> 1) as i32) * pd
        + (obj.x as i32 - (box_w >> 1) as i32) * pc
        + ((obj.h >> 1) << 8) as i32;
    obj.pa = pa;
    obj.pc = pc;
    true
}

fn obj_sample_tile(
    engine: &Engine2d,
    layers: &Layers,
    obj: &Sprite,
    color_256: bool,
    ext_palettes: bool,
) -> Option<u16> {
    let tx = obj.x >> 3;
    let ty = obj.y >> 3;
    let px = obj.x & 7;
    let py = obj.y & 7;

    let tile_offset = if color_256 {
        if obj.map_1d {
            (obj.char_idx << 5 << engine.control.tile_obj_1d_boundary())
                + (obj.w >> 3 << 6) * ty
                + (tx << 6)
                + (py << 3)
                + px
        } else {
            ((obj.char_idx & !1) << 5) + (ty << 10) + (tx << 6) + (py << 3) + px
        }
    } else if obj.map_1d {
        (obj.char_idx << 5 << engine.control.tile_obj_1d_boundary())
            + (obj.w >> 3 << 5) * ty
            + (tx << 5)
            + (py << 2)
            + (px >> 1)
    } else {
        (obj.char_idx << 5) + (ty << 10) + (tx << 5) + (py << 2) + (px >> 1)
    };

    let mut color_num = layers.obj_data::<u8>(engine, tile_offset) as u32;
    if !color_256 {
        color_num = if px & 1 != 0 {
            color_num >> 4
        } else {
            color_num & 0xF
        };
    }
    if color_num == 0 {
        return None;
    }
    Some(if color_256 && ext_palettes {
        layers.obj_color_256_ext(engine, obj.palette_num, color_num)
    } else if color_256 {
        layers.obj_color(engine, color_num)
    } else {
        layers.obj_color_16(engine, obj.palette_num, color_num)
    })
}

fn render_normal_sprite(
    engine: &mut Engine2d,
    obj: &mut Sprite,
    y: u32,
    layers: &Layers,
    obj_window_line: &mut [bool; 256],
) {
    if !setup_non_affine_sprite(obj, y) {
        return;
    }
    let color_256 = obj.attr0 & 1 << 13 != 0;
    let ext_palettes = engine.control.obj_ext_pal_enabled();
    obj.palette_num = obj.attr2 >> 12;
    obj.attr = (obj.attr2 >> 10 & 3) << 28
        | obj.id << 16
        | if obj.mode == 1 { 2 } else { 0 };

    let step = if obj.hflip { -1i32 } else { 1 };
    let mut sample_x = obj.x;
    for x in obj.x_start..obj.x_end {
        obj.x = sample_x;
        if let Some(color) = obj_sample_tile(engine, layers, obj, color_256, ext_palettes) {
            if obj.mode == 2 {
                obj_window_line[x as usize] = true;
            } else {
                write_obj_pixel(engine, x as usize, color as u32, obj.attr);
            }
        }
        sample_x = sample_x.wrapping_add(step as u32);
    }
}

fn render_bitmap_sprite(engine: &mut Engine2d, obj: &mut Sprite, y: u32, layers: &Layers) {
    // Alpha 0 means fully transparent
    if obj.attr2 >> 12 == 0 {
        return;
    }
    if !setup_non_affine_sprite(obj, y) {
        return;
    }

    let mut offset = if obj.map_1d {
        (obj.char_idx << 7 << engine.control.bitmap_obj_1d_boundary() as u32)
            + (obj.w << 1) * obj.y
            + (obj.x << 1)
    } else {
        let mask = if engine.control.bitmap_obj_2d_wide() {
            0x1F
        } else {
            0xF
        };
        ((obj.char_idx & mask) << 4)
            + ((obj.char_idx & !mask) << 7)
            + ((256 << engine.control.bitmap_obj_2d_wide() as u32) * obj.y)
            + (obj.x << 1)
    };

    obj.attr = (obj.attr2 >> 10 & 3) << 28 | obj.id << 16 | 2 | (obj.attr2 & 0xF000);

    for x in obj.x_start..obj.x_end {
        let color = layers.obj_data::<u16>(engine, offset);
        if color & 1 << 15 != 0 {
            write_obj_pixel(engine, x as usize, color as u32, obj.attr);
        }
        offset = offset.wrapping_add(if obj.hflip { -2i32 as u32 } else { 2 });
    }
}

fn render_affine_sprite(
    engine: &mut Engine2d,
    obj: &mut Sprite,
    y: u32,
    layers: &Layers,
    obj_window_line: &mut [bool; 256],
) {
    if !setup_affine_sprite(engine, obj, y, layers) {
        return;
    }
    let color_256 = obj.attr0 & 1 << 13 != 0;
    let ext_palettes = engine.control.obj_ext_pal_enabled();
    obj.palette_num = obj.attr2 >> 12;
    obj.attr = (obj.attr2 >> 10 & 3) << 28
        | obj.id << 16
        | if obj.mode == 1 { 2 } else { 0 };

    for x in obj.x_start..obj.x_end {
        obj.x = (obj.ref_x >> 8) as u32;
        obj.y = (obj.ref_y >> 8) as u32;
        if (obj.x as i32) >= 0 && obj.x < obj.w && (obj.y as i32) >= 0 && obj.y < obj.h {
            if let Some(color) = obj_sample_tile(engine, layers, obj, color_256, ext_palettes) {
                if obj.mode == 2 {
                    obj_window_line[x as usize] = true;
                } else {
                    write_obj_pixel(engine, x as usize, color as u32, obj.attr);
                }
            }
        }
        obj.ref_x += obj.pa;
        obj.ref_y += obj.pc;
    }
}

fn render_affine_bitmap_sprite(
    engine: &mut Engine2d,
    obj: &mut Sprite,
    y: u32,
    layers: &Layers,
) {
    if obj.attr2 >> 12 == 0 {
        return;
    }
    if !setup_affine_sprite(engine, obj, y, layers) {
        return;
    }

    let base_offset = if obj.map_1d {
        obj.char_idx << 7 << engine.control.bitmap_obj_1d_boundary() as u32
    } else {
        let mask = if engine.control.bitmap_obj_2d_wide() {
            0x1F
        } else {
            0xF
        };
        ((obj.char_idx & mask) << 4) + ((obj.char_idx & !mask) << 7)
    };
    let width_2d_shift = 8 + engine.control.bitmap_obj_2d_wide() as u32;

    obj.attr = (obj.attr2 >> 10 & 3) << 28 | obj.id << 16 | 2 | (obj.attr2 & 0xF000);

    for x in obj.x_start..obj.x_end {
        obj.x = (obj.ref_x >> 8) as u32;
        obj.y = (obj.ref_y >> 8) as u32;
        if (obj.x as i32) >= 0 && obj.x < obj.w && (obj.y as i32) >= 0 && obj.y < obj.h {
            let offset = base_offset
                + if obj.map_1d {
                    (obj.w << 1) * obj.y + (obj.x << 1)
                } else {
                    (obj.y << width_2d_shift) + (obj.x << 1)
                };
            let color = layers.obj_data::<u16>(engine, offset);
            if color & 1 << 15 != 0 {
                write_obj_pixel(engine, x as usize, color as u32, obj.attr);
            }
        }
        obj.ref_x += obj.pa;
        obj.ref_y += obj.pc;
    }
}

// -------------------------------------------------------------- composite

fn alpha_blend(c1: u32, c2: u32, k1: u32, k2: u32, shift: u32) -> u32 {
    let half = 1 << (shift - 1);
    let r = 0x3F.min(((c1 & 0x3F) * k1 + (c2 & 0x3F) * k2 + half) >> shift);
    let g = 0x3F.min(((c1 >> 8 & 0x3F) * k1 + (c2 >> 8 & 0x3F) * k2 + half) >> shift);
    let b = 0x3F.min(((c1 >> 16 & 0x3F) * k1 + (c2 >> 16 & 0x3F) * k2 + half) >> shift);
    rgb6(r, g, b, 0x1F)
}

fn increase_brightness(c: u32, k: u32) -> u32 {
    let r = c & 0x3F;
    let g = c >> 8 & 0x3F;
    let b = c >> 16 & 0x3F;
    rgb6(
        r + (((0x3F - r) * k + 8) >> 4),
        g + (((0x3F - g) * k + 8) >> 4),
        b + (((0x3F - b) * k + 8) >> 4),
        0x1F,
    )
}

fn decrease_brightness(c: u32, k: u32) -> u32 {
    let r = c & 0x3F;
    let g = c >> 8 & 0x3F;
    let b = c >> 16 & 0x3F;
    rgb6(
        r - ((r * k + 7) >> 4),
        g - ((g * k + 7) >> 4),
        b - ((b * k + 7) >> 4),
        0x1F,
    )
}

fn merge_lines(engine: &mut Engine2d, layers: &Layers) {
    let backdrop_color = layers.bg_color(engine, 0) as u32;
    let backdrop_attr = 0x40 << 24 | (engine.blend_control.0 as u32 >> 5 & 0x101);
    let obj_blend_attr = engine.blend_control.0 as u32 >> 4 & 0x101;

    let effect = engine.blend_control.effect();
    let eva = (engine.blend_alpha as u32 & 0x1F).min(16);
    let evb = (engine.blend_alpha as u32 >> 8 & 0x1F).min(16);
    let evy = (engine.blend_brightness as u32 & 0x1F).min(16);

    for x in 0..256usize {
        let mut color = [backdrop_color; 2];
        let mut attr = [backdrop_attr; 2];

        let obj = engine.obj_line[x];
        if obj.attr < attr[0] {
            attr[0] = obj.attr | obj_blend_attr;
            color[0] = obj.color;
        }

        for bg in 0..4 {
            let pixel = engine.bg_line[bg][x];
            if pixel.attr < attr[0] {
                attr[1] = attr[0];
                color[1] = color[0];
                attr[0] = pixel.attr;
                color[0] = pixel.color;
            } else if pixel.attr < attr[1] {
                attr[1] = pixel.attr;
                color[1] = pixel.color;
            }
        }

        if attr[0] & 4 == 0 {
            color[0] = unpack_bgr555(color[0] as u16);
        }
        if attr[1] & 4 == 0 {
            color[1] = unpack_bgr555(color[1] as u16);
        }

        let effects_allowed = engine.window_bits_line[x] & 1 << 5 != 0;
        let top_fx = attr[0] & 1 != 0 && effects_allowed;
        let bottom_fx = attr[1] & 0x100 != 0 && effects_allowed;
        let mut result = color[0];
        let mut did_blend = false;

        if attr[0] & 2 != 0 && bottom_fx {
            let (k1, k2, shift) = if attr[0] & 4 != 0 {
                let k1 = (color[0] >> 24) + 1;
                (k1, 32 - k1, 5)
            } else if attr[0] >> 12 & 0xF != 0 {
                let k1 = (attr[0] >> 12 & 0xF) + 1;
                (k1, 16 - k1, 4)
            } else {
                (eva, evb, 4)
            };
            result = alpha_blend(color[0], color[1], k1, k2, shift);
            did_blend = true;
        }

        match effect {
            1 => {
                if !did_blend && top_fx && bottom_fx {
                    result = alpha_blend(color[0], color[1], eva, evb, 4);
                }
            }
            2 => {
                if top_fx {
                    result = increase_brightness(color[0], evy);
                }
            }
            3 => {
                if top_fx {
                    result = decrease_brightness(color[0], evy);
                }
            }
            _ => {}
        }

        engine.gfx_line[x] = (result & 0x00FF_FFFF) | 0x1F << 24;
    }
}

fn capture_display(engine: &mut Engine2d, y: u32, layers: &Layers) {
    const DIMS: [(u32, u32); 4] = [(128, 128), (256, 64), (256, 128), (256, 192)];
    let control = engine.capture_control;
    let (w, h) = DIMS[control.size() as usize];
    if y >= h {
        return;
    }

    let dst_bank = control.dst_bank() as usize;
    // The destination bank must currently be in LCDC mode
    let bank_control = layers.vram.bank_control[dst_bank];
    if bank_control.enabled() && bank_control.mst() != 0 {
        return;
    }
    let mut dst_offset = y * w * 2 + 0x8000 * control.dst_offset() as u32;

    let source = control.source();
    let mut src_b = [0u16; 256];
    if source != 0 && !control.src_b_main_mem() {
        let src_bank = engine.control.vram_block() as usize;
        let mut offset = y * w * 2;
        if engine.control.display_mode() != 2 {
            offset += 0x8000 * control.src_offset() as u32;
        }
        for item in src_b.iter_mut().take(w as usize) {
            *item = layers.vram.read_bank(src_bank, offset & 0x1_FFFF);
            offset += 2;
        }
    }

    let src_a_3d = control.src_a_3d();
    let eva = (control.eva() as u32).min(16);
    let evb = (control.evb() as u32).min(16);

    for x in 0..w {
        let a = if src_a_3d {
            layers.line_3d[x as usize]
        } else {
            engine.gfx_line[x as usize]
        };
        let a_r = (a & 0x3F) >> 1;
        let a_g = (a >> 8 & 0x3F) >> 1;
        let a_b = (a >> 16 & 0x3F) >> 1;
        let a_a = (a >> 24 != 0) as u32;

        let b = src_b[x as usize] as u32;
        let b_r = b & 0x1F;
        let b_g = b >> 5 & 0x1F;
        let b_b = b >> 10 & 0x1F;
        let b_a = (b >> 15) & 1;

        let value = match source {
            0 => (a_a << 15 | a_b << 10 | a_g << 5 | a_r) as u16,
            1 => b as u16,
            _ => {
                let r = 0x1F.min((a_r * a_a * eva + b_r * b_a * evb + 8) >> 4);
                let g = 0x1F.min((a_g * a_a * eva + b_g * b_a * evb + 8) >> 4);
                let b = 0x1F.min((a_b * a_a * eva + b_b * b_a * evb + 8) >> 4);
                let a = ((a_a != 0 && eva != 0) || (b_a != 0 && evb != 0)) as u32;
                (a << 15 | b << 10 | g << 5 | r) as u16
            }
        };
        layers.vram.write_bank(dst_bank, dst_offset & 0x1_FFFF, value);
        dst_offset += 2;
    }
}

fn apply_master_brightness(engine: &mut Engine2d) {
    let k = (engine.master_brightness as u32 & 0x1F).min(16);
    match engine.master_brightness >> 14 & 3 {
        1 => {
            for color in &mut engine.output_line {
                *color = increase_brightness(*color, k);
            }
        }
        2 => {
            for color in &mut engine.output_line {
                *color = decrease_brightness(*color, k);
            }
        }
        _ => {}
    }
}
