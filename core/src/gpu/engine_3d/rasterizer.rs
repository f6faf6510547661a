use super::{Disp3dControl, Polygon, PolygonRam, Vertex, VertexRam};
use crate::gpu::vram::Vram;

/// Rendering register file; MMIO writes land in the shadow copy and are
/// latched on the vertical blank.
#[derive(Clone, PartialEq, Eq)]
pub struct Registers {
    pub disp_control: Disp3dControl,
    pub clear_color: u32,
    pub clear_depth: u16,
    pub clear_image_offset: u16,
    pub toon_table: [u16; 32],
    pub edge_color: [u16; 8],
    pub fog_table: [u8; 32],
    pub fog_color: u32,
    pub fog_offset: u16,
    pub alpha_test_ref: u8,
}

impl Registers {
    fn new() -> Self {
        Registers {
            disp_control: Disp3dControl(0),
            clear_color: 0,
            clear_depth: 0,
            clear_image_offset: 0,
            toon_table: [0; 32],
            edge_color: [0; 8],
            fog_table: [0; 32],
            fog_color: 0,
            fog_offset: 0,
            alpha_test_ref: 0,
        }
    }
}

/// Output pixel format: r, g, b in 6 bits at byte lanes 0-2, 5-bit alpha in
/// lane 3 (0 = nothing drawn). Matches what the 2D compositor consumes.
#[inline]
const fn rgb6(r: u32, g: u32, b: u32, a: u32) -> u32 {
    r | g << 8 | b << 16 | a << 24
}

#[inline]
fn expand5(c: u32) -> u32 {
    let c = c & 0x1F;
    if c == 0 {
        0
    } else {
        (c << 1) + 1
    }
}

// Per-pixel attribute bits: opaque polygon id in 0-5, translucent polygon
// id + 1 in 8-13, edge flag 14, fog flag 15.
const ATTR_EDGE: u32 = 1 << 14;
const ATTR_FOG: u32 = 1 << 15;

struct Interp {
    x0: i32,
    x1: i32,
    w0: i32,
    w1: i32,
    x: i32,
    w: i32,
    denom: i64,
}

impl Interp {
    fn new(x0: i32, x1: i32, w0: i32, w1: i32) -> Self {
        Interp {
            x0,
            x1,
            w0,
            w1,
            x: x0,
            w: w0,
            denom: w0 as i64 * w1 as i64 * (x1 - x0) as i64,
        }
    }

    fn set_x(&mut self, x: i32) {
        self.x = x;
        let denom =
            self.w1 as i64 * (self.x1 - self.x) as i64 + self.w0 as i64 * (self.x - self.x0) as i64;
        self.w = if denom == 0 {
            self.w0
        } else {
            (self.denom / denom) as i32
        };
    }

    fn interpolate(&self, y0: i32, y1: i32) -> i32 {
        if self.denom == 0 {
            return y0;
        }
        let numer = self.w1 as i64 * y0 as i64 * (self.x1 - self.x) as i64
            + self.w0 as i64 * y1 as i64 * (self.x - self.x0) as i64;
        (self.w as i64 * numer / self.denom) as i32
    }
}

/// Edge state: x in 1.13.18 fixed, walked per scanline.
struct Slope {
    x0: i32,
    y0: i32,
    m: i32,
    negative: bool,
    x_major: bool,
    v0: usize,
    v1: usize,
    interp: Interp,
}

impl Slope {
    fn new(vtxs: &[Vertex], v0: usize, v1: usize, w0: i32, w1: i32) -> Self {
        let (mut x0, y0) = (vtxs[v0].sx, vtxs[v0].sy);
        let (mut x1, y1) = (vtxs[v1].sx, vtxs[v1].sy);

        let negative = x0 > x1;
        let mut start = x0 << 18;
        if negative {
            start -= 1;
            core::mem::swap(&mut x0, &mut x1);
        }

        let dx = x1 - x0;
        let dy = y1 - y0;
        let x_major = dx > dy;
        if x_major || dx == dy {
            let half = 1 << 17;
            start = if negative { start - half } else { start + half };
        }

        let m = if dy != 0 {
            dx.wrapping_mul((1 << 18) / dy)
        } else {
            1 << 18
        };

        let interp = if x_major {
            Interp::new(vtxs[v0].sx, vtxs[v1].sx, w0, w1)
        } else {
            Interp::new(vtxs[v0].sy, vtxs[v1].sy, w0, w1)
        };

        Slope {
            x0: start,
            y0,
            m,
            negative,
            x_major,
            v0,
            v1,
            interp,
        }
    }

    /// Vertical dummy edge used for flat (single-line) polygons.
    fn vertical(vtxs: &[Vertex], v: usize, w: i32) -> Self {
        let mut slope = Slope {
            x0: vtxs[v].sx << 18,
            y0: vtxs[v].sy,
            m: 1 << 18,
            negative: false,
            x_major: false,
            v0: v,
            v1: v,
            interp: Interp::new(vtxs[v].sy, vtxs[v].sy + 1, w, w),
        };
        slope.x0 = vtxs[v].sx << 18;
        slope
    }

    /// The covered x interval on `scanline`: [x[0], x[1]).
    fn x_range(&self, scanline: i32) -> [i32; 2] {
        let one = 1 << 18;
        let dy = scanline - self.y0;
        let mut x = [0i32; 2];
        if self.x_major && !self.negative {
            x[0] = self.x0.wrapping_add(dy.wrapping_mul(self.m));
            x[1] = (x[0] & !0x1FF).wrapping_add(self.m) - one;
        } else if self.x_major {
            x[1] = self.x0.wrapping_sub(dy.wrapping_mul(self.m));
            x[0] = (x[1] | 0x1FF).wrapping_sub(self.m) + one;
        } else if !self.negative {
            x[0] = self.x0.wrapping_add(dy.wrapping_mul(self.m));
            x[1] = x[0];
        } else {
            x[0] = self.x0.wrapping_sub(dy.wrapping_mul(self.m));
            x[1] = x[0];
        }
        [x[0] >> 18, (x[1] >> 18) + 1]
    }

    fn set_interp_x(&mut self, scanline: i32, x: i32) {
        if self.x_major {
            self.interp.set_x(x);
        } else {
            self.interp.set_x(scanline);
        }
    }
}

struct PolyState {
    start: usize,
    end: usize,
    left: usize,
    right: usize,
    left_slope: Slope,
    right_slope: Slope,
    start_y: i32,
    end_y: i32,
    id: u32,
    shadow: bool,
}

pub struct Renderer {
    pub shadow: Registers,
    current: Registers,
    pub(crate) manual_sort: bool,
    color_buf: Box<[[u32; 256]; 192]>,
    depth_buf: Box<[[i32; 256]; 192]>,
    attr_buf: Box<[[u32; 256]; 192]>,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Renderer {
            shadow: Registers::new(),
            current: Registers::new(),
            manual_sort: false,
            color_buf: Box::new([[0; 256]; 192]),
            depth_buf: Box::new([[0; 256]; 192]),
            attr_buf: Box::new([[0; 256]; 192]),
        }
    }

    pub(crate) fn latch_registers(&mut self, manual_sort: bool) {
        self.current = self.shadow.clone();
        self.manual_sort = manual_sort;
    }

    #[inline]
    pub(crate) fn color_line(&self, y: u32) -> &[u32; 256] {
        &self.color_buf[(y as usize).min(191)]
    }

    fn clear_buffers(&mut self) {
        let r = &self.current;
        let color = rgb6(
            expand5(r.clear_color),
            expand5(r.clear_color >> 5),
            expand5(r.clear_color >> 10),
            r.clear_color >> 16 & 0x1F,
        );
        let mut attr = (r.clear_color >> 24 & 0x3F) as u32;
        if r.clear_color & 1 << 15 != 0 {
            attr |= ATTR_FOG;
        }
        let depth = 0x200 * r.clear_depth as i32 + 0x1FF;

        for y in 0..192 {
            self.color_buf[y] = [color; 256];
            self.depth_buf[y] = [depth; 256];
            self.attr_buf[y] = [attr; 256];
        }
    }

    pub(crate) fn render_frame(&mut self, polys: &PolygonRam, vtxs: &VertexRam, vram: &Vram) {
        self.clear_buffers();

        let count = polys.count as usize;
        let mut order: Vec<usize> = (0..count).collect();
        let mut keys: Vec<(u8, i32)> = Vec::with_capacity(count);
        let mut states: Vec<PolyState> = Vec::with_capacity(count);

        for poly in polys.polys[..count].iter() {
            keys.push(sort_key(poly, vtxs, self.manual_sort));
        }
        order.sort_by_key(|&i| keys[i]);

        for &i in &order {
            states.push(setup_poly(&polys.polys[i], vtxs));
        }

        for scanline in 0..192 {
            let mut stencil = [false; 256];
            for (state_idx, &poly_idx) in order.iter().enumerate() {
                let poly = &polys.polys[poly_idx];
                let state = &mut states[state_idx];
                if scanline < state.start_y || scanline >= state.end_y {
                    continue;
                }
                advance_slopes(poly, vtxs, state, scanline);
                self.render_span(poly, vtxs, vram, state, scanline, &mut stencil);
            }
        }

        self.apply_frame_effects();
    }

    #[allow(clippy::too_many_lines)]
    fn render_span(
        &mut self,
        poly: &Polygon,
        vtxs: &VertexRam,
        vram: &Vram,
        state: &mut PolyState,
        scanline: i32,
        stencil: &mut [bool; 256],
    ) {
        let mut xstart = state.left_slope.x_range(scanline);
        let mut xend = state.right_slope.x_range(scanline);

        let (left, right) = if xstart[0] >= xend[1] {
            core::mem::swap(&mut xstart, &mut xend);
            (&mut state.right_slope, &mut state.left_slope)
        } else {
            (&mut state.left_slope, &mut state.right_slope)
        };

        left.set_interp_x(scanline, xstart[0]);
        right.set_interp_x(scanline, xend[1] - 1);

        let vl0 = &vtxs.vtxs[left.v0];
        let vl1 = &vtxs.vtxs[left.v1];
        let vr0 = &vtxs.vtxs[right.v0];
        let vr1 = &vtxs.vtxs[right.v1];

        let mut attr_l = [0i32; 5];
        let mut attr_r = [0i32; 5];
        for i in 0..5 {
            attr_l[i] = left.interp.interpolate(vl0.attr[i], vl1.attr[i]);
            attr_r[i] = right.interp.interpolate(vr0.attr[i], vr1.attr[i]);
        }

        let find_index =
            |slope: &Slope, v: usize| poly.vtxs.iter().position(|&idx| idx as usize == v);
        let zl = {
            let i0 = find_index(left, left.v0).unwrap_or(0);
            let i1 = find_index(left, left.v1).unwrap_or(0);
            left.interp.interpolate(poly.depth[i0], poly.depth[i1])
        };
        let zr = {
            let i0 = find_index(right, right.v0).unwrap_or(0);
            let i1 = find_index(right, right.v1).unwrap_or(0);
            right.interp.interpolate(poly.depth[i0], poly.depth[i1])
        };

        let mut span = Interp::new(xstart[0], xend[1] - 1, left.interp.w, right.interp.w);

        let alpha = match poly.attr.alpha() {
            0 => 31,
            alpha => alpha as u32,
        };
        let disp = self.current.disp_control;
        let mode = poly.attr.mode();
        let wireframe = poly.attr.alpha() == 0;

        let edge_left = xstart[1].max(0).min(256);
        let edge_right = xend[0].max(0).min(256);
        let span_start = xstart[0].max(0);
        let span_end = xend[1].min(256);

        for x in span_start..span_end {
            let is_edge = x < edge_left
                || x >= edge_right
                || scanline == state.start_y
                || scanline == state.end_y - 1;
            if wireframe && !is_edge {
                continue;
            }

            span.set_x(x);
            let depth = span.interpolate(zl, zr);
            let xi = x as usize;
            let yi = scanline as usize;

            // Shadow mask polygons only prime the stencil where the depth
            // test fails
            let depth_pass = if poly.attr.depth_test_equal() {
                (depth - self.depth_buf[yi][xi]).abs() <= 0x200
            } else {
                depth < self.depth_buf[yi][xi]
            };

            if state.shadow && state.id == 0 {
                if !depth_pass {
                    stencil[xi] = true;
                }
                continue;
            }
            if !depth_pass {
                continue;
            }
            if state.shadow {
                if !stencil[xi] {
                    continue;
                }
                let dst_id = self.attr_buf[yi][xi] & 0x3F;
                if dst_id == state.id {
                    continue;
                }
            }

            let r = span.interpolate(attr_l[0], attr_r[0]) as u32 >> 3;
            let g = span.interpolate(attr_l[1], attr_r[1]) as u32 >> 3;
            let b = span.interpolate(attr_l[2], attr_r[2]) as u32 >> 3;
            let s = span.interpolate(attr_l[3], attr_r[3]);
            let t = span.interpolate(attr_l[4], attr_r[4]);

            let (mut r, mut g, mut b, mut a) = (r.min(63), g.min(63), b.min(63), alpha);

            // Toon/highlight table indexed by the red channel
            if mode == 2 {
                if disp.highlight_shading() {
                    // Highlight: grey base now, table color added after
                    // texturing
                    g = r;
                    b = r;
                } else {
                    let toon = self.current.toon_table[(r >> 1).min(31) as usize] as u32;
                    r = expand5(toon);
                    g = expand5(toon >> 5);
                    b = expand5(toon >> 10);
                }
            }

            if disp.texture_mapping() && poly.tex_param.format() != 0 {
                match sample_texture(vram, poly, s, t) {
                    Some((tr, tg, tb, ta)) => {
                        (r, g, b, a) = combine_texture(mode, disp, (r, g, b, a), (tr, tg, tb, ta));
                    }
                    None => continue,
                }
            }
            if mode == 2 && disp.highlight_shading() {
                let toon = self.current.toon_table[(r >> 1).min(31) as usize] as u32;
                r = (r + expand5(toon)).min(63);
                g = (g + expand5(toon >> 5)).min(63);
                b = (b + expand5(toon >> 10)).min(63);
            }

            if disp.alpha_test() && a < self.current.alpha_test_ref as u32 {
                continue;
            }
            if a == 0 {
                continue;
            }

            let translucent_pixel = a < 31;
            if translucent_pixel {
                // A translucent polygon only blends once per pixel
                let prev_id = self.attr_buf[yi][xi] >> 8 & 0x3F;
                if prev_id == state.id + 1 {
                    continue;
                }
                let dst = self.color_buf[yi][xi];
                let dst_a = dst >> 24 & 0x1F;
                if dst_a != 0 && disp.alpha_blending() {
                    let k1 = a + 1;
                    let k2 = 31 - a;
                    r = ((r * k1 + (dst & 0x3F) * k2) >> 5).min(63);
                    g = ((g * k1 + (dst >> 8 & 0x3F) * k2) >> 5).min(63);
                    b = ((b * k1 + (dst >> 16 & 0x3F) * k2) >> 5).min(63);
                    a = a.max(dst_a);
                }
                self.color_buf[yi][xi] = rgb6(r, g, b, a);
                let mut attr = self.attr_buf[yi][xi];
                attr = (attr & !0x3F00) | (state.id + 1) << 8;
                if !poly.attr.fog_enabled() {
                    attr &= !ATTR_FOG;
                }
                self.attr_buf[yi][xi] = attr;
                if poly.attr.update_depth_translucent() {
                    self.depth_buf[yi][xi] = depth;
                }
            } else {
                self.color_buf[yi][xi] = rgb6(r, g, b, a);
                self.depth_buf[yi][xi] = depth;
                let mut attr = state.id;
                if poly.attr.fog_enabled() {
                    attr |= ATTR_FOG;
                }
                if is_edge {
                    attr |= ATTR_EDGE;
                }
                self.attr_buf[yi][xi] = attr;
            }
        }
    }

    /// Edge marking, fog and the anti-alias resolve, applied once per frame.
    fn apply_frame_effects(&mut self) {
        let disp = self.current.disp_control;

        if disp.edge_marking() {
            let clear_id = self.current.clear_color >> 24 & 0x3F;
            for y in 0..192usize {
                for x in 0..256usize {
                    let attr = self.attr_buf[y][x];
                    if attr & ATTR_EDGE == 0 {
                        continue;
                    }
                    let id = attr & 0x3F;
                    let depth = self.depth_buf[y][x];
                    let mut marked = false;
                    for (nx, ny) in [
                        (x.wrapping_sub(1), y),
                        (x + 1, y),
                        (x, y.wrapping_sub(1)),
                        (x, y + 1),
                    ] {
                        let (n_id, n_depth) = if nx < 256 && ny < 192 {
                            (self.attr_buf[ny][nx] & 0x3F, self.depth_buf[ny][nx])
                        } else {
                            (clear_id, i32::MAX)
                        };
                        if n_id != id && depth < n_depth {
                            marked = true;
                            break;
                        }
                    }
                    if marked {
                        let edge = self.current.edge_color[(id >> 3) as usize] as u32;
                        let a = self.color_buf[y][x] >> 24 & 0x1F;
                        self.color_buf[y][x] =
                            rgb6(expand5(edge), expand5(edge >> 5), expand5(edge >> 10), a);
                    }
                }
            }
        }

        if disp.fog_enabled() {
            let shift = disp.fog_depth_shift() as u32;
            let step = if shift < 11 { 0x400u32 >> shift } else { 1 };
            let offset = self.current.fog_offset as i32;
            let fog = self.current.fog_color;
            let (fr, fg, fb) = (expand5(fog), expand5(fog >> 5), expand5(fog >> 10));
            let fa = fog >> 16 & 0x1F;
            let alpha_only = disp.fog_alpha_only();

            for y in 0..192usize {
                for x in 0..256usize {
                    if self.attr_buf[y][x] & ATTR_FOG == 0 {
                        continue;
                    }
                    let z15 = self.depth_buf[y][x] >> 9;
                    let delta = z15 - offset;
                    let density = if delta <= 0 {
                        self.current.fog_table[0] as u32
                    } else {
                        let index = (delta as u32 / step).min(31) as usize;
                        self.current.fog_table[index] as u32
                    }
                    .min(128);

                    let c = self.color_buf[y][x];
                    let (r, g, b, a) = (c & 0x3F, c >> 8 & 0x3F, c >> 16 & 0x3F, c >> 24 & 0x1F);
                    let blended_a = (fa * density + a * (128 - density)) >> 7;
                    self.color_buf[y][x] = if alpha_only {
                        rgb6(r, g, b, blended_a)
                    } else {
                        rgb6(
                            (fr * density + r * (128 - density)) >> 7,
                            (fg * density + g * (128 - density)) >> 7,
                            (fb * density + b * (128 - density)) >> 7,
                            blended_a,
                        )
                    };
                }
            }
        }

        if disp.anti_aliasing() {
            // Edge pixels resolve to half coverage
            for y in 0..192usize {
                for x in 0..256usize {
                    if self.attr_buf[y][x] & ATTR_EDGE != 0 {
                        let c = self.color_buf[y][x];
                        let a = c >> 24 & 0x1F;
                        self.color_buf[y][x] = (c & 0x00FF_FFFF) | (a >> 1) << 24;
                    }
                }
            }
        }
    }
}

fn sort_key(poly: &Polygon, vtxs: &VertexRam, manual_sort: bool) -> (u8, i32) {
    let start_y = poly.vtxs[..poly.num_vtxs as usize]
        .iter()
        .map(|&i| vtxs.vtxs[i as usize].sy)
        .min()
        .unwrap_or(0);
    if poly.translucent {
        (1, if manual_sort { 0 } else { start_y })
    } else {
        (0, start_y)
    }
}

fn setup_poly(poly: &Polygon, vtxs: &VertexRam) -> PolyState {
    let n = poly.num_vtxs as usize;
    let mut start = 0;
    let mut end = 0;
    let at = |i: usize| &vtxs.vtxs[poly.vtxs[i] as usize];
    for i in 1..n {
        let v = at(i);
        let s = at(start);
        let e = at(end);
        if v.sy < s.sy || (v.sy == s.sy && v.sx < s.sx) {
            start = i;
        }
        if v.sy > e.sy || (v.sy == e.sy && v.sx >= e.sx) {
            end = i;
        }
    }

    let start_y = at(start).sy;
    let mut end_y = at(end).sy;
    if start_y == end_y {
        end_y += 1;
    }

    let (next_l, next_r) = initial_neighbors(poly, start);
    let vtx_index = |i: usize| poly.vtxs[i] as usize;
    let left_slope = Slope::new(
        &vtxs.vtxs[..],
        vtx_index(start),
        vtx_index(next_l),
        poly.norm_w[start],
        poly.norm_w[next_l],
    );
    let right_slope = Slope::new(
        &vtxs.vtxs[..],
        vtx_index(start),
        vtx_index(next_r),
        poly.norm_w[start],
        poly.norm_w[next_r],
    );

    PolyState {
        start,
        end,
        left: next_l,
        right: next_r,
        left_slope,
        right_slope,
        start_y,
        end_y,
        id: poly.attr.id() as u32,
        shadow: poly.attr.mode() == 3,
    }
}

fn initial_neighbors(poly: &Polygon, start: usize) -> (usize, usize) {
    let n = poly.num_vtxs as usize;
    let mut next_l = (start + 1) % n;
    let mut next_r = (start + n - 1) % n;
    if poly.backface {
        core::mem::swap(&mut next_l, &mut next_r);
    }
    (next_l, next_r)
}

fn advance_slopes(poly: &Polygon, vtxs: &VertexRam, state: &mut PolyState, scanline: i32) {
    let n = poly.num_vtxs as usize;
    let at = |i: usize| &vtxs.vtxs[poly.vtxs[i] as usize];

    if at(state.start).sy == at(state.end).sy {
        // Single-line polygon: walk it with vertical pseudo-edges
        state.left_slope = Slope::vertical(&vtxs.vtxs[..], poly.vtxs[state.start] as usize, 1);
        state.right_slope = Slope::vertical(&vtxs.vtxs[..], poly.vtxs[state.end] as usize, 1);
        return;
    }

    let step_fwd = |i: usize| (i + 1) % n;
    let step_back = |i: usize| (i + n - 1) % n;

    if at(state.left).sy == scanline {
        let mut curr = state.left;
        let mut next = state.left;
        while next != state.end && at(next).sy <= scanline {
            curr = next;
            next = if poly.backface {
                step_back(next)
            } else {
                step_fwd(next)
            };
        }
        if next != curr {
            state.left_slope = Slope::new(
                &vtxs.vtxs[..],
                poly.vtxs[curr] as usize,
                poly.vtxs[next] as usize,
                poly.norm_w[curr],
                poly.norm_w[next],
            );
            state.left = next;
        }
    }
    if at(state.right).sy == scanline {
        let mut curr = state.right;
        let mut next = state.right;
        while next != state.end && at(next).sy <= scanline {
            curr = next;
            next = if poly.backface {
                step_fwd(next)
            } else {
                step_back(next)
            };
        }
        if next != curr {
            state.right_slope = Slope::new(
                &vtxs.vtxs[..],
                poly.vtxs[curr] as usize,
                poly.vtxs[next] as usize,
                poly.norm_w[curr],
                poly.norm_w[next],
            );
            state.right = next;
        }
    }
}

fn combine_texture(
    mode: u8,
    disp: Disp3dControl,
    (vr, vg, vb, va): (u32, u32, u32, u32),
    (tr, tg, tb, ta): (u32, u32, u32, u32),
) -> (u32, u32, u32, u32) {
    match mode {
        // Decal
        1 => {
            let blend = |t: u32, v: u32| (t * ta + v * (31 - ta)) / 31;
            (blend(tr, vr), blend(tg, vg), blend(tb, vb), va)
        }
        // Modulation (also toon/highlight after table lookup)
        _ => {
            let _ = disp;
            (
                ((tr + 1) * (vr + 1) - 1) >> 6,
                ((tg + 1) * (vg + 1) - 1) >> 6,
                ((tb + 1) * (vb + 1) - 1) >> 6,
                ((ta + 1) * (va + 1) - 1) >> 5,
            )
        }
    }
}

/// Sample the polygon's texture at 1.11.4 fixed-point coordinates.
/// Returns None for fully transparent texels.
fn sample_texture(vram: &Vram, poly: &Polygon, s: i32, t: i32) -> Option<(u32, u32, u32, u32)> {
    let param = poly.tex_param;
    let width = 8i32 << param.size_shift_s();
    let height = 8i32 << param.size_shift_t();

    let wrap = |coord: i32, size: i32, repeat: bool, flip: bool| -> i32 {
        let mut c = coord >> 4;
        if repeat {
            let mask = size - 1;
            if flip && c & size != 0 {
                c = mask - (c & mask);
            } else {
                c &= mask;
            }
        } else {
            c = c.clamp(0, size - 1);
        }
        c
    };

    let u = wrap(s, width, param.repeat_s(), param.flip_s());
    let v = wrap(t, height, param.repeat_t(), param.flip_t());
    let texel_index = (v * width + u) as u32;
    let base = (param.vram_offset() as u32) << 3;
    let palette_base = poly.palette_base;

    match param.format() {
        // A3I5: 5-bit index, 3-bit alpha
        1 => {
            let data = vram.read_texture::<u8>(base + texel_index) as u32;
            let index = data & 0x1F;
            let alpha = data >> 5;
            let color = vram.read_texture_palette((palette_base << 4) + index * 2);
            Some(color_with_alpha(color, (alpha << 2) + (alpha >> 1)))
        }
        // 4-color palette
        2 => {
            let data = vram.read_texture::<u8>(base + texel_index / 4) as u32;
            let index = data >> ((texel_index & 3) << 1) & 3;
            if index == 0 && param.color_0_transparent() {
                return None;
            }
            let color = vram.read_texture_palette((palette_base << 3) + index * 2);
            Some(color_with_alpha(color, 31))
        }
        // 16-color palette
        3 => {
            let data = vram.read_texture::<u8>(base + texel_index / 2) as u32;
            let index = data >> ((texel_index & 1) << 2) & 0xF;
            if index == 0 && param.color_0_transparent() {
                return None;
            }
            let color = vram.read_texture_palette((palette_base << 4) + index * 2);
            Some(color_with_alpha(color, 31))
        }
        // 256-color palette
        4 => {
            let index = vram.read_texture::<u8>(base + texel_index) as u32;
            if index == 0 && param.color_0_transparent() {
                return None;
            }
            let color = vram.read_texture_palette((palette_base << 4) + index * 2);
            Some(color_with_alpha(color, 31))
        }
        // 4x4 compressed blocks
        5 => {
            let blocks_per_row = (width >> 2) as u32;
            let block = (v as u32 >> 2) * blocks_per_row + (u as u32 >> 2);
            let data_addr = base + block * 4 + (v as u32 & 3);
            let row = vram.read_texture::<u8>(data_addr) as u32;
            let index = row >> ((u as u32 & 3) << 1) & 3;

            let slot1_addr = 0x2_0000
                + (data_addr & 0x1_FFFF) / 2
                + if data_addr >= 0x4_0000 { 0x1_0000 } else { 0 };
            let pal_info = vram.read_texture::<u16>(slot1_addr & !1) as u32;
            let pal_offset = (palette_base << 4) + (pal_info & 0x3FFF) * 4;
            let blend_mode = pal_info >> 14;

            let color_at =
                |i: u32| -> (u32, u32, u32) { split_rgb5(vram.read_texture_palette(pal_offset + i * 2)) };

            let (r, g, b, a) = match (index, blend_mode) {
                (0, _) => {
                    let (r, g, b) = color_at(0);
                    (r, g, b, 31)
                }
                (1, _) => {
                    let (r, g, b) = color_at(1);
                    (r, g, b, 31)
                }
                (2, 0 | 2) => {
                    let (r, g, b) = color_at(2);
                    (r, g, b, 31)
                }
                (2, _) => {
                    let (r0, g0, b0) = color_at(0);
                    let (r1, g1, b1) = color_at(1);
                    if blend_mode == 1 {
                        ((r0 + r1) / 2, (g0 + g1) / 2, (b0 + b1) / 2, 31)
                    } else {
                        (
                            (r0 * 5 + r1 * 3) / 8,
                            (g0 * 5 + g1 * 3) / 8,
                            (b0 * 5 + b1 * 3) / 8,
                            31,
                        )
                    }
                }
                (_, 2) => {
                    let (r, g, b) = color_at(3);
                    (r, g, b, 31)
                }
                (_, 3) => {
                    let (r0, g0, b0) = color_at(0);
                    let (r1, g1, b1) = color_at(1);
                    (
                        (r0 * 3 + r1 * 5) / 8,
                        (g0 * 3 + g1 * 5) / 8,
                        (b0 * 3 + b1 * 5) / 8,
                        31,
                    )
                }
                _ => return None,
            };
            Some((r, g, b, a))
        }
        // A5I3: 3-bit index, 5-bit alpha
        6 => {
            let data = vram.read_texture::<u8>(base + texel_index) as u32;
            let index = data & 7;
            let alpha = data >> 3;
            let color = vram.read_texture_palette((palette_base << 4) + index * 2);
            Some(color_with_alpha(color, alpha))
        }
        // Direct color
        _ => {
            let color = vram.read_texture::<u16>(base + texel_index * 2);
            if color & 1 << 15 == 0 {
                return None;
            }
            Some(color_with_alpha(color, 31))
        }
    }
}

#[inline]
fn split_rgb5(color: u16) -> (u32, u32, u32) {
    (
        expand5(color as u32),
        expand5(color as u32 >> 5),
        expand5(color as u32 >> 10),
    )
}

#[inline]
fn color_with_alpha(color: u16, alpha: u32) -> (u32, u32, u32, u32) {
    let (r, g, b) = split_rgb5(color);
    (r, g, b, alpha)
}
