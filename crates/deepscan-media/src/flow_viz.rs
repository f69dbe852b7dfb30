//! Optical flow visualization with the Middlebury color wheel.
//!
//! Direction maps to hue, magnitude to saturation. Flow is normalized by the
//! largest vector in the field so every image uses the full range.

const RY: usize = 15;
const YG: usize = 6;
const GC: usize = 4;
const CB: usize = 11;
const BM: usize = 13;
const MR: usize = 6;

/// Number of hues in the wheel.
pub const COLORWHEEL_SIZE: usize = RY + YG + GC + CB + BM + MR;

/// Dense 2-channel flow field, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub width: usize,
    pub height: usize,
    /// Horizontal displacement per pixel
    pub u: Vec<f32>,
    /// Vertical displacement per pixel
    pub v: Vec<f32>,
}

impl FlowField {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            u: vec![0.0; width * height],
            v: vec![0.0; width * height],
        }
    }

    /// Build from a planar `[2, H, W]` buffer.
    pub fn from_planar(data: &[f32], width: usize, height: usize) -> Option<Self> {
        let plane = width * height;
        if data.len() < plane * 2 {
            return None;
        }
        Some(Self {
            width,
            height,
            u: data[..plane].to_vec(),
            v: data[plane..plane * 2].to_vec(),
        })
    }

    /// Copy out a `w × h` window starting at `(x, y)`.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> Self {
        let mut out = Self::zeros(w, h);
        for row in 0..h.min(self.height.saturating_sub(y)) {
            let src = (y + row) * self.width + x;
            let len = w.min(self.width.saturating_sub(x));
            out.u[row * w..row * w + len].copy_from_slice(&self.u[src..src + len]);
            out.v[row * w..row * w + len].copy_from_slice(&self.v[src..src + len]);
        }
        out
    }

    pub fn max_magnitude(&self) -> f32 {
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| (u * u + v * v).sqrt())
            .fold(0.0, f32::max)
    }
}

/// RGB color wheel, 55 entries.
pub fn make_colorwheel() -> Vec<[u8; 3]> {
    let ramp = |i: usize, n: usize| (255.0 * i as f64 / n as f64).floor() as u8;
    let mut wheel = Vec::with_capacity(COLORWHEEL_SIZE);

    for i in 0..RY {
        wheel.push([255, ramp(i, RY), 0]);
    }
    for i in 0..YG {
        wheel.push([255 - ramp(i, YG), 255, 0]);
    }
    for i in 0..GC {
        wheel.push([0, 255, ramp(i, GC)]);
    }
    for i in 0..CB {
        wheel.push([0, 255 - ramp(i, CB), 255]);
    }
    for i in 0..BM {
        wheel.push([ramp(i, BM), 0, 255]);
    }
    for i in 0..MR {
        wheel.push([255, 0, 255 - ramp(i, MR)]);
    }
    wheel
}

/// Color one already-normalized flow vector.
fn flow_color(u: f32, v: f32, wheel: &[[u8; 3]]) -> [u8; 3] {
    let ncols = wheel.len();
    let rad = (u * u + v * v).sqrt();
    let a = (-v).atan2(-u) / std::f32::consts::PI;
    let fk = (a + 1.0) / 2.0 * (ncols - 1) as f32;
    let k0 = (fk.floor() as usize).min(ncols - 1);
    let k1 = if k0 + 1 == ncols { 0 } else { k0 + 1 };
    let f = fk - k0 as f32;

    let mut rgb = [0u8; 3];
    for (ch, out) in rgb.iter_mut().enumerate() {
        let col0 = wheel[k0][ch] as f32 / 255.0;
        let col1 = wheel[k1][ch] as f32 / 255.0;
        let mut col = (1.0 - f) * col0 + f * col1;
        if rad <= 1.0 {
            col = 1.0 - rad * (1.0 - col);
        } else {
            col *= 0.75;
        }
        *out = (255.0 * col).floor().clamp(0.0, 255.0) as u8;
    }
    rgb
}

/// Render a flow field to interleaved RGB bytes.
pub fn flow_to_rgb(flow: &FlowField) -> Vec<u8> {
    let wheel = make_colorwheel();
    let norm = flow.max_magnitude() + 1e-5;

    let mut out = Vec::with_capacity(flow.u.len() * 3);
    for (u, v) in flow.u.iter().zip(&flow.v) {
        out.extend_from_slice(&flow_color(u / norm, v / norm, &wheel));
    }
    out
}

/// Render a flow field to interleaved BGR bytes, ready for OpenCV.
pub fn flow_to_bgr(flow: &FlowField) -> Vec<u8> {
    let mut out = flow_to_rgb(flow);
    for px in out.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorwheel_shape() {
        let wheel = make_colorwheel();
        assert_eq!(wheel.len(), 55);
        assert_eq!(wheel[0], [255, 0, 0]);
        assert_eq!(wheel[RY], [255, 255, 0]);
        assert_eq!(wheel[RY + YG], [0, 255, 0]);
        assert_eq!(wheel[RY + YG + GC + CB], [0, 0, 255]);
        assert_eq!(wheel[54], [255, 0, 255 - 212]);
    }

    #[test]
    fn test_zero_flow_is_white() {
        let flow = FlowField::zeros(2, 2);
        assert!(flow_to_rgb(&flow).iter().all(|&b| b == 255));
    }

    #[test]
    fn test_strongest_vector_is_saturated() {
        let mut flow = FlowField::zeros(2, 1);
        flow.u[1] = -10.0;
        let rgb = flow_to_rgb(&flow);
        // Still-pixel stays white.
        assert_eq!(&rgb[..3], &[255, 255, 255]);
        // Leftward motion lands on the cyan-blue segment of the wheel.
        assert_eq!(rgb[3], 0);
        assert_eq!(rgb[5], 255);
    }

    #[test]
    fn test_bgr_swaps_channels() {
        let mut flow = FlowField::zeros(1, 1);
        flow.u[0] = -1.0;
        let rgb = flow_to_rgb(&flow);
        let bgr = flow_to_bgr(&flow);
        assert_eq!(rgb[0], bgr[2]);
        assert_eq!(rgb[2], bgr[0]);
    }

    #[test]
    fn test_planar_and_crop() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let flow = FlowField::from_planar(&data, 3, 2).unwrap();
        assert_eq!(flow.u, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(flow.v[0], 6.0);

        let cropped = flow.crop(1, 1, 2, 1);
        assert_eq!(cropped.u, vec![4.0, 5.0]);
        assert_eq!(cropped.v, vec![10.0, 11.0]);

        assert!(FlowField::from_planar(&data[..5], 3, 2).is_none());
    }
}
