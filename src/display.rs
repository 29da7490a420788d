pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Pixel-surface contract. The emulator hands over the whole grid every
/// time it changes; how it gets on screen is up to the host.
pub trait Screen {
    fn present(&mut self, fb: &FrameBuffer);
}

/// 64x32 monochrome pixel grid, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    bit_buffer: [[bool; WIDTH]; HEIGHT],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            bit_buffer: [[false; WIDTH]; HEIGHT],
        }
    }

    pub fn clear_buffer(&mut self) {
        self.bit_buffer = [[false; WIDTH]; HEIGHT];
    }

    /// `false` for anything off the grid
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bit_buffer
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    pub fn rows(&self) -> &[[bool; WIDTH]; HEIGHT] {
        &self.bit_buffer
    }

    pub fn lit_count(&self) -> usize {
        self.bit_buffer.iter().flatten().filter(|p| **p).count()
    }

    /// XOR an 8-wide sprite onto the grid with its top-left corner at (x, y).
    /// Pixels that land off the grid are dropped, not wrapped. Returns true
    /// if any lit pixel was hit.
    pub fn paint(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        log::debug!("painting sprite at ({x}, {y}): {sprite:02x?}");
        let mut collision = false;
        for (i, row) in sprite.iter().enumerate() {
            let ny = y as usize + i;
            if ny >= HEIGHT {
                continue;
            }
            for j in 0..8 {
                let nx = x as usize + j;
                if (row >> (7 - j)) & 1 == 0 || nx >= WIDTH {
                    continue;
                }
                let pixel = &mut self.bit_buffer[ny][nx];
                collision |= *pixel;
                *pixel = !*pixel;
            }
        }
        collision
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.bit_buffer {
            let line: String = row.iter().map(|p| if *p { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
