pub const KEY_COUNT: usize = 16;

/// Hex keypad state, 0x0..=0xF. The host maps its own input events onto
/// these codes and calls `press`/`release`.
#[derive(Debug, Default, Clone)]
pub struct Keyboard {
    keys: [bool; KEY_COUNT],
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.keys = [false; KEY_COUNT];
    }

    /// codes outside the keypad are ignored
    pub fn press(&mut self, code: u8) {
        if let Some(key) = self.keys.get_mut(code as usize) {
            *key = true;
        }
    }

    pub fn release(&mut self, code: u8) {
        if let Some(key) = self.keys.get_mut(code as usize) {
            *key = false;
        }
    }

    /// register values are masked down to the low nibble
    pub fn is_pressed(&self, code: u8) -> bool {
        self.keys[(code & 0xF) as usize]
    }

    /// lowest-numbered key that is down
    pub fn first_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|k| *k).map(|code| code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut kb = Keyboard::new();
        kb.press(0xA);
        assert!(kb.is_pressed(0xA));
        kb.release(0xA);
        assert!(!kb.is_pressed(0xA));
    }

    #[test]
    fn first_pressed_scans_upward() {
        let mut kb = Keyboard::new();
        assert_eq!(kb.first_pressed(), None);
        kb.press(0xC);
        kb.press(0x3);
        assert_eq!(kb.first_pressed(), Some(0x3));
        kb.reset();
        assert_eq!(kb.first_pressed(), None);
    }

    #[test]
    fn out_of_range_codes_ignored() {
        let mut kb = Keyboard::new();
        kb.press(0x10);
        kb.press(0xFF);
        assert_eq!(kb.first_pressed(), None);
    }
}
