//! The machine code buffer (component B): a growable byte vector plus the
//! relocation-patching primitive every branch/short-circuit fixup site
//! eventually calls through.

#[derive(Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn push_u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn push_bytes(&mut self, bs: &[u8]) {
        self.bytes.extend_from_slice(bs);
    }

    pub fn push_i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f64(&mut self, v: f64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Reserve a 4-byte placeholder for a `rel32` displacement, returning
    /// the jump site (the offset of the placeholder itself, matching how
    /// `ir::fixup::BranchStacks` records jump sites).
    pub fn push_rel32_placeholder(&mut self) -> usize {
        let site = self.offset();
        self.push_i32(0);
        site
    }

    /// Patch a previously reserved `rel32` so the jump at `site` lands at
    /// `target`. The displacement is relative to the byte immediately
    /// after the 4-byte immediate, matching every x86-64 near-jump/call
    /// encoding.
    pub fn patch_rel32(&mut self, site: usize, target: usize) {
        let next_instr = site + 4;
        let disp = target as i64 - next_instr as i64;
        let disp = i32::try_from(disp).expect("branch target out of rel32 range");
        self.bytes[site..site + 4].copy_from_slice(&disp.to_le_bytes());
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel32_patches_relative_to_instruction_end() {
        let mut buf = CodeBuffer::new();
        buf.push_u8(0xE9); // jmp rel32
        let site = buf.push_rel32_placeholder();
        for _ in 0..10 {
            buf.push_u8(0x90); // nop padding
        }
        let target = buf.offset();
        buf.patch_rel32(site, target);
        let disp = i32::from_le_bytes(buf.as_slice()[site..site + 4].try_into().unwrap());
        assert_eq!(disp, 10);
    }
}
