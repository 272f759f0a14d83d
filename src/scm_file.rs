use crate::error::ScriptFault;
use log::debug;

/// Size in bytes of the jump instruction that opens each header section:
/// a 16-bit opcode, a 1-byte type tag and a 32-bit target.
const JUMP_OP_SIZE: u32 = 2 + 1 + 4;

/// Offset of the jump target within such an instruction.
const JUMP_PARAM_SIZE: u32 = 2 + 1;

/// Length of one entry in the model-name table.
const MODEL_NAME_LEN: usize = 24;

/// Compilation targets a script container can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmTarget {
    None,
    LibertyCity,
    ViceCity,
    SanAndreas,
}

impl ScmTarget {
    fn from_byte(b: u8) -> Self {
        match b {
            0xC6 => ScmTarget::LibertyCity,
            0x6D => ScmTarget::ViceCity,
            0x73 => ScmTarget::SanAndreas,
            _ => ScmTarget::None,
        }
    }
}

/// An in-memory script container: the instruction buffer plus the tables
/// parsed out of its header sections. Read-only once loaded.
///
/// The container opens with three jump-shaped section headers. Walking them
/// yields the globals section, the model-name table and the mission table
/// (main size, largest mission size, then one start offset per mission).
#[derive(Debug)]
pub struct ScmFile {
    data: Vec<u8>,
    target: ScmTarget,
    models: Vec<String>,
    mission_offsets: Vec<u32>,
    main_size: u32,
    largest_mission_size: u32,
    global_section: u32,
    model_section: u32,
    mission_section: u32,
    code_section: u32,
}

impl ScmFile {
    /// Parse a script container from raw bytes.
    ///
    /// Fails with `CorruptFile` when the header walk or any table runs past
    /// the end of the buffer.
    pub fn load(data: Vec<u8>) -> Result<Self, ScriptFault> {
        let mut file = ScmFile {
            data,
            target: ScmTarget::None,
            models: Vec::new(),
            mission_offsets: Vec::new(),
            main_size: 0,
            largest_mission_size: 0,
            global_section: 0,
            model_section: 0,
            mission_section: 0,
            code_section: 0,
        };

        // Each section header is a jump instruction; the section proper
        // begins one byte past its 32-bit target. Declared offsets in a
        // damaged file can be anything, so every step is checked.
        let section_after = |raw: u32| {
            raw.checked_add(JUMP_OP_SIZE + 1)
                .ok_or_else(|| ScriptFault::CorruptFile("section offset overflows".to_string()))
        };

        file.target = ScmTarget::from_byte(
            file.read_u8(JUMP_OP_SIZE).map_err(corrupt("target byte"))?,
        );
        file.global_section = JUMP_OP_SIZE + 1;
        file.model_section = section_after(
            file.read_u32(JUMP_PARAM_SIZE)
                .map_err(corrupt("model section header"))?,
        )?;
        file.mission_section = section_after(
            file.read_u32(file.model_section - JUMP_OP_SIZE - 1 + JUMP_PARAM_SIZE)
                .map_err(corrupt("mission section header"))?,
        )?;
        file.code_section = file
            .read_u32(file.mission_section - JUMP_OP_SIZE - 1 + JUMP_PARAM_SIZE)
            .map_err(corrupt("code section header"))?;

        let model_count = file
            .read_u32(file.model_section)
            .map_err(corrupt("model count"))?;
        let mut at = file.model_section + 4;
        for _ in 0..model_count {
            let start = at as usize;
            let end = start + MODEL_NAME_LEN;
            if end > file.data.len() {
                return Err(ScriptFault::CorruptFile(
                    "model name table runs past end of file".to_string(),
                ));
            }
            let raw = &file.data[start..end];
            let name: String = raw
                .iter()
                .take_while(|&&c| c != 0)
                .map(|&c| c as char)
                .collect();
            file.models.push(name);
            at = end as u32;
        }

        let mut at = file.mission_section;
        file.main_size = file.read_u32(at).map_err(corrupt("main size"))?;
        at += 4;
        file.largest_mission_size = file
            .read_u32(at)
            .map_err(corrupt("largest mission size"))?;
        at += 4;
        let mission_count = file.read_u32(at).map_err(corrupt("mission count"))?;
        at += 4;
        for _ in 0..mission_count {
            file.mission_offsets
                .push(file.read_u32(at).map_err(corrupt("mission offset"))?);
            at += 4;
        }

        debug!(
            "loaded script container: {} bytes, {} models, {} missions, target {:?}",
            file.data.len(),
            file.models.len(),
            file.mission_offsets.len(),
            file.target
        );

        Ok(file)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn target(&self) -> ScmTarget {
        self.target
    }

    /// A referenced model name from the embedded name table.
    pub fn model_name(&self, index: usize) -> Option<&str> {
        self.models.get(index).map(String::as_str)
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Byte offsets usable as mission thread start addresses, in file order.
    pub fn mission_offsets(&self) -> &[u32] {
        &self.mission_offsets
    }

    pub fn main_size(&self) -> u32 {
        self.main_size
    }

    pub fn largest_mission_size(&self) -> u32 {
        self.largest_mission_size
    }

    pub fn global_section(&self) -> u32 {
        self.global_section
    }

    pub fn model_section(&self) -> u32 {
        self.model_section
    }

    pub fn mission_section(&self) -> u32 {
        self.mission_section
    }

    pub fn code_section(&self) -> u32 {
        self.code_section
    }

    /// Size in bytes of the globals section.
    pub fn globals_size(&self) -> u32 {
        self.model_section - self.global_section
    }

    fn slice(&self, offset: u32, len: usize) -> Result<&[u8], ScriptFault> {
        let start = offset as usize;
        let end = start.checked_add(len).unwrap_or(usize::MAX);
        if end > self.data.len() {
            return Err(ScriptFault::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            });
        }
        Ok(&self.data[start..end])
    }

    pub fn read_u8(&self, offset: u32) -> Result<u8, ScriptFault> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_i8(&self, offset: u32) -> Result<i8, ScriptFault> {
        Ok(self.read_u8(offset)? as i8)
    }

    pub fn read_u16(&self, offset: u32) -> Result<u16, ScriptFault> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&self, offset: u32) -> Result<i16, ScriptFault> {
        Ok(self.read_u16(offset)? as i16)
    }

    pub fn read_u32(&self, offset: u32) -> Result<u32, ScriptFault> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&self, offset: u32) -> Result<i32, ScriptFault> {
        Ok(self.read_u32(offset)? as i32)
    }
}

fn corrupt(what: &'static str) -> impl Fn(ScriptFault) -> ScriptFault {
    move |_| ScriptFault::CorruptFile(format!("truncated reading {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_scripts::build_container;

    #[test]
    fn parses_sections_and_tables() {
        let data = build_container(
            &["cheetah", "kuruma"],
            &[0x1000, 0x2000],
            16, // globals bytes
            &[],
        );
        let file = ScmFile::load(data).unwrap();

        assert_eq!(file.globals_size(), 16);
        assert_eq!(file.model_name(0), Some("cheetah"));
        assert_eq!(file.model_name(1), Some("kuruma"));
        assert_eq!(file.model_name(2), None);
        assert_eq!(file.mission_offsets(), &[0x1000, 0x2000]);
        assert_eq!(file.target(), ScmTarget::LibertyCity);
    }

    #[test]
    fn truncated_header_is_corrupt() {
        let err = ScmFile::load(vec![0x02, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ScriptFault::CorruptFile(_)));
    }

    #[test]
    fn model_table_past_eof_is_corrupt() {
        let mut data = build_container(&["cheetah"], &[], 8, &[]);
        // Claim far more models than the file holds.
        let model_section = {
            let file = ScmFile::load(data.clone()).unwrap();
            file.model_section() as usize
        };
        data[model_section..model_section + 4].copy_from_slice(&1000u32.to_le_bytes());
        let err = ScmFile::load(data).unwrap_err();
        assert!(matches!(err, ScriptFault::CorruptFile(_)));
    }

    #[test]
    fn reads_are_bounds_checked() {
        let data = build_container(&[], &[], 8, &[]);
        let len = data.len();
        let file = ScmFile::load(data).unwrap();
        let err = file.read_u32(len as u32).unwrap_err();
        assert!(matches!(err, ScriptFault::OutOfBounds { .. }));
    }
}
