use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Interpreter tuning, loadable from a small TOML file. Every field has a
/// default so a missing file or a partial file both work.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Fixed game-step length in milliseconds.
    pub tick_ms: u32,
    /// Instructions one thread may execute in a single tick before it is
    /// forcibly rescheduled; bounds runaway scripts.
    pub instruction_budget: u32,
    /// When true, a runtime fault finishes only the offending thread; when
    /// false the fault aborts the whole interpreter run. Corruption faults
    /// always abort.
    pub isolate_faults: bool,
    /// TCP port for the inspection protocol.
    pub debug_port: u16,
    /// Instructions shown in each thread's forward disassembly window.
    pub disassembly_window: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            tick_ms: 16,
            instruction_budget: 10_000,
            isolate_faults: false,
            debug_port: 3001,
            disassembly_window: 5,
        }
    }
}

impl VmConfig {
    /// Read a config file, falling back to defaults when it is absent.
    /// A present-but-invalid file is an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(VmConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))
    }
}
