use log::debug;

/// Message display styles used by the text-printing opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Big,
    HighPriority,
    BigLowPriority,
}

/// The world the scripts act on.
///
/// Opcode handlers are leaves that call into this collaborator; everything
/// behind it (rendering, physics, AI, audio) is outside the interpreter.
/// Query methods with defaults let a minimal world run scripts that never
/// touch the corresponding feature.
pub trait GameWorld: Send {
    /// Current in-game clock.
    fn hour(&self) -> i32;
    fn minute(&self) -> i32;
    fn set_time(&mut self, hour: i32, minute: i32);

    fn is_button_pressed(&self, player: i32, button: i32) -> bool;

    /// Whether the wait-skip control is held, waking skippable sleeps early.
    fn wait_skip_pressed(&self) -> bool {
        false
    }

    /// Whether the player is currently dead or under arrest. Mission threads
    /// checking for this reset to their outermost frame when it turns true.
    fn is_player_wasted_or_busted(&self) -> bool {
        false
    }

    /// Mission cleanup: release mission-owned objects and clear the
    /// on-mission flag.
    fn mission_over(&mut self);

    fn display_message(&mut self, id: &str, duration_ms: i32, style: i32, kind: MessageKind);
    fn clear_messages(&mut self);

    /// Ask for a model to be streamed in. `name` is resolved from the
    /// script's model-name table when the id references it.
    fn request_model(&mut self, id: i32, name: Option<&str>);

    fn is_model_loaded(&self, id: i32) -> bool {
        true
    }
}

/// A world that records nothing and grants everything; used by tests and
/// the standalone interpreter binary.
#[derive(Debug, Default)]
pub struct NullWorld {
    hour: i32,
    minute: i32,
}

impl GameWorld for NullWorld {
    fn hour(&self) -> i32 {
        self.hour
    }

    fn minute(&self) -> i32 {
        self.minute
    }

    fn set_time(&mut self, hour: i32, minute: i32) {
        self.hour = hour;
        self.minute = minute;
    }

    fn is_button_pressed(&self, _player: i32, _button: i32) -> bool {
        false
    }

    fn mission_over(&mut self) {
        debug!("mission over");
    }

    fn display_message(&mut self, id: &str, duration_ms: i32, style: i32, kind: MessageKind) {
        debug!("message {id:?} for {duration_ms}ms style {style} ({kind:?})");
    }

    fn clear_messages(&mut self) {}

    fn request_model(&mut self, id: i32, name: Option<&str>) {
        debug!("model requested: {id} ({name:?})");
    }
}
