use vigil_core::ResponseKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum GateState {
    #[default]
    Disarmed,
    Armed,
    Consumed,
}

/// Single-use latch resolving the input-vs-timeout race for one trial.
///
/// After `arm()`, exactly one of `capture` or `expire` succeeds; the other
/// observes the gate already consumed and reports `false`. The state
/// check-and-set is the first thing either path does, so a reentrant
/// caller can never latch twice.
#[derive(Debug, Default)]
pub struct ResponseGate {
    state: GateState,
    captured: Option<(ResponseKind, u64)>,
}

impl ResponseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate for a new trial, clearing any previous capture.
    pub fn arm(&mut self) {
        self.state = GateState::Armed;
        self.captured = None;
    }

    /// Close the gate without consuming it (abort path).
    pub fn disarm(&mut self) {
        self.state = GateState::Disarmed;
        self.captured = None;
    }

    /// Latch the first input while armed. Returns `true` exactly once per
    /// arming.
    pub fn capture(&mut self, kind: ResponseKind, at_ns: u64) -> bool {
        if self.state != GateState::Armed {
            return false;
        }
        self.state = GateState::Consumed;
        self.captured = Some((kind, at_ns));
        true
    }

    /// Latch the timeout path. Mutually exclusive with `capture`: whichever
    /// is delivered first wins.
    pub fn expire(&mut self) -> bool {
        if self.state != GateState::Armed {
            return false;
        }
        self.state = GateState::Consumed;
        true
    }

    /// Input captured during the current arming, if any.
    pub fn captured(&self) -> Option<(ResponseKind, u64)> {
        self.captured
    }

    pub fn is_armed(&self) -> bool {
        self.state == GateState::Armed
    }
}
