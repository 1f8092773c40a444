use std::fmt;

/// What a run produced. `main` is the only place that acts on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Help, listings or node details to print before exiting.
    Display(String),
    Rendered(RenderSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub target: String,
    pub first_frame: f64,
    pub last_frame: f64,
    pub frames: usize,
    pub renders: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for RenderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Computed {} over frames {}..{}: {} frame(s), {} render(s) in {} ms",
            self.target, self.first_frame, self.last_frame, self.frames, self.renders, self.elapsed_ms
        )
    }
}
