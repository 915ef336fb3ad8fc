use crate::cli::ProgressArgs;

/// How far above the container's top edge the reading window opens.
pub const LEAD_IN: f64 = 120.0;

pub fn run(args: ProgressArgs) -> anyhow::Result<()> {
    let geometry = ContainerGeometry::new(args.container_top, args.container_height);
    let progress = compute_reading_progress(geometry, args.viewport_height, args.scroll_y);
    tracing::debug!(?geometry, scroll_y = args.scroll_y, progress, "computed reading progress");
    println!("{progress}");
    Ok(())
}

/// Measured position of a rendered document container.
///
/// `top` is the scroll offset at which the container's top edge reaches the
/// top of the viewport (element rect top plus the scroll offset at measure time).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerGeometry {
    pub top: f64,
    pub height: f64,
}

impl ContainerGeometry {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }
}

/// Fraction of the container read so far, clamped to `[0, 1]`.
///
/// The window starts `LEAD_IN` before the container's top and ends when its
/// bottom lines up with the bottom of the viewport. Short containers get a
/// denominator of 1 instead of zero or a negative span.
pub fn compute_reading_progress(
    geometry: ContainerGeometry,
    viewport_height: f64,
    scroll_y: f64,
) -> f64 {
    let start = geometry.top - LEAD_IN;
    let end = start + geometry.height - viewport_height;
    let span = (end - start).max(1.0);
    let raw = (scroll_y - start) / span;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

/// Per-view progress state: cached geometry plus the last computed value.
///
/// Scroll handling is arithmetic only; re-measuring happens through
/// [`ReadingTracker::remeasure`] when layout or content changes.
#[derive(Debug, Clone)]
pub struct ReadingTracker {
    geometry: ContainerGeometry,
    viewport_height: f64,
    progress: f64,
}

impl ReadingTracker {
    /// Attaches to a freshly measured container and computes the initial value.
    pub fn attach(geometry: ContainerGeometry, viewport_height: f64, scroll_y: f64) -> Self {
        let mut tracker = Self {
            geometry,
            viewport_height,
            progress: 0.0,
        };
        tracker.on_scroll(scroll_y);
        tracker
    }

    pub fn on_scroll(&mut self, scroll_y: f64) -> f64 {
        self.progress = compute_reading_progress(self.geometry, self.viewport_height, scroll_y);
        self.progress
    }

    pub fn remeasure(
        &mut self,
        geometry: ContainerGeometry,
        viewport_height: f64,
        scroll_y: f64,
    ) -> f64 {
        self.geometry = geometry;
        self.viewport_height = viewport_height;
        self.on_scroll(scroll_y)
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn geometry(&self) -> ContainerGeometry {
        self.geometry
    }
}
