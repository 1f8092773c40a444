//! Driving Render over a frame range.
//!
//! Every node reachable backward from the target renders once per frame,
//! after all of its producers. Results are memoised per frame so a
//! producer feeding several consumers renders once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, error, warn};
use rayon::prelude::*;

use super::connection::NodeId;
use super::node::{Node, NodeState};
use crate::abi::Status;
use crate::error::{HostError, Result};
use crate::image::{BitDepth, ImageBuffer, PixelComponents, RectD, RectI};
use crate::instance::Instance;
use crate::param::ClipMetadata;
use crate::property::keys;
use crate::util::timing::ScopedTimer;

const FRAME_EPSILON: f64 = 1e-9;

/// Most frames a single compute call may visit.
pub const MAX_FRAMES: usize = 1_000_000;

/// Inclusive range of frames, visited in `step` increments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl FrameRange {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || !step.is_finite() {
            return Err(HostError::InvalidFrameRange(format!("{} {} {}", start, end, step)));
        }
        if step <= 0.0 {
            return Err(HostError::InvalidFrameRange(format!("step must be positive, got {}", step)));
        }
        if end < start {
            return Err(HostError::InvalidFrameRange(format!("end {} is before start {}", end, start)));
        }
        let count = ((end - start) / step + FRAME_EPSILON).floor() + 1.0;
        if count > MAX_FRAMES as f64 {
            return Err(HostError::InvalidFrameRange(format!(
                "{} to {} by {} visits more than {} frames",
                start, end, step, MAX_FRAMES
            )));
        }
        Ok(Self { start, end, step })
    }

    pub fn single(frame: f64) -> Self {
        Self {
            start: frame,
            end: frame,
            step: 1.0,
        }
    }

    pub fn frame_count(&self) -> usize {
        let count = ((self.end - self.start) / self.step + FRAME_EPSILON).floor() as usize + 1;
        count.min(MAX_FRAMES)
    }

    pub fn frames(&self) -> Vec<f64> {
        (0..self.frame_count()).map(|i| self.start + i as f64 * self.step).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputeOptions {
    /// Nodes rendered at once within a frame. 1 renders sequentially.
    pub workers: usize,
    /// Keep the target's image of every frame in the report.
    pub keep_outputs: bool,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            keep_outputs: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub node: NodeId,
    pub name: String,
    pub frame: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ComputeReport {
    /// Renders in the order they completed.
    pub renders: Vec<RenderRecord>,
    /// The target's image per frame, when requested.
    pub outputs: Vec<(f64, ImageBuffer)>,
}

impl ComputeReport {
    pub fn renders_of(&self, node: NodeId) -> usize {
        self.renders.iter().filter(|r| r.node == node).count()
    }
}

/// A node and the producers feeding its input clips.
pub(crate) struct PlannedNode {
    pub node: Arc<Node>,
    pub inputs: Vec<(String, NodeId)>,
}

impl PlannedNode {
    fn producers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().map(|(_, producer)| *producer)
    }
}

/// Nodes in dependency order, the target last.
pub(crate) struct ComputePlan {
    pub nodes: Vec<PlannedNode>,
    pub target: NodeId,
    pub project_size: [f64; 2],
    pub default_depth: BitDepth,
}

struct RenderedImage {
    image: ImageBuffer,
    metadata: ClipMetadata,
}

/// One slot per node for a single frame. The first caller renders; later
/// callers get the same result.
struct FrameMemo {
    slots: HashMap<NodeId, OnceLock<Option<Arc<RenderedImage>>>>,
    error: Mutex<Option<HostError>>,
}

impl FrameMemo {
    fn new(plan: &ComputePlan) -> Self {
        Self {
            slots: plan.nodes.iter().map(|n| (n.node.id(), OnceLock::new())).collect(),
            error: Mutex::new(None),
        }
    }

    fn get(&self, node: NodeId) -> Option<Arc<RenderedImage>> {
        self.slots.get(&node).and_then(|slot| slot.get().cloned().flatten())
    }

    fn get_or_render(
        &self,
        node: NodeId,
        render: impl FnOnce() -> Result<RenderedImage>,
    ) -> Option<Arc<RenderedImage>> {
        let slot = self.slots.get(&node)?;
        slot.get_or_init(|| match render() {
            Ok(image) => Some(Arc::new(image)),
            Err(e) => {
                let mut error = self.error.lock().unwrap_or_else(|p| p.into_inner());
                if error.is_none() {
                    *error = Some(e);
                }
                None
            }
        })
        .clone()
    }

    fn take_error(&self) -> Option<HostError> {
        self.error.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    fn failed(&self) -> bool {
        self.error.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }
}

impl ComputePlan {
    fn project_rect(&self) -> RectD {
        RectD::new(0.0, 0.0, self.project_size[0], self.project_size[1])
    }

    pub(crate) fn execute(&self, range: FrameRange, options: ComputeOptions) -> Result<ComputeReport> {
        let _timer = ScopedTimer::info(format!("Compute of {} frame(s)", range.frame_count()));

        let mut begun = Vec::with_capacity(self.nodes.len());
        let mut result = Ok(ComputeReport::default());
        for planned in &self.nodes {
            let outcome = planned
                .node
                .instance_mut()
                .begin_sequence_render(range.start, range.end, range.step);
            if let Err(e) = outcome {
                result = Err(e);
                break;
            }
            begun.push(planned.node.clone());
        }

        if let Ok(report) = result.as_mut() {
            let frames = self.render_frames(range, options, report);
            if let Err(e) = frames {
                result = Err(e);
            }
        }

        for node in begun {
            if let Err(e) = node.instance_mut().end_sequence_render(range.start, range.end, range.step) {
                warn!("EndSequenceRender failed on {}: {}", node.name(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if result.is_ok() {
            for planned in &self.nodes {
                planned.node.set_state(NodeState::Computed);
            }
        }
        result
    }

    fn render_frames(&self, range: FrameRange, options: ComputeOptions, report: &mut ComputeReport) -> Result<()> {
        let pool = if options.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(options.workers)
                    .build()
                    .map_err(|e| HostError::Unexpected(format!("cannot start render workers: {}", e)))?,
            )
        } else {
            None
        };

        for frame in range.frames() {
            let memo = FrameMemo::new(self);
            match &pool {
                Some(pool) => self.render_frame_parallel(pool, frame, &memo, report),
                None => self.render_frame_sequential(frame, &memo, report),
            }
            if let Some(e) = memo.take_error() {
                return Err(e);
            }
            if options.keep_outputs {
                if let Some(output) = memo.get(self.target) {
                    report.outputs.push((frame, output.image.clone()));
                }
            }
        }
        Ok(())
    }

    fn render_frame_sequential(&self, frame: f64, memo: &FrameMemo, report: &mut ComputeReport) {
        for planned in &self.nodes {
            if let Some(record) = self.render_planned(planned, frame, memo) {
                report.renders.push(record);
            }
            if memo.failed() {
                return;
            }
        }
    }

    /// Renders in waves: every node whose producers are done is eligible.
    fn render_frame_parallel(
        &self,
        pool: &rayon::ThreadPool,
        frame: f64,
        memo: &FrameMemo,
        report: &mut ComputeReport,
    ) {
        let mut done: HashSet<NodeId> = HashSet::new();
        while done.len() < self.nodes.len() {
            let ready: Vec<&PlannedNode> = self
                .nodes
                .iter()
                .filter(|n| !done.contains(&n.node.id()))
                .filter(|n| n.producers().all(|p| done.contains(&p)))
                .collect();
            if ready.is_empty() {
                break;
            }
            debug!("Frame {}: rendering {} node(s) in parallel", frame, ready.len());
            let records: Vec<Option<RenderRecord>> = pool.install(|| {
                ready
                    .par_iter()
                    .map(|planned| self.render_planned(planned, frame, memo))
                    .collect()
            });
            report.renders.extend(records.into_iter().flatten());
            if memo.failed() {
                return;
            }
            done.extend(ready.iter().map(|n| n.node.id()));
        }
    }

    fn render_planned(&self, planned: &PlannedNode, frame: f64, memo: &FrameMemo) -> Option<RenderRecord> {
        let mut inputs = Vec::with_capacity(planned.inputs.len());
        for (clip, producer) in &planned.inputs {
            inputs.push((clip.as_str(), memo.get(*producer)?));
        }
        let mut rendered = false;
        memo.get_or_render(planned.node.id(), || {
            rendered = true;
            self.render_node(&planned.node, frame, &inputs)
        })?;
        rendered.then(|| RenderRecord {
            node: planned.node.id(),
            name: planned.node.name().to_string(),
            frame,
        })
    }

    fn render_node(&self, node: &Node, frame: f64, inputs: &[(&str, Arc<RenderedImage>)]) -> Result<RenderedImage> {
        let _timer = ScopedTimer::debug_lazy(|| format!("Render of {} at frame {}", node.name(), frame));
        let result = self.try_render_node(node, frame, inputs);
        if let Err(e) = &result {
            error!("Render of {} failed at frame {}: {}", node.name(), frame, e);
        }
        result
    }

    fn try_render_node(&self, node: &Node, frame: f64, inputs: &[(&str, Arc<RenderedImage>)]) -> Result<RenderedImage> {
        let mut instance = node.instance_mut();

        let default_rod = inputs
            .iter()
            .map(|(_, input)| input.metadata.region_of_definition)
            .reduce(RectD::union)
            .unwrap_or_else(|| self.project_rect());
        let rod = instance.region_of_definition(frame, default_rod)?;
        let window = RectI::pixel_window(rod).ok_or_else(|| HostError::InvalidRegionOfDefinition {
            node: node.name().to_string(),
            frame,
            rod: rod.to_array(),
        })?;

        let supported = instance
            .output_clip()
            .map(|clip| clip.supported_components())
            .unwrap_or_default();
        let input_components = inputs.first().map(|(_, input)| input.metadata.components);
        let components = match input_components {
            Some(c) if supported.is_empty() || supported.contains(&c) => c,
            _ => supported.first().copied().unwrap_or(PixelComponents::Rgba),
        };
        let depth = inputs
            .first()
            .map(|(_, input)| input.metadata.depth)
            .unwrap_or(self.default_depth);

        let metadata = ClipMetadata {
            region_of_definition: rod,
            components,
            depth,
        };
        let mut image = ImageBuffer::new(window, components, depth);

        let status = render_with_images(&mut instance, inputs, &mut image, &metadata, frame, window);

        // Pointers must not outlive the buffers, whatever happened above.
        let clip_names: Vec<String> = instance.clips().iter().map(|c| c.name().to_string()).collect();
        for name in clip_names {
            if let Some(clip) = instance.clip_mut(&name) {
                if let Err(e) = clip.detach() {
                    warn!("Cannot detach clip {} of {}: {}", name, node.name(), e);
                }
            }
        }

        status.map_err(|e| match e {
            HostError::ActionFailed { status, .. } => HostError::RenderActionFailed {
                node: node.name().to_string(),
                frame,
                status,
            },
            other => other,
        })?;
        Ok(RenderedImage { image, metadata })
    }
}

fn render_with_images(
    instance: &mut Instance,
    inputs: &[(&str, Arc<RenderedImage>)],
    image: &mut ImageBuffer,
    metadata: &ClipMetadata,
    frame: f64,
    window: RectI,
) -> Result<Status> {
    for (clip, input) in inputs {
        if let Some(clip) = instance.clip_mut(clip) {
            clip.attach(&input.image, &input.metadata)?;
        }
    }
    if let Some(output) = instance.clip_mut(keys::OUTPUT_CLIP) {
        output.attach_output(image, metadata)?;
    }
    instance.render(frame, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_inclusive() {
        let range = FrameRange::new(0.0, 2.0, 0.5).unwrap();
        assert_eq!(range.frames(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(FrameRange::single(7.0).frames(), vec![7.0]);
        assert_eq!(FrameRange::new(1.0, 2.5, 1.0).unwrap().frames(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            FrameRange::new(5.0, 1.0, 1.0),
            Err(HostError::InvalidFrameRange(_))
        ));
        assert!(FrameRange::new(0.0, 1.0, 0.0).is_err());
        assert!(FrameRange::new(f64::NAN, 1.0, 1.0).is_err());
        assert!(matches!(
            FrameRange::new(0.0, 1.0, 1e-12),
            Err(HostError::InvalidFrameRange(_))
        ));
        assert_eq!(FrameRange::new(0.0, 999_999.0, 1.0).unwrap().frame_count(), MAX_FRAMES);
    }
}
