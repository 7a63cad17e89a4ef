use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{Result, SegmentError};
use crate::models::{LabelImage, LabelVolume, Stack};
use crate::params::ParameterVector;
use crate::pipeline::Pipeline;

/// Segment every frame of a stack.
///
/// `parallel` only changes scheduling; both modes return identical volumes.
pub fn segment_stack(stack: &Stack, params: &ParameterVector, parallel: bool) -> Result<LabelVolume> {
    let segmenter = StackSegmenter::new(stack, *params);
    if parallel {
        segmenter.run_parallel(|_, _| {})
    } else {
        segmenter.run(|_, _| {})
    }
}

/// Shared flag that stops dispatch of frames not yet started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the pipeline over a stack, writing into a pre-allocated volume.
///
/// Can be stepped one frame at a time (for progress reporting between
/// frames) or run to completion.
pub struct StackSegmenter<'a> {
    stack: &'a Stack,
    params: ParameterVector,
    pipeline: Pipeline,
    volume: LabelVolume,
    next: usize,
    cancel: CancelToken,
}

impl<'a> StackSegmenter<'a> {
    pub fn new(stack: &'a Stack, params: ParameterVector) -> Self {
        let (width, height) = stack.dimensions();
        Self {
            stack,
            params,
            pipeline: Pipeline::standard(),
            volume: LabelVolume::zeros(stack.len(), width, height),
            next: 0,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the default pipeline, e.g. one with debug output enabled.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn total(&self) -> usize {
        self.stack.len()
    }

    pub fn completed(&self) -> usize {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.stack.len()
    }

    /// Segment the next frame. Returns its index, or `None` once every
    /// frame has been processed.
    pub fn step(&mut self) -> Result<Option<usize>> {
        if self.is_done() {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(SegmentError::Cancelled {
                completed: self.next,
            });
        }

        let index = self.next;
        let labels = segment_indexed(&self.pipeline, self.stack, index, &self.params)?;
        self.volume.set(index, labels)?;
        self.next += 1;
        Ok(Some(index))
    }

    /// Run the remaining frames in order, calling `progress(completed, total)`
    /// after each one.
    pub fn run(mut self, mut progress: impl FnMut(usize, usize)) -> Result<LabelVolume> {
        let total = self.total();
        while let Some(index) = self.step()? {
            info!("segmented frame {}/{}", index + 1, total);
            progress(self.next, total);
        }
        Ok(self.volume)
    }

    /// Run the remaining frames across the rayon pool. Results are gathered
    /// in frame order; any frame failure fails the whole batch.
    pub fn run_parallel(self, progress: impl Fn(usize, usize) + Sync) -> Result<LabelVolume> {
        let total = self.total();
        let start = self.next;
        let done = AtomicUsize::new(start);
        let began = Instant::now();

        debug!(
            "dispatching {} frames over {} threads",
            total - start,
            rayon::current_num_threads()
        );

        let results: Result<Vec<LabelImage>> = (start..total)
            .into_par_iter()
            .map(|index| {
                if self.cancel.is_cancelled() {
                    return Err(SegmentError::Cancelled {
                        completed: done.load(Ordering::SeqCst),
                    });
                }
                let labels = segment_indexed(&self.pipeline, self.stack, index, &self.params)?;
                let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                info!("segmented frame {}/{}", index + 1, total);
                progress(completed, total);
                Ok(labels)
            })
            .collect();

        let mut volume = self.volume;
        for (offset, labels) in results?.into_iter().enumerate() {
            volume.set(start + offset, labels)?;
        }
        debug!("parallel batch finished in {:.2?}", began.elapsed());
        Ok(volume)
    }

    /// Take the volume as filled so far.
    pub fn into_volume(self) -> LabelVolume {
        self.volume
    }
}

fn segment_indexed(
    pipeline: &Pipeline,
    stack: &Stack,
    index: usize,
    params: &ParameterVector,
) -> Result<LabelImage> {
    let frame = stack.frame(index)?;
    pipeline
        .run(frame, index, params)
        .and_then(|artifacts| artifacts.into_labels())
        .map_err(|source| SegmentError::Frame {
            index,
            source: Box::new(source),
        })
}
