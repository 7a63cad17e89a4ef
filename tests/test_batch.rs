mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use common::*;
use nucleiseg::pipeline::{FrameArtifacts, PipelineStep};
use nucleiseg::segmentation::steps::*;
use nucleiseg::{CancelToken, ChannelSet, StackSegmenter};

#[test]
fn test_identical_frames_give_identical_labels() -> anyhow::Result<()> {
    let frame = two_nuclei_frame();
    let stack = Stack::new(vec![frame.clone(); 5])?;
    let params = bump_params().with(Param::MinSeparation, 3.0)?;

    for parallel in [false, true] {
        let volume = segment_stack(&stack, &params, parallel)?;
        assert_eq!(volume.len(), 5);

        let first = volume.get(0).expect("frame 0");
        assert_eq!(label_ids(first).len(), 2);
        for labels in volume.iter() {
            assert_eq!(labels, first);
        }
    }
    Ok(())
}

#[test]
fn test_parallel_matches_sequential() -> anyhow::Result<()> {
    let stack = drifting_stack(8);
    let params = bump_params().with(Param::MinSeparation, 3.0)?;

    let sequential = segment_stack(&stack, &params, false)?;
    let parallel = segment_stack(&stack, &params, true)?;

    assert_eq!(sequential.into_inner(), parallel.into_inner());
    Ok(())
}

#[test]
fn test_volume_matches_per_frame_segmentation() -> anyhow::Result<()> {
    let stack = drifting_stack(3);
    let params = bump_params();

    let volume = segment_stack(&stack, &params, false)?;

    for (i, frame) in stack.frames().iter().enumerate() {
        let expected = segment_frame(frame, &params)?;
        assert_eq!(volume.get(i), Some(&expected), "frame {i} differs");
    }
    Ok(())
}

#[test]
fn test_stepping_reports_each_frame() -> anyhow::Result<()> {
    let stack = drifting_stack(3);
    let mut segmenter = StackSegmenter::new(&stack, bump_params());

    assert_eq!(segmenter.total(), 3);
    assert_eq!(segmenter.step()?, Some(0));
    assert_eq!(segmenter.step()?, Some(1));
    assert_eq!(segmenter.completed(), 2);
    assert_eq!(segmenter.step()?, Some(2));
    assert!(segmenter.is_done());
    assert_eq!(segmenter.step()?, None);

    let volume = segmenter.into_volume();
    assert_eq!(volume.len(), 3);
    Ok(())
}

#[test]
fn test_progress_callback() -> anyhow::Result<()> {
    let stack = drifting_stack(4);

    // 1. Sequential: strictly increasing counts
    let mut seen = Vec::new();
    StackSegmenter::new(&stack, bump_params()).run(|done, total| seen.push((done, total)))?;
    assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);

    // 2. Parallel: one call per frame, ending at the total
    let calls = Mutex::new(Vec::new());
    StackSegmenter::new(&stack, bump_params())
        .run_parallel(|done, total| calls.lock().expect("lock").push((done, total)))?;
    let mut calls = calls.into_inner().expect("lock");
    calls.sort();
    assert_eq!(calls, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);

    Ok(())
}

#[test]
fn test_cancelled_batch_stops() -> anyhow::Result<()> {
    let stack = drifting_stack(4);

    for parallel in [false, true] {
        let cancel = CancelToken::new();
        cancel.cancel();
        let segmenter = StackSegmenter::new(&stack, bump_params()).with_cancel(cancel);

        let result = if parallel {
            segmenter.run_parallel(|_, _| {})
        } else {
            segmenter.run(|_, _| {})
        };
        assert!(matches!(result, Err(SegmentError::Cancelled { completed: 0 })));
    }
    Ok(())
}

#[test]
fn test_cancel_between_frames() -> anyhow::Result<()> {
    let stack = drifting_stack(4);
    let mut segmenter = StackSegmenter::new(&stack, bump_params());
    let cancel = segmenter.cancel_token();

    segmenter.step()?;
    cancel.cancel();

    match segmenter.step() {
        Err(SegmentError::Cancelled { completed }) => assert_eq!(completed, 1),
        other => panic!("expected cancellation, got {:?}", other),
    }
    Ok(())
}

/// Clip step that refuses one frame.
struct FailingClip {
    fail_on: usize,
    runs: AtomicUsize,
}

impl PipelineStep for FailingClip {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> nucleiseg::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if data.frame_index == self.fail_on {
            return Err(SegmentError::EmptyStack);
        }
        ClipStep.process(data, params)
    }

    fn name(&self) -> &'static str {
        "Failing Clip"
    }

    fn stage(&self) -> Stage {
        Stage::Clip
    }
}

#[test]
fn test_frame_failure_fails_the_batch() -> anyhow::Result<()> {
    let stack = drifting_stack(4);

    for parallel in [false, true] {
        let step = Arc::new(FailingClip {
            fail_on: 2,
            runs: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::new()
            .add_step(step.clone())
            .add_step(Arc::new(BackgroundStep))
            .add_step(Arc::new(SmoothStep))
            .add_step(Arc::new(ThresholdStep))
            .add_step(Arc::new(ObjectFilterStep))
            .add_step(Arc::new(CenterBlendStep))
            .add_step(Arc::new(MarkerStep))
            .add_step(Arc::new(EdgeMapStep))
            .add_step(Arc::new(WatershedStep));
        let segmenter = StackSegmenter::new(&stack, bump_params()).with_pipeline(pipeline);

        let result = if parallel {
            segmenter.run_parallel(|_, _| {})
        } else {
            segmenter.run(|_, _| {})
        };

        match result {
            Err(SegmentError::Frame { index, source }) => {
                assert_eq!(index, 2);
                assert!(matches!(*source, SegmentError::EmptyStack));
            }
            other => panic!("expected frame 2 to fail, got {:?}", other.map(|v| v.len())),
        }
        assert!(step.runs.load(Ordering::SeqCst) >= 1);
    }
    Ok(())
}

#[test]
fn test_mismatched_frames_are_rejected() {
    let result = Stack::new(vec![Frame::new(8, 8), Frame::new(8, 9)]);
    assert!(matches!(result, Err(SegmentError::ShapeMismatch { .. })));

    assert!(matches!(Stack::new(Vec::new()), Err(SegmentError::EmptyStack)));
}

#[test]
fn test_channels_share_a_shape() -> anyhow::Result<()> {
    let nuclei = drifting_stack(2);
    let membrane = drifting_stack(2);

    let channels = ChannelSet::new(vec![nuclei, membrane])?;
    assert_eq!(channels.len(), 2);

    // Segment one channel at a time.
    let volume = segment_stack(channels.channel(0).expect("channel 0"), &bump_params(), false)?;
    assert_eq!(volume.len(), 2);
    assert!(channels.channel(2).is_none());

    let small = Stack::new(vec![Frame::new(8, 8)])?;
    let result = ChannelSet::new(vec![drifting_stack(1), small]);
    assert!(matches!(result, Err(SegmentError::ShapeMismatch { .. })));
    Ok(())
}
