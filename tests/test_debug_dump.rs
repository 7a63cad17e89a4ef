mod common;

use common::*;
use nucleiseg::StackSegmenter;
use tempfile::TempDir;

#[test]
fn test_debug_output_layout() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let debug_dir = temp.path().join("debug");

    let pipeline = Pipeline::standard().with_debug(debug_dir.clone())?;
    pipeline.run(&single_nucleus_frame(), 7, &bump_params())?;

    // One folder per stage, numbered by stage index, one PNG per frame
    for folder in [
        "00_input",
        "01_edge_map",
        "02_clipping",
        "03_background_subtraction",
        "04_smoothing",
        "05_threshold",
        "06_object_filter",
        "07_center_blend",
        "08_markers",
        "09_watershed",
    ] {
        let path = debug_dir.join(folder).join("0007.png");
        assert!(path.exists(), "missing {}", path.display());
    }

    // Labels are written as 16-bit ids
    let labels = image::open(debug_dir.join("09_watershed").join("0007.png"))?.into_luma16();
    assert_eq!(labels.get_pixel(10, 10)[0], 1);
    assert_eq!(labels.get_pixel(0, 0)[0], 0);

    Ok(())
}

#[test]
fn test_debug_dump_from_parallel_batch() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let stack = drifting_stack(3);

    let pipeline = Pipeline::standard().with_debug(temp.path().to_path_buf())?;
    StackSegmenter::new(&stack, bump_params())
        .with_pipeline(pipeline)
        .run_parallel(|_, _| {})?;

    for index in 0..3 {
        let path = temp.path().join("09_watershed").join(format!("{:04}.png", index));
        assert!(path.exists(), "missing {}", path.display());
    }
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    std::fs::write(temp.path().join("leftover.txt"), "old run")?;

    let result = Pipeline::standard().with_debug(temp.path().to_path_buf());
    assert!(matches!(result, Err(SegmentError::DebugDirNotEmpty(_))));
    Ok(())
}

#[test]
fn test_no_debug_output_by_default() -> anyhow::Result<()> {
    let pipeline = Pipeline::standard();
    assert!(pipeline.context().debug.is_none());
    Ok(())
}
