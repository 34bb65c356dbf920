mod common;

use common::*;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};

#[test]
fn centered_rectangle_is_found_at_the_aim_point() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[centered(50, 50, 40, 60)], WHITE);
    let config = white_target_config(Stage::Select);
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;

    assert_eq!(output.reports.len(), 3);
    let tall = output.reports[0];
    assert_eq!(tall.category, ShapeCategory::Tall);
    assert!(tall.found);
    assert_close(tall.offset_x, 0.0, 0.02);
    assert_close(tall.offset_y, 0.0, 0.02);
    for other in &output.reports[1..] {
        assert!(!other.found, "{} should not be found", other.category);
    }

    let candidate = &output.candidates[0];
    assert_eq!(candidate.vertex_count, 4);
    assert_close(candidate.bbox_area, 2400.0, 100.0);
    assert_close(candidate.aspect_ratio, 40.0 / 60.0, 0.02);
    Ok(())
}

#[test]
fn black_frame_reports_nothing_found() -> anyhow::Result<()> {
    let frame = RgbImage::new(64, 48);
    let config = white_target_config(Stage::Full);
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;

    assert_eq!(output.reports.len(), 3);
    for report in &output.reports {
        assert_eq!(*report, TargetReport::not_found(report.category));
    }
    assert!(output.candidates.is_empty());
    Ok(())
}

#[test]
fn none_stage_returns_the_input_untouched() -> anyhow::Result<()> {
    let frame = frame_with_rects(40, 40, &[(5, 5, 10, 10)], WHITE);
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &white_target_config(Stage::None))?;

    assert_eq!(output.image, ProcessedImage::Frame(frame));
    assert!(output.reports.is_empty());
    assert_eq!(pipeline.reallocations(), 0);
    Ok(())
}

#[test]
fn threshold_stage_returns_an_exact_binary_mask() -> anyhow::Result<()> {
    let frame = RgbImage::from_fn(64, 32, |x, y| {
        Rgb([(x * 4) as u8, (y * 8) as u8, ((x + y) * 3) as u8])
    });
    let mut config = white_target_config(Stage::Threshold);
    config.ranges = [
        ChannelRange::new(40, 180),
        ChannelRange::new(0, 120),
        ChannelRange::new(30, 255),
    ];
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;
    let mask = output.image.as_mask().expect("threshold stage returns a mask");

    for (x, y, px) in frame.enumerate_pixels() {
        let inside = config.ranges.iter().zip(px.0).all(|(r, v)| r.contains(v));
        let expected = if inside { 255 } else { 0 };
        assert_eq!(mask.get_pixel(x, y)[0], expected, "pixel ({}, {})", x, y);
    }
    Ok(())
}

#[test]
fn close_holes_stage_merges_a_split_target() -> anyhow::Result<()> {
    // Two 24x70 halves separated by a two-pixel crack
    let frame = frame_with_rects(80, 80, &[(15, 5, 24, 70), (41, 5, 24, 70)], WHITE);
    let mut config = white_target_config(Stage::CloseHoles);
    config.hole_closing_iterations = 2;
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;
    let mask = output.image.as_mask().expect("close-holes stage returns a mask");
    assert_eq!(mask.get_pixel(39, 40)[0], 255);
    assert_eq!(mask.get_pixel(40, 40)[0], 255);

    config.stage = Stage::Select;
    let merged = pipeline.process(&frame, &config)?;
    assert_eq!(merged.candidates.len(), 1);

    config.hole_closing_iterations = 0;
    let split = pipeline.process(&frame, &config)?;
    assert!(split.candidates.is_empty(), "halves fall between the tall and line windows");
    Ok(())
}

#[test]
fn drawing_stages_annotate_a_copy_of_the_frame() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[centered(50, 50, 40, 60)], WHITE);
    let mut pipeline = TargetPipeline::new();

    for stage in [Stage::Contours, Stage::ConvexHull, Stage::Select, Stage::Calculate] {
        let mut config = white_target_config(stage);
        config.contour_color = [255, 0, 0];
        let output = pipeline.process(&frame, &config)?;
        let annotated = output.image.as_frame().expect("drawing stages return the frame");
        assert_eq!(annotated.dimensions(), frame.dimensions());
        assert_ne!(annotated, &frame, "stage {} should draw", stage);
        assert!(
            annotated.pixels().any(|p| *p == Rgb([255, 0, 0])),
            "stage {} should draw in the contour color",
            stage
        );
    }

    // The aim crosshair only appears from the calculate stage on
    let mut config = white_target_config(Stage::Select);
    config.line_color = [0, 255, 0];
    let select = pipeline.process(&frame, &config)?;
    config.stage = Stage::Calculate;
    let calculate = pipeline.process(&frame, &config)?;
    let green = Rgb([0, 255, 0]);
    assert!(!select.image.as_frame().unwrap().pixels().any(|p| *p == green));
    assert!(calculate.image.as_frame().unwrap().pixels().any(|p| *p == green));
    Ok(())
}

#[test]
fn scratch_buffers_follow_frame_size() -> anyhow::Result<()> {
    let config = white_target_config(Stage::Full);
    let mut pipeline = TargetPipeline::new().without_telemetry();

    for _ in 0..3 {
        pipeline.process(&RgbImage::new(64, 48), &config)?;
    }
    assert_eq!(pipeline.reallocations(), 1);

    pipeline.process(&RgbImage::new(32, 32), &config)?;
    pipeline.process(&RgbImage::new(32, 32), &config)?;
    assert_eq!(pipeline.reallocations(), 2);

    pipeline.release();
    pipeline.process(&RgbImage::new(32, 32), &config)?;
    assert_eq!(pipeline.reallocations(), 3);
    Ok(())
}

#[test]
fn telemetry_is_published_only_at_full_stage() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[centered(50, 50, 40, 60)], WHITE);
    let telemetry = RecordingTelemetry::default();
    let mut pipeline = TargetPipeline::new().with_telemetry(Box::new(telemetry.clone()));

    pipeline.process(&frame, &white_target_config(Stage::Calculate))?;
    assert!(telemetry.published.lock().unwrap().is_empty());

    let output = pipeline.process(&frame, &white_target_config(Stage::Full))?;
    let published = telemetry.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, output.reports);
    Ok(())
}

#[test]
fn debug_sink_sees_every_intermediate_without_changing_results() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[centered(50, 50, 40, 60)], WHITE);
    let config = white_target_config(Stage::Full);

    let sink = RecordingDebugSink::default();
    let mut observed = TargetPipeline::new()
        .without_telemetry()
        .with_debug_sink(Box::new(sink.clone()));
    let mut plain = TargetPipeline::new().without_telemetry();

    let with_debug = observed.process(&frame, &config)?;
    let without_debug = plain.process(&frame, &config)?;

    assert_eq!(with_debug.reports, without_debug.reports);
    assert_eq!(with_debug.image, without_debug.image);
    let names: Vec<String> = sink.shown.lock().unwrap().iter().map(|s| s.0.clone()).collect();
    assert_eq!(names, ["raw", "threshold", "close-holes", "contours", "convex-hull"]);
    Ok(())
}

#[test]
fn debug_sink_receives_all_intermediates_at_early_stages() -> anyhow::Result<()> {
    // Closing would fill the crack, so the returned mask shows which step it came from
    let frame = frame_with_rects(80, 80, &[(15, 5, 24, 70), (41, 5, 24, 70)], WHITE);
    let expected = ["raw", "threshold", "close-holes", "contours", "convex-hull"];

    for stage in [Stage::None, Stage::Threshold, Stage::CloseHoles, Stage::Contours, Stage::ConvexHull] {
        let mut config = white_target_config(stage);
        config.hole_closing_iterations = 2;
        let sink = RecordingDebugSink::default();
        let mut observed = TargetPipeline::new()
            .without_telemetry()
            .with_debug_sink(Box::new(sink.clone()));
        let mut plain = TargetPipeline::new().without_telemetry();

        let with_debug = observed.process(&frame, &config)?;
        let without_debug = plain.process(&frame, &config)?;

        let names: Vec<String> = sink.shown.lock().unwrap().iter().map(|s| s.0.clone()).collect();
        assert_eq!(names, expected, "stage {}", stage);
        assert_eq!(with_debug.image, without_debug.image, "stage {}", stage);
        assert!(with_debug.reports.is_empty());
    }

    let mut config = white_target_config(Stage::Threshold);
    config.hole_closing_iterations = 2;
    let mut observed = TargetPipeline::new()
        .without_telemetry()
        .with_debug_sink(Box::new(RecordingDebugSink::default()));
    let output = observed.process(&frame, &config)?;
    let mask = output.image.as_mask().expect("threshold stage returns a mask");
    assert_eq!(mask.get_pixel(39, 40)[0], 0, "threshold output must not be closed");
    Ok(())
}

#[test]
fn grayscale_input_is_converted_before_processing() -> anyhow::Result<()> {
    let gray = GrayImage::from_fn(100, 100, |x, y| {
        let inside = (30..70).contains(&x) && (20..80).contains(&y);
        image::Luma([if inside { 255 } else { 0 }])
    });
    let mut pipeline = TargetPipeline::new().without_telemetry();

    let output =
        pipeline.process_dynamic(&DynamicImage::ImageLuma8(gray), &white_target_config(Stage::Select))?;

    assert!(output.reports[0].found);
    Ok(())
}

#[test]
fn hsv_ranges_pick_out_a_red_target() -> anyhow::Result<()> {
    let mut frame = frame_with_rects(120, 90, &[centered(60, 45, 30, 50)], RED);
    for (x, y, px) in frame.enumerate_pixels_mut() {
        if *px == Rgb([0, 0, 0]) && (x + y) % 2 == 0 {
            *px = BLUE;
        }
    }
    let mut config = white_target_config(Stage::Select);
    config.set_property("color_space", "hsv")?;
    config.set_property("hue.low", "0")?;
    config.set_property("hue.high", "10")?;
    config.set_property("saturation.low", "150")?;
    config.set_property("saturation.high", "255")?;
    config.set_property("value.low", "150")?;
    config.set_property("value.high", "255")?;
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;

    assert!(output.reports[0].found);
    assert_close(output.reports[0].offset_x, 0.0, 0.03);
    Ok(())
}

#[test]
fn thin_vertical_strip_is_reported_as_a_line() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[(50, 10, 2, 80)], WHITE);
    let config = white_target_config(Stage::Select);
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;

    let line = output
        .reports
        .iter()
        .find(|r| r.category == ShapeCategory::Line)
        .expect("line category is enabled");
    assert!(line.found);
    assert_close(line.offset_x, 0.0, 0.03);
    assert_eq!(output.candidates[0].vertex_count, 2);
    Ok(())
}

#[test]
fn disabled_categories_produce_no_report() -> anyhow::Result<()> {
    let frame = frame_with_rects(100, 100, &[centered(50, 50, 40, 60)], WHITE);
    let mut config = white_target_config(Stage::Select);
    config.set_property("wide.enabled", "false")?;
    config.set_property("line.enabled", "false")?;
    let mut pipeline = TargetPipeline::new();

    let output = pipeline.process(&frame, &config)?;

    assert_eq!(output.reports.len(), 1);
    assert_eq!(output.reports[0].category, ShapeCategory::Tall);
    Ok(())
}
