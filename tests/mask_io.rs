use image::{GrayImage, Luma, Rgb, RgbImage};
use seedcut::grid::load_image;
use seedcut::mask::{self, CompositeSink, FbMaskSink, MaskImageSink, ResultSink};
use seedcut::{Label, LabelMap, Pixel, PixelSource, SegmentationConfig, SegmentationEngine, Segmenter};
use std::fs;

fn checker() -> LabelMap {
    let labels = (0..12)
        .map(|i| if i % 2 == 0 { Label::Foreground } else { Label::Background })
        .collect();
    LabelMap::new(4, 3, labels).expect("matching size")
}

#[test]
fn fbmask_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("result.fbmask");
    let labels = checker();

    mask::write_fbmask(&path, &labels, 0, 255).expect("write");
    assert!(dir.path().join("result.png").exists());

    let descriptor = fs::read_to_string(&path).expect("descriptor");
    assert_eq!(descriptor, "foreground 0\nbackground 255\nresult.png\n");

    let read = mask::read_fbmask(&path).expect("read");
    assert_eq!(read, labels);
}

#[test]
fn fbmask_with_foreign_values_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut image = GrayImage::from_pixel(2, 2, Luma([10]));
    image.put_pixel(1, 1, Luma([77]));
    image.save(dir.path().join("m.png")).expect("save mask");
    fs::write(
        dir.path().join("m.fbmask"),
        "background 20\nforeground 10\nm.png\n",
    )
    .expect("write descriptor");

    let err = mask::read_fbmask(dir.path().join("m.fbmask")).expect_err("stray value");
    assert!(err.to_string().contains("77"));
}

#[test]
fn fbmask_sink_refuses_a_png_destination() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("result.png");
    let image = image::DynamicImage::ImageRgb8(RgbImage::new(4, 3));

    let mut sink = FbMaskSink::new(&path);
    assert!(sink.write_result(&image, &checker()).is_err());
    assert!(!path.exists());
}

#[test]
fn missing_fbmask_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(mask::read_fbmask(dir.path().join("absent.fbmask")).is_err());
}

#[test]
fn files_through_engine_to_sinks() {
    let dir = tempfile::tempdir().expect("temp dir");

    // left half red, right half blue
    let source = RgbImage::from_fn(8, 4, |x, _| {
        if x < 4 {
            Rgb([220, 20, 20])
        } else {
            Rgb([20, 20, 220])
        }
    });
    source.save(dir.path().join("input.png")).expect("save input");

    let mut fg_mask = GrayImage::new(8, 4);
    fg_mask.put_pixel(0, 0, Luma([255]));
    fg_mask.put_pixel(1, 3, Luma([255]));
    fg_mask.save(dir.path().join("fg.png")).expect("save fg");

    let mut bg_mask = GrayImage::new(8, 4);
    bg_mask.put_pixel(7, 0, Luma([255]));
    bg_mask.save(dir.path().join("bg.png")).expect("save bg");

    let (decoded, pixels) = load_image(dir.path().join("input.png")).expect("load");
    assert_eq!(pixels.channels(), 3);
    let fg = mask::load_seed_mask(dir.path().join("fg.png")).expect("fg seeds");
    let bg = mask::load_seed_mask(dir.path().join("bg.png")).expect("bg seeds");
    assert_eq!(fg.len(), 2);
    assert_eq!(bg, [Pixel::new(7, 0)].into_iter().collect());

    let engine = SegmentationEngine::new(SegmentationConfig::default()).expect("config");
    let result = engine.segment(&pixels, &fg, &bg).expect("segment");
    assert_eq!(result.labels.count_foreground(), 16);

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![
        Box::new(MaskImageSink::new(dir.path().join("mask.png"))),
        Box::new(CompositeSink::new(
            dir.path().join("out.png"),
            image::Rgba([0, 0, 0, 255]),
        )),
        Box::new(FbMaskSink::new(dir.path().join("result.fbmask"))),
    ];
    for sink in sinks.iter_mut() {
        sink.write_result(&decoded, &result.labels).expect("write");
    }

    let mask_image = image::open(dir.path().join("mask.png"))
        .expect("mask")
        .to_luma8();
    assert_eq!(mask_image.get_pixel(2, 2)[0], mask::FOREGROUND_VALUE);
    assert_eq!(mask_image.get_pixel(6, 2)[0], mask::BACKGROUND_VALUE);

    let composite = image::open(dir.path().join("out.png")).expect("out").to_rgb8();
    assert_eq!(composite.get_pixel(1, 1), &Rgb([220, 20, 20]));
    assert_eq!(composite.get_pixel(5, 1), &Rgb([0, 0, 0]));

    let reread = mask::read_fbmask(dir.path().join("result.fbmask")).expect("reread");
    assert_eq!(reread, result.labels);
}
