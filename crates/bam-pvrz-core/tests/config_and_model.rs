use bam_pvrz_core::prelude::*;
use bam_pvrz_core::{BamSummary, TEXCONV_ENV, global_page_id, page_local, page_prefix};
use image::{Rgba, RgbaImage};

#[test]
fn page_file_names() {
    let naming = PageNaming::default();
    assert_eq!(naming.file_name(17003), "MOS17003.pvrz");
    assert_eq!(naming.file_name(3), "MOS0003.pvrz");
    assert_eq!(naming.file_name(9999), "MOS9999.pvrz");
    let custom = PageNaming {
        prefix: "TILE".into(),
        extension: "pvr".into(),
    };
    assert_eq!(custom.file_name(1042), "TILE1042.pvr");
}

#[test]
fn page_file_names_parse_back() {
    let naming = PageNaming::default();
    assert_eq!(naming.parse_file_name("MOS17003.pvrz"), Some(17003));
    assert_eq!(naming.parse_file_name("MOS2001.PVRZ"), Some(2001));
    assert_eq!(naming.parse_file_name("MOS.pvrz"), None);
    assert_eq!(naming.parse_file_name("MOS12a.pvrz"), None);
    assert_eq!(naming.parse_file_name("TIS1000.pvrz"), None);
    assert_eq!(naming.parse_file_name("MOS1000.bam"), None);
}

#[test]
fn free_prefix_skips_used_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let pages = PageDirectory::new(dir.path(), PageNaming::default());
    assert_eq!(pages.free_prefix().unwrap(), 1);

    std::fs::write(dir.path().join("MOS1000.pvrz"), b"").unwrap();
    std::fs::write(dir.path().join("MOS2001.PVRZ"), b"").unwrap();
    std::fs::write(dir.path().join("MOS3000.bam"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
    assert_eq!(pages.free_prefix().unwrap(), 3);

    // prefix 0 never counts; a gap is reused
    std::fs::write(dir.path().join("MOS0004.pvrz"), b"").unwrap();
    std::fs::remove_file(dir.path().join("MOS1000.pvrz")).unwrap();
    assert_eq!(pages.free_prefix().unwrap(), 1);
}

#[test]
fn free_prefix_of_missing_directory_is_one() {
    let dir = tempfile::tempdir().unwrap();
    let pages = PageDirectory::new(dir.path().join("absent"), PageNaming::default());
    assert_eq!(pages.free_prefix().unwrap(), 1);
}

#[test]
fn page_id_helpers() {
    assert_eq!(global_page_id(17, 3), 17003);
    assert_eq!(page_prefix(17003), 17);
    assert_eq!(page_local(17003), 3);
}

#[test]
fn texture_format_parsing() {
    assert_eq!("DXT1".parse::<TextureFormat>(), Ok(TextureFormat::Dxt1));
    assert_eq!("bc3".parse::<TextureFormat>(), Ok(TextureFormat::Dxt5));
    assert!("etc2".parse::<TextureFormat>().is_err());
    assert_eq!(TextureFormat::Dxt1.pixel_format_code(), 7);
    assert_eq!(TextureFormat::from_pixel_format_code(11), Some(TextureFormat::Dxt5));
}

#[test]
fn write_options_validation() {
    assert!(WriteOptions::default().validate().is_ok());
    let zero = WriteOptions::builder().with_max_dimensions(0, 16).build();
    assert!(matches!(zero.validate(), Err(BamError::InvalidConfig(_))));
    let huge = WriteOptions::builder().page_prefix(u32::MAX / 1000).build();
    assert!(matches!(huge.validate(), Err(BamError::InvalidConfig(_))));
}

#[test]
fn write_options_deserialize_with_defaults() {
    let opts: WriteOptions = serde_json::from_str(r#"{ "page_prefix": 12 }"#).unwrap();
    assert_eq!(opts.page_prefix, 12);
    assert_eq!(opts.format, TextureFormat::Dxt5);
    assert_eq!(opts.packer, PackerConfig::default());
    assert_eq!(opts.naming, PageNaming::default());
}

#[test]
fn explicit_texconv_path_wins() {
    let cfg = TexconvConfig {
        program: Some("/opt/tools/texconv.exe".into()),
    };
    assert_eq!(cfg.resolve(), std::path::PathBuf::from("/opt/tools/texconv.exe"));
    assert_eq!(TEXCONV_ENV, "BAM_PVRZ_TEXCONV");
}

#[test]
fn cycle_membership_is_validated() {
    let mut bam = Bam::new();
    let c = bam.add_cycle();
    assert!(matches!(
        bam.add_frame_to_cycle(c, 0),
        Err(BamError::InvalidInput(_))
    ));
    let f = bam.add_frame(Frame::new(4, 4, 0, 0));
    assert!(bam.add_frame_to_cycle(c, f).is_ok());
    assert!(bam.add_frame_to_cycle(c + 1, f).is_err());
    assert_eq!(bam.total_raw_frames(), 1);
}

#[test]
fn oversized_image_does_not_fit_a_frame() {
    let img = RgbaImage::new(40_000, 1);
    assert!(matches!(
        Frame::from_image(img, 0, 0),
        Err(BamError::InvalidInput(_))
    ));
}

#[test]
fn summary_and_display() {
    let mut bam = Bam::new();
    let a = bam.add_frame(Frame::new(10, 12, 5, 6));
    let b = bam.add_frame(Frame::new(3, 3, 0, 0));
    let c = bam.add_cycle();
    bam.add_frame_to_cycle(c, a).unwrap();
    bam.add_frame_to_cycle(c, b).unwrap();
    bam.add_frame_to_cycle(c, a).unwrap();

    let summary = bam.summary();
    let json = serde_json::to_string(&summary).unwrap();
    let back: BamSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
    assert_eq!(summary.cycles, vec![vec![0, 1, 0]]);

    let text = bam.to_string();
    assert!(text.starts_with("bam V2\n2 frames"));
    assert!(text.contains("size (10, 12) center (5, 6)"));
    assert!(text.ends_with("1 cycles\n\t[0, 1, 0]"));
}

#[test]
fn save_frames_writes_pngs() {
    let dir = tempfile::tempdir().unwrap();
    let mut bam = Bam::new();
    bam.add_frame(Frame::from_image(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])), 0, 0).unwrap());
    bam.add_frame(Frame::new(2, 2, 0, 0));
    let written = bam.save_frames(dir.path(), "walk_").unwrap();
    assert_eq!(written, vec![dir.path().join("walk_0.png")]);
    let img = image::open(&written[0]).unwrap().to_rgba8();
    assert_eq!(img.get_pixel(1, 1), &Rgba([1, 2, 3, 4]));
}
